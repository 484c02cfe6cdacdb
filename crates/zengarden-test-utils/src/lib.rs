#![deny(unsafe_code)]

//! Shared test utilities for the ZenGarden workspace.
//!
//! Provides config builders and a mock-backed plotter rig so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! zengarden-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod rig;
