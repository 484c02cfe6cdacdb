#![deny(unsafe_code)]

//! ZenGarden core. Drives a pen plotter over a serial link.
//!
//! The [`Plotter`] sends one G-code line at a time and waits for the device
//! to answer before sending the next, polling the keyboard while it waits so
//! the operator can pause, resume, or quit a long pattern. Patterns and the
//! interactive jog mode are built on top of it.

/// G-code command lines and their framing.
pub mod command;
/// The plotter controller and its handshake.
pub mod controller;
/// Non-blocking keyboard input.
pub mod keyboard;
/// Subscriber setup for raw-mode terminals.
pub mod logging;
/// Interactive jog mode.
pub mod manual;
/// In-memory transport and keyboard for tests.
pub mod mock;
/// Built-in plotting patterns.
pub mod patterns;
/// Run-state lifecycle.
pub mod run_state;
/// Open, run, close.
pub mod session;
/// Serial transport.
pub mod transport;

pub use command::{ArcDirection, Command, Mnemonic};
pub use controller::{Motion, Plotter, PlotterError, PlotterSettings};
pub use keyboard::{Key, Keyboard, TerminalKeyboard};
pub use patterns::{Outcome, PatternKind, PatternRunner};
pub use run_state::{Flow, RunState};
pub use session::Program;
pub use transport::{Connect, SerialConnector, SerialTransport, Transport, TransportError};
pub use zengarden_config::CoordinateMode;
