//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries, and [`TempConfig`] when a
//! test needs the configuration on disk.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zengarden_config::{AppConfig, CoordinateMode};

/// Fluent builder for [`AppConfig`] in tests.
///
/// Starts from the defaults with the per-command delay removed so tests
/// don't sleep.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .port("/dev/ttyUSB0")
///     .coordinate_mode(CoordinateMode::Relative)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.plotter.command_delay_ms = 0;
        Self { config }
    }

    pub fn port(mut self, port: &str) -> Self {
        self.config.serial.port = port.to_string();
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.serial.baud_rate = baud_rate;
        self
    }

    pub fn table(mut self, size_x: u32, size_y: u32) -> Self {
        self.config.table.size_x = size_x;
        self.config.table.size_y = size_y;
        self
    }

    pub fn coordinate_mode(mut self, mode: CoordinateMode) -> Self {
        self.config.plotter.coordinate_mode = mode;
        self
    }

    pub fn jog_step(mut self, step: f64) -> Self {
        self.config.plotter.jog_step = step;
        self
    }

    pub fn interrupt_check(mut self, pattern: &str, enabled: bool) -> Self {
        self.config
            .patterns
            .interrupt_checks
            .insert(pattern.to_string(), enabled);
        self
    }

    pub fn random_walk(mut self, steps: u32, seed: u64) -> Self {
        self.config.patterns.random_steps = steps;
        self.config.patterns.random_seed = Some(seed);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A config file in a temporary directory, deleted on drop.
pub struct TempConfig {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TempConfig {
    /// Write `toml_content` to `zengarden.toml` in a fresh temp directory.
    pub fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("zengarden.toml");
        std::fs::write(&path, toml_content).expect("failed to write test config");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
