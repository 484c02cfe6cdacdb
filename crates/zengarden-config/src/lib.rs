#![deny(unsafe_code)]

//! Configuration loading and validation for ZenGarden.
//!
//! Loads TOML configuration files describing the serial link, the table
//! geometry, the plotter's coordinate mode and pacing, and the parameters of
//! the built-in patterns. [`AppConfig`] is the central configuration structure.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Names accepted as keys of `patterns.interrupt_checks`.
pub const PATTERN_NAMES: [&str; 8] = [
    "home",
    "center",
    "border",
    "box-to-center",
    "box-from-center",
    "star",
    "circle",
    "random",
];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Serial link to the plotter.
    #[serde(default)]
    pub serial: SerialConfig,

    /// Table geometry.
    #[serde(default)]
    pub table: TableConfig,

    /// Controller behaviour.
    #[serde(default)]
    pub plotter: PlotterConfig,

    /// Pattern generator parameters.
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device name, e.g. `COM8` or `/dev/ttyUSB0`.
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read/write timeout of the underlying port in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_port() -> String {
    "COM8".to_string()
}

fn default_baud_rate() -> u32 {
    57600
}

fn default_timeout_ms() -> u64 {
    100
}

/// Table geometry in plotter units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_table_size")]
    pub size_x: u32,

    #[serde(default = "default_table_size")]
    pub size_y: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            size_x: default_table_size(),
            size_y: default_table_size(),
        }
    }
}

impl TableConfig {
    /// The length of the largest square that fits on the table.
    pub fn box_size(&self) -> u32 {
        self.size_x.min(self.size_y)
    }
}

/// Largest accepted table side, in plotter units.
pub const MAX_TABLE_SIZE: u32 = 10_000;

fn default_table_size() -> u32 {
    300
}

/// How motion coordinates are interpreted by the plotter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateMode {
    /// Coordinates are relative to the part zero (G90).
    #[default]
    Absolute,
    /// Coordinates are offsets from the current position (G91).
    Relative,
}

/// Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotterConfig {
    /// Mode-setup command sent when the link is opened.
    #[serde(default)]
    pub coordinate_mode: CoordinateMode,

    /// Pause after each command so the device's input buffer is not overrun.
    #[serde(default = "default_command_delay_ms")]
    pub command_delay_ms: u64,

    /// Distance of a single manual-mode jog.
    #[serde(default = "default_jog_step")]
    pub jog_step: f64,
}

impl Default for PlotterConfig {
    fn default() -> Self {
        Self {
            coordinate_mode: CoordinateMode::default(),
            command_delay_ms: default_command_delay_ms(),
            jog_step: default_jog_step(),
        }
    }
}

fn default_command_delay_ms() -> u64 {
    10
}

fn default_jog_step() -> f64 {
    5.0
}

/// Parameters of the built-in patterns.
///
/// ## TOML Example
///
/// ```toml
/// [patterns]
/// check_interrupts = true
/// star_step = 25
///
/// [patterns.interrupt_checks]
/// border = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Whether generators poll the keyboard between iterations.
    #[serde(default = "default_true")]
    pub check_interrupts: bool,

    /// Inset from the table edge used by border, star and random patterns.
    #[serde(default = "default_border_offset")]
    pub border_offset: u32,

    #[serde(default = "default_box_step")]
    pub box_step: u32,

    #[serde(default = "default_star_step")]
    pub star_step: u32,

    #[serde(default = "default_circle_radius_step")]
    pub circle_radius_step: u32,

    /// Degrees between consecutive points of a circle ring.
    #[serde(default = "default_circle_angle_step")]
    pub circle_angle_step: u32,

    /// Number of random moves; `0` runs until stopped.
    #[serde(default)]
    pub random_steps: u32,

    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Per-pattern overrides of `check_interrupts`, keyed by pattern name.
    #[serde(default)]
    pub interrupt_checks: BTreeMap<String, bool>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            check_interrupts: true,
            border_offset: default_border_offset(),
            box_step: default_box_step(),
            star_step: default_star_step(),
            circle_radius_step: default_circle_radius_step(),
            circle_angle_step: default_circle_angle_step(),
            random_steps: 0,
            random_seed: None,
            interrupt_checks: BTreeMap::new(),
        }
    }
}

impl PatternConfig {
    /// Whether the named pattern checks for keyboard interrupts.
    pub fn checks_interrupts(&self, pattern: &str) -> bool {
        self.interrupt_checks
            .get(pattern)
            .copied()
            .unwrap_or(self.check_interrupts)
    }
}

fn default_true() -> bool {
    true
}

fn default_border_offset() -> u32 {
    10
}

fn default_box_step() -> u32 {
    5
}

fn default_star_step() -> u32 {
    50
}

fn default_circle_radius_step() -> u32 {
    10
}

fn default_circle_angle_step() -> u32 {
    20
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::Validation(
                "serial.port must not be empty".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "serial.baud_rate must be non-zero".to_string(),
            ));
        }

        if self.table.size_x > MAX_TABLE_SIZE || self.table.size_y > MAX_TABLE_SIZE {
            return Err(ConfigError::Validation(format!(
                "table sides must be at most {MAX_TABLE_SIZE}, got {}x{}",
                self.table.size_x, self.table.size_y
            )));
        }

        let inset = self.patterns.border_offset.saturating_mul(2);
        if self.table.size_x <= inset || self.table.size_y <= inset {
            return Err(ConfigError::Validation(format!(
                "table must be larger than twice patterns.border_offset ({inset}), got {}x{}",
                self.table.size_x, self.table.size_y
            )));
        }

        if !self.plotter.jog_step.is_finite() || self.plotter.jog_step <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "plotter.jog_step must be positive, got {}",
                self.plotter.jog_step
            )));
        }

        let steps = [
            ("patterns.box_step", self.patterns.box_step),
            ("patterns.star_step", self.patterns.star_step),
            ("patterns.circle_radius_step", self.patterns.circle_radius_step),
        ];
        for (name, value) in steps {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        if !(1..=360).contains(&self.patterns.circle_angle_step) {
            return Err(ConfigError::Validation(format!(
                "patterns.circle_angle_step must be in 1..=360, got {}",
                self.patterns.circle_angle_step
            )));
        }

        for name in self.patterns.interrupt_checks.keys() {
            if !PATTERN_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "patterns.interrupt_checks has unknown pattern {name:?}, expected one of {PATTERN_NAMES:?}"
                )));
            }
        }

        // An endless walk that never looks at the keyboard can only be stopped by killing the process.
        if self.patterns.random_steps == 0 && !self.patterns.checks_interrupts("random") {
            return Err(ConfigError::Validation(
                "patterns.random_steps must be non-zero when the random pattern does not check interrupts"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
