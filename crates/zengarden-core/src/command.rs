//! G-code command lines and their on-wire framing.
//!
//! Every command is a single ASCII line made of a mnemonic and optional
//! axis words, written to the device followed by [`TERMINATOR`]. There is no
//! escaping and no checksum.

use std::fmt;

use zengarden_config::CoordinateMode;

/// Bytes written after every command.
pub const TERMINATOR: &[u8; 2] = b";\n";

/// Motion command codes understood by the plotter firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    /// Linear interpolation.
    Linear,
    /// Circular interpolation, clockwise.
    ArcClockwise,
    /// Circular interpolation, counter-clockwise.
    ArcCounterClockwise,
    /// Return to machine zero.
    Home,
    /// Absolute programming.
    Absolute,
    /// Incremental programming.
    Relative,
}

impl Mnemonic {
    pub fn code(self) -> &'static str {
        match self {
            Mnemonic::Linear => "G01",
            Mnemonic::ArcClockwise => "G02",
            Mnemonic::ArcCounterClockwise => "G03",
            Mnemonic::Home => "G28",
            Mnemonic::Absolute => "G90",
            Mnemonic::Relative => "G91",
        }
    }
}

impl From<CoordinateMode> for Mnemonic {
    fn from(mode: CoordinateMode) -> Self {
        match mode {
            CoordinateMode::Absolute => Mnemonic::Absolute,
            CoordinateMode::Relative => Mnemonic::Relative,
        }
    }
}

/// Direction of a circular interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

impl From<ArcDirection> for Mnemonic {
    fn from(direction: ArcDirection) -> Self {
        match direction {
            ArcDirection::Clockwise => Mnemonic::ArcClockwise,
            ArcDirection::CounterClockwise => Mnemonic::ArcCounterClockwise,
        }
    }
}

/// A formatted, immutable command line without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
}

impl Command {
    /// A bare mnemonic with no parameters, e.g. `G90`.
    pub fn bare(mnemonic: Mnemonic) -> Self {
        Self {
            text: mnemonic.code().to_string(),
        }
    }

    /// `G01 X<x> Y<y>`.
    pub fn linear(x: f64, y: f64) -> Self {
        Self {
            text: format!("{} X{x:.3} Y{y:.3}", Mnemonic::Linear.code()),
        }
    }

    /// `G02`/`G03 X<x> Y<y> I<i> J<j>`, where `I`/`J` locate the arc centre.
    pub fn arc(direction: ArcDirection, x: f64, y: f64, i: f64, j: f64) -> Self {
        Self {
            text: format!(
                "{} X{x:.3} Y{y:.3} I{i:.3} J{j:.3}",
                Mnemonic::from(direction).code()
            ),
        }
    }

    pub fn mode(mode: CoordinateMode) -> Self {
        Self::bare(mode.into())
    }

    pub fn home() -> Self {
        Self::bare(Mnemonic::Home)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
