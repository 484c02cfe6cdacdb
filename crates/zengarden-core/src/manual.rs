//! Manual mode. Jog the pen with the arrow keys and launch patterns by number.
//!
//! Runs in relative mode. The table's X axis is mirrored, so Left moves
//! towards +X and Right towards −X.

use tracing::info;
use zengarden_config::CoordinateMode;

use crate::controller::{Motion, Plotter, PlotterError, skip_recoverable};
use crate::keyboard::{Key, Keyboard};
use crate::patterns::{self, Outcome, PatternKind, PatternRunner};
use crate::transport::Transport;

/// What a key press asks manual mode to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JogAction {
    /// Relative move.
    Jog(f64, f64),
    Pattern(PatternKind),
    Leave,
    Help,
}

/// Map a key press to its manual-mode action.
pub fn resolve(key: Key, step: f64) -> JogAction {
    match key {
        Key::Up => JogAction::Jog(0.0, step),
        Key::Down => JogAction::Jog(0.0, -step),
        Key::Left => JogAction::Jog(step, 0.0),
        Key::Right => JogAction::Jog(-step, 0.0),
        key if key.is_quit() => JogAction::Leave,
        Key::Char(c) => PatternKind::from_hotkey(c).map_or(JogAction::Help, JogAction::Pattern),
        _ => JogAction::Help,
    }
}

/// Interactive jog session over an open plotter.
pub struct ManualMode<'r> {
    runner: &'r PatternRunner,
    jog_step: f64,
}

impl<'r> ManualMode<'r> {
    pub fn new(runner: &'r PatternRunner, jog_step: f64) -> Self {
        Self { runner, jog_step }
    }

    /// Handle key presses until `Q`, or until a quit during a pattern shuts
    /// the plotter down (reported as [`Outcome::Stopped`]).
    pub fn run<T: Transport, K: Keyboard>(
        &self,
        plotter: &mut Plotter<T, K>,
    ) -> Result<Outcome, PlotterError> {
        info!("Entering manual mode");
        print_help();
        let outcome = self.session(plotter);
        info!("Leaving manual mode");
        match outcome {
            Err(PlotterError::Interrupted) => Ok(Outcome::Stopped),
            other => other,
        }
    }

    fn session<T: Transport, K: Keyboard>(
        &self,
        plotter: &mut Plotter<T, K>,
    ) -> Result<Outcome, PlotterError> {
        skip_recoverable("Mode change", plotter.set_mode(CoordinateMode::Relative))?;

        loop {
            let key = plotter.poll_until(|p| p.poll_key())?;
            match resolve(key, self.jog_step) {
                JogAction::Jog(dx, dy) => skip_recoverable("Jog", plotter.move_xy(dx, dy))?,
                JogAction::Pattern(kind) => {
                    if self.runner.run(kind, plotter)? == Outcome::Stopped
                        && plotter.run_state().is_shutdown()
                    {
                        return Ok(Outcome::Stopped);
                    }
                    skip_recoverable("Mode change", plotter.set_mode(CoordinateMode::Relative))?;
                }
                JogAction::Leave => return Ok(Outcome::Completed),
                JogAction::Help => print_help(),
            }
        }
    }
}

fn print_help() {
    for line in patterns::help() {
        info!("{line}");
    }
}
