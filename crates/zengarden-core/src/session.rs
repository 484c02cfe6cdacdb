//! One connection's lifetime: open, run a program, close.

use tracing::info;
use zengarden_config::AppConfig;

use crate::controller::{Plotter, PlotterError, PlotterSettings};
use crate::keyboard::Keyboard;
use crate::manual::ManualMode;
use crate::patterns::{Outcome, PatternKind, PatternRunner};
use crate::transport::{Connect, Transport};

/// What to do once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// Alternate the circle and box-from-center patterns until quit.
    Demo,
    /// Draw a single pattern.
    Pattern(PatternKind),
    /// Interactive jog mode.
    Manual,
}

/// Connect to the configured port, run `program`, and close the link.
///
/// Fails with [`PlotterError::Open`] if the port cannot be acquired, in
/// which case nothing is sent. The link is closed on every other path,
/// including errors.
pub fn run<C, K>(
    connector: &C,
    keyboard: K,
    config: &AppConfig,
    program: Program,
) -> Result<Outcome, PlotterError>
where
    C: Connect,
    K: Keyboard,
{
    let mut plotter = match Plotter::open(
        connector,
        &config.serial.port,
        config.serial.baud_rate,
        keyboard,
        PlotterSettings::from(config),
    ) {
        Ok(plotter) => plotter,
        // Quitting before the device answered is not a connection failure.
        Err(PlotterError::Setup(e)) if matches!(*e, PlotterError::Interrupted) => {
            return Ok(Outcome::Stopped);
        }
        Err(e) => return Err(e),
    };

    let runner = PatternRunner::from_config(config);
    let result = match program {
        Program::Demo => demo(&runner, &mut plotter),
        Program::Pattern(kind) => runner.run(kind, &mut plotter),
        Program::Manual => ManualMode::new(&runner, config.plotter.jog_step).run(&mut plotter),
    };

    plotter.close();
    result
}

fn demo<T: Transport, K: Keyboard>(
    runner: &PatternRunner,
    plotter: &mut Plotter<T, K>,
) -> Result<Outcome, PlotterError> {
    let mut passes = 0u64;
    while !plotter.run_state().is_shutdown() {
        for kind in [PatternKind::Circle, PatternKind::BoxFromCenter] {
            if runner.run(kind, plotter)? == Outcome::Stopped {
                info!(passes, "Demo stopped");
                return Ok(Outcome::Stopped);
            }
        }
        passes += 1;
        info!(passes, "Demo pass complete");
    }
    Ok(Outcome::Stopped)
}
