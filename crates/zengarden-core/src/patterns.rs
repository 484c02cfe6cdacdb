//! Built-in plotting patterns.
//!
//! Each pattern is a sequence of [`Motion`] calls. Patterns that loop poll
//! for interrupts once per iteration (unless configured not to), so pressing
//! `Q` ends them within one iteration.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use zengarden_config::{AppConfig, CoordinateMode, PatternConfig, TableConfig};

use crate::controller::{Motion, PlotterError, skip_recoverable};

/// The patterns this program can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Home,
    Center,
    Border,
    BoxToCenter,
    BoxFromCenter,
    Star,
    Circle,
    Random,
}

impl PatternKind {
    pub const ALL: [PatternKind; 8] = [
        PatternKind::Home,
        PatternKind::Center,
        PatternKind::Border,
        PatternKind::BoxToCenter,
        PatternKind::BoxFromCenter,
        PatternKind::Star,
        PatternKind::Circle,
        PatternKind::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PatternKind::Home => "home",
            PatternKind::Center => "center",
            PatternKind::Border => "border",
            PatternKind::BoxToCenter => "box-to-center",
            PatternKind::BoxFromCenter => "box-from-center",
            PatternKind::Star => "star",
            PatternKind::Circle => "circle",
            PatternKind::Random => "random",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PatternKind::Home => "Go home",
            PatternKind::Center => "Go to center",
            PatternKind::Border => "Outline the working area",
            PatternKind::BoxToCenter => "Nested boxes from the border to the center",
            PatternKind::BoxFromCenter => "Square spiral out from the origin",
            PatternKind::Star => "Crossing sweeps along X then Y",
            PatternKind::Circle => "Concentric rings out from the origin",
            PatternKind::Random => "Random lines",
        }
    }

    /// Manual-mode key that runs this pattern.
    pub fn hotkey(self) -> Option<char> {
        match self {
            PatternKind::Home => Some('1'),
            PatternKind::Center => Some('2'),
            PatternKind::Border => Some('3'),
            PatternKind::BoxToCenter => Some('4'),
            PatternKind::Star => Some('5'),
            PatternKind::Circle => Some('6'),
            PatternKind::Random => Some('7'),
            PatternKind::BoxFromCenter => None,
        }
    }

    pub fn from_hotkey(key: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.hotkey() == Some(key))
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An unrecognised pattern name.
#[derive(Debug, thiserror::Error)]
#[error("unknown pattern {0:?}")]
pub struct UnknownPattern(pub String);

impl FromStr for PatternKind {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPattern(s.to_string()))
    }
}

/// How a pattern ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The operator quit before the pattern finished.
    Stopped,
}

/// Help text listing the manual-mode keys and the patterns.
pub fn help() -> Vec<String> {
    let mut lines = vec![
        format!("ZenGarden {}", env!("CARGO_PKG_VERSION")),
        "Arrows = jog, Q = quit, any other key pauses/resumes a running pattern".to_string(),
    ];
    for kind in PatternKind::ALL {
        let key = kind
            .hotkey()
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        lines.push(format!("{key} = {:<16} {}", kind.name(), kind.description()));
    }
    lines
}

/// Draws patterns on a table of a given size.
#[derive(Debug, Clone)]
pub struct PatternRunner {
    table: TableConfig,
    settings: PatternConfig,
}

impl PatternRunner {
    pub fn new(table: TableConfig, settings: PatternConfig) -> Self {
        Self { table, settings }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.table, config.patterns.clone())
    }

    /// Draw `kind`. Quitting mid-pattern is reported as [`Outcome::Stopped`].
    pub fn run<M: Motion>(&self, kind: PatternKind, motion: &mut M) -> Result<Outcome, PlotterError> {
        let mut pen = Pen {
            motion,
            checks: self.settings.checks_interrupts(kind.name()),
        };
        info!(pattern = %kind, interruptible = pen.checks, "Starting pattern");

        let result = match kind {
            PatternKind::Home => pen.home(),
            PatternKind::Center => self.center(&mut pen),
            PatternKind::Border => self.border(&mut pen),
            PatternKind::BoxToCenter => self.box_to_center(&mut pen),
            PatternKind::BoxFromCenter => self.box_from_center(&mut pen),
            PatternKind::Star => self.star(&mut pen),
            PatternKind::Circle => self.circle(&mut pen),
            PatternKind::Random => self.random(&mut pen),
        };

        match result {
            Ok(()) => {
                info!(pattern = %kind, "Pattern done");
                Ok(Outcome::Completed)
            }
            Err(PlotterError::Interrupted) => {
                info!(pattern = %kind, "Pattern stopped");
                Ok(Outcome::Stopped)
            }
            Err(e) => Err(e),
        }
    }

    fn size(&self) -> (f64, f64) {
        (f64::from(self.table.size_x), f64::from(self.table.size_y))
    }

    fn center<M: Motion>(&self, pen: &mut Pen<'_, M>) -> Result<(), PlotterError> {
        let (sx, sy) = self.size();
        pen.set_mode(CoordinateMode::Absolute)?;
        pen.move_xy(sx / 2.0, sy / 2.0)
    }

    fn border<M: Motion>(&self, pen: &mut Pen<'_, M>) -> Result<(), PlotterError> {
        let (sx, sy) = self.size();
        let b = f64::from(self.settings.border_offset);
        pen.set_mode(CoordinateMode::Absolute)?;
        for (x, y) in [(b, b), (sx, b), (sx, sy), (b, sy), (b, b)] {
            pen.move_xy(x, y)?;
        }
        Ok(())
    }

    fn box_to_center<M: Motion>(&self, pen: &mut Pen<'_, M>) -> Result<(), PlotterError> {
        let (sx, sy) = self.size();
        let size = self.table.box_size();
        let step = self.settings.box_step;
        pen.set_mode(CoordinateMode::Absolute)?;

        for offset in (step..size.saturating_sub(step)).step_by(step as usize) {
            pen.checkpoint()?;
            let o = f64::from(offset);
            for (x, y) in [(o, o), (sx - o, o), (sx - o, sy - o), (o, sy - o), (o, o)] {
                pen.move_xy(x, y)?;
            }
            info!(remaining = (size - offset) / step, total = size / step, "Box to center");
        }
        Ok(())
    }

    /// Visit every lattice point within half the box size of the origin,
    /// spiralling outwards one unit at a time.
    fn box_from_center<M: Motion>(&self, pen: &mut Pen<'_, M>) -> Result<(), PlotterError> {
        let size = i64::from(self.table.box_size());
        let half = size / 2;
        pen.set_mode(CoordinateMode::Absolute)?;
        pen.move_xy(0.0, 0.0)?;

        let (mut x, mut y, mut dx, mut dy) = (0i64, 0i64, 0i64, -1i64);
        for _ in 0..size * size {
            pen.checkpoint()?;
            if (-half..=half).contains(&x) && (-half..=half).contains(&y) {
                pen.move_xy(x as f64, y as f64)?;
            }
            if x == y || (x < 0 && x == -y) || (x > 0 && x == 1 - y) {
                (dx, dy) = (-dy, dx);
            }
            x += dx;
            y += dy;
        }

        pen.move_xy(0.0, 0.0)
    }

    fn star<M: Motion>(&self, pen: &mut Pen<'_, M>) -> Result<(), PlotterError> {
        let (sx, sy) = self.size();
        let b = f64::from(self.settings.border_offset);
        let size = self.table.box_size();
        let step = self.settings.star_step;
        pen.set_mode(CoordinateMode::Absolute)?;

        for offset in (step..size).step_by(step as usize) {
            pen.checkpoint()?;
            let o = f64::from(offset);
            for (x, y) in [(o, b), (o + b, b), (sx - o, sy - b), (sx - o - b, sy - b)] {
                pen.move_xy(x, y)?;
            }
            info!(remaining = (size - offset) / step, total = size / step, "Star X sweep");
        }

        for offset in (1..=size).rev().step_by(step as usize) {
            pen.checkpoint()?;
            let o = f64::from(offset);
            for (x, y) in [(b, o), (b, o + b), (sx - b, sy - o), (sx - b, sy - o - b)] {
                pen.move_xy(x, y)?;
            }
            info!(remaining = offset / step, total = size / step, "Star Y sweep");
        }
        Ok(())
    }

    fn circle<M: Motion>(&self, pen: &mut Pen<'_, M>) -> Result<(), PlotterError> {
        let max_radius = self.table.box_size() / 2;
        let radius_step = self.settings.circle_radius_step as usize;
        let angle_step = self.settings.circle_angle_step as usize;
        pen.set_mode(CoordinateMode::Absolute)?;

        for radius in (self.settings.circle_radius_step..max_radius).step_by(radius_step) {
            let r = f64::from(radius);
            for degrees in (0..360u32).step_by(angle_step) {
                pen.checkpoint()?;
                let angle = f64::from(degrees).to_radians();
                pen.move_xy(angle.cos() * r, angle.sin() * r)?;
            }
        }
        Ok(())
    }

    fn random<M: Motion>(&self, pen: &mut Pen<'_, M>) -> Result<(), PlotterError> {
        let mut rng = match self.settings.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let b = self.settings.border_offset;
        let steps = self.settings.random_steps;
        pen.set_mode(CoordinateMode::Absolute)?;
        info!("Press Q to stop, any other key to pause");

        let mut moved = 0u32;
        while steps == 0 || moved < steps {
            pen.checkpoint()?;
            let x = rng.random_range(b..self.table.size_x);
            let y = rng.random_range(b..self.table.size_y);
            pen.move_xy(f64::from(x), f64::from(y))?;
            moved += 1;
        }
        Ok(())
    }
}

/// A [`Motion`] as seen by a running pattern.
struct Pen<'m, M> {
    motion: &'m mut M,
    /// Whether [`Pen::checkpoint`] polls for interrupts.
    checks: bool,
}

impl<M: Motion> Pen<'_, M> {
    fn checkpoint(&mut self) -> Result<(), PlotterError> {
        if self.checks && self.motion.check_interrupt()?.is_stop() {
            return Err(PlotterError::Interrupted);
        }
        Ok(())
    }

    // The wrappers below skip over failures the plotter can recover from.

    fn move_xy(&mut self, x: f64, y: f64) -> Result<(), PlotterError> {
        skip_recoverable("Move", self.motion.move_xy(x, y))
    }

    fn set_mode(&mut self, mode: CoordinateMode) -> Result<(), PlotterError> {
        skip_recoverable("Mode change", self.motion.set_mode(mode))
    }

    fn home(&mut self) -> Result<(), PlotterError> {
        skip_recoverable("Home", self.motion.home())
    }
}
