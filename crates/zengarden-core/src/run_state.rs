//! Run-state lifecycle shared between the controller and the generators.
//!
//! `Running → Paused → Running ... → Shutdown`. Shutdown is terminal.

use std::fmt;

/// Whether long-running work may proceed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Running,
    Paused,
    Shutdown,
}

impl RunState {
    pub fn is_shutdown(self) -> bool {
        self == RunState::Shutdown
    }

    /// The state after a pause/resume key press. Shutdown never toggles.
    pub fn toggled(self) -> Self {
        match self {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
            RunState::Shutdown => RunState::Shutdown,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Shutdown => "shutdown",
        })
    }
}

/// Answer of an interrupt check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        assert_eq!(RunState::Running.toggled(), RunState::Paused);
        assert_eq!(RunState::Paused.toggled(), RunState::Running);
        assert_eq!(RunState::Shutdown.toggled(), RunState::Shutdown);
    }

    #[test]
    fn test_default_is_running() {
        assert_eq!(RunState::default(), RunState::Running);
        assert!(!RunState::default().is_shutdown());
    }
}
