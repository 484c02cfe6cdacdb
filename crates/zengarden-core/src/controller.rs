//! The plotter controller: command/acknowledgement handshake and
//! cooperative keyboard interrupts.
//!
//! A [`Plotter`] owns the serial [`Transport`] and the [`Keyboard`]. Every
//! command goes through [`Plotter::send_command`], which first waits for the
//! device to answer the previous command, so at most one command is ever in
//! flight. All waiting happens in [`Plotter::poll_until`], which yields the
//! thread between attempts and consults the keyboard on every idle spin so a
//! pause or quit request is noticed even while the device is busy.
//!
//! The acknowledgement is not validated: any inbound bytes mean "ready".

use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use zengarden_config::{AppConfig, CoordinateMode};

use crate::command::{ArcDirection, Command, TERMINATOR};
use crate::keyboard::{Key, Keyboard};
use crate::run_state::{Flow, RunState};
use crate::transport::{Connect, Transport, TransportError};

const READ_BUFFER_LEN: usize = 1024;

/// Errors from the plotter controller.
#[derive(Debug, thiserror::Error)]
pub enum PlotterError {
    #[error("could not connect to the plotter: {0}")]
    Open(#[source] TransportError),

    #[error("mode setup command failed: {0}")]
    Setup(#[source] Box<PlotterError>),

    #[error("partial write of [{command}]: {written} of {expected} bytes")]
    PartialWrite {
        command: String,
        written: usize,
        expected: usize,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("keyboard error: {0}")]
    Keyboard(#[source] std::io::Error),

    #[error("interrupted by operator")]
    Interrupted,
}

impl PlotterError {
    /// Whether the caller may log this failure and carry on with the next command.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlotterError::PartialWrite { .. })
    }
}

/// Log a recoverable failure of `action` at WARN and carry on; any other
/// error is passed through.
pub fn skip_recoverable(
    action: &str,
    result: Result<(), PlotterError>,
) -> Result<(), PlotterError> {
    match result {
        Err(e) if e.is_recoverable() => {
            warn!(error = %e, "{action} failed, continuing");
            Ok(())
        }
        other => other,
    }
}

/// Controller behaviour taken from the configuration.
#[derive(Debug, Clone, Copy)]
pub struct PlotterSettings {
    /// Mode-setup command sent by [`Plotter::open`].
    pub mode: CoordinateMode,
    /// Open-loop pacing delay after every command.
    pub command_delay: Duration,
}

impl From<&AppConfig> for PlotterSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            mode: config.plotter.coordinate_mode,
            command_delay: Duration::from_millis(config.plotter.command_delay_ms),
        }
    }
}

/// What pattern generators need from the controller: motion primitives and
/// a way to find out whether they should stop.
pub trait Motion {
    /// Linear move to (absolute mode) or by (relative mode) `x`, `y`.
    fn move_xy(&mut self, x: f64, y: f64) -> Result<(), PlotterError>;

    /// Circular move ending at `x`, `y` around the centre offset `i`, `j`.
    fn arc(
        &mut self,
        x: f64,
        y: f64,
        i: f64,
        j: f64,
        direction: ArcDirection,
    ) -> Result<(), PlotterError>;

    fn set_mode(&mut self, mode: CoordinateMode) -> Result<(), PlotterError>;

    fn home(&mut self) -> Result<(), PlotterError>;

    /// Non-blocking check for pause/quit requests.
    fn check_interrupt(&mut self) -> Result<Flow, PlotterError>;
}

/// The plotter on the other end of a serial link.
pub struct Plotter<T: Transport, K: Keyboard> {
    /// `None` once closed.
    transport: Option<T>,
    keyboard: K,
    mode: CoordinateMode,
    /// Diagnostic only; never used to build commands.
    position: (f64, f64),
    state: RunState,
    command_delay: Duration,
}

impl<T: Transport, K: Keyboard> Plotter<T, K> {
    /// Connect to `port` and send the mode-setup command.
    ///
    /// A mode-setup failure closes the link again and is reported as
    /// [`PlotterError::Setup`].
    pub fn open<C>(
        connector: &C,
        port: &str,
        baud_rate: u32,
        keyboard: K,
        settings: PlotterSettings,
    ) -> Result<Self, PlotterError>
    where
        C: Connect<Transport = T>,
    {
        let transport = connector.connect(port, baud_rate).map_err(|e| {
            error!(port, baud_rate, error = %e, "Could not open the serial port");
            PlotterError::Open(e)
        })?;

        let mut plotter = Self {
            transport: Some(transport),
            keyboard,
            mode: settings.mode,
            position: (0.0, 0.0),
            state: RunState::Running,
            command_delay: settings.command_delay,
        };

        if let Err(e) = plotter.set_mode(settings.mode) {
            plotter.close();
            return Err(PlotterError::Setup(Box::new(e)));
        }
        Ok(plotter)
    }

    /// Release the transport. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            info!("Disconnecting from plotter");
            transport.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn mode(&self) -> CoordinateMode {
        self.mode
    }

    /// The tool position as tracked from the commands sent so far.
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Send one command line and its terminator.
    ///
    /// Waits for the previous command's acknowledgement first. Returns
    /// [`PlotterError::Interrupted`] without writing anything if the operator
    /// quits during that wait.
    pub fn send_command(&mut self, command: &Command) -> Result<(), PlotterError> {
        if self.state.is_shutdown() {
            return Err(PlotterError::Interrupted);
        }
        self.drain_incoming()?;

        debug!(command = %command, "Sending command");
        let transport = self.transport_mut()?;
        let written = transport.send(command.as_bytes())?;
        if written != command.len() {
            warn!(command = %command, written, expected = command.len(), "Could not send command to plotter");
            return Err(PlotterError::PartialWrite {
                command: command.to_string(),
                written,
                expected: command.len(),
            });
        }
        let written = transport.send(TERMINATOR)?;
        if written != TERMINATOR.len() {
            warn!(command = %command, written, "Could not terminate command");
            return Err(PlotterError::PartialWrite {
                command: command.to_string(),
                written,
                expected: TERMINATOR.len(),
            });
        }

        if !self.command_delay.is_zero() {
            thread::sleep(self.command_delay);
        }
        Ok(())
    }

    /// Wait until the device has sent something, then read and log all of it.
    pub fn drain_incoming(&mut self) -> Result<(), PlotterError> {
        self.poll_until(|plotter| {
            if plotter.transport_mut()?.bytes_available()? > 0 {
                return Ok(Some(()));
            }
            match plotter.check_interrupt()? {
                Flow::Stop => Err(PlotterError::Interrupted),
                Flow::Continue => Ok(None),
            }
        })?;

        let mut buf = [0u8; READ_BUFFER_LEN];
        loop {
            let n = self.transport_mut()?.receive(&mut buf)?;
            if n > 0 {
                let reply = String::from_utf8_lossy(&buf[..n]);
                info!(reply = %reply.trim_end(), "Plotter replied");
            }
            if self.check_interrupt()?.is_stop() {
                return Err(PlotterError::Interrupted);
            }
            if self.transport_mut()?.bytes_available()? == 0 {
                return Ok(());
            }
        }
    }

    /// Look at the keyboard without waiting.
    ///
    /// `Q` (or Ctrl-C) shuts down. Any other key pauses; while paused this
    /// spins until the next key, which resumes (or quits). Once shut down,
    /// every call returns [`Flow::Stop`].
    pub fn check_interrupt(&mut self) -> Result<Flow, PlotterError> {
        if self.state.is_shutdown() {
            return Ok(Flow::Stop);
        }
        let Some(key) = self.keyboard.poll_key().map_err(PlotterError::Keyboard)? else {
            return Ok(Flow::Continue);
        };

        if key.is_quit() {
            warn!("Quit requested");
            self.state = RunState::Shutdown;
            return Ok(Flow::Stop);
        }

        match self.state.toggled() {
            RunState::Paused => {
                warn!("Paused, press any key to resume or Q to quit");
                self.state = RunState::Paused;
                self.poll_until(|plotter| {
                    let flow = plotter.check_interrupt()?;
                    Ok((flow.is_stop() || plotter.state != RunState::Paused).then_some(flow))
                })
            }
            state => {
                info!("Running");
                self.state = state;
                Ok(Flow::Continue)
            }
        }
    }

    /// Consume a pending key press for the caller's own use.
    ///
    /// Manual mode reads jog keys through this, since the plotter owns the keyboard.
    pub fn poll_key(&mut self) -> Result<Option<Key>, PlotterError> {
        self.keyboard.poll_key().map_err(PlotterError::Keyboard)
    }

    /// Evaluate `ready` until it produces a value, yielding the thread
    /// between attempts. Errors from `ready` end the wait.
    pub fn poll_until<R>(
        &mut self,
        mut ready: impl FnMut(&mut Self) -> Result<Option<R>, PlotterError>,
    ) -> Result<R, PlotterError> {
        loop {
            if let Some(value) = ready(self)? {
                return Ok(value);
            }
            thread::yield_now();
        }
    }

    fn transport_mut(&mut self) -> Result<&mut T, PlotterError> {
        self.transport
            .as_mut()
            .ok_or(PlotterError::Transport(TransportError::Closed))
    }

    fn track(&mut self, x: f64, y: f64) {
        self.position = match self.mode {
            CoordinateMode::Absolute => (x, y),
            CoordinateMode::Relative => (self.position.0 + x, self.position.1 + y),
        };
        debug!(x = self.position.0, y = self.position.1, "Tracked position");
    }
}

impl<T: Transport, K: Keyboard> Motion for Plotter<T, K> {
    fn move_xy(&mut self, x: f64, y: f64) -> Result<(), PlotterError> {
        debug!(x, y, "Move");
        self.track(x, y);
        self.send_command(&Command::linear(x, y))
    }

    fn arc(
        &mut self,
        x: f64,
        y: f64,
        i: f64,
        j: f64,
        direction: ArcDirection,
    ) -> Result<(), PlotterError> {
        debug!(?direction, x, y, i, j, "Arc");
        self.track(x, y);
        self.send_command(&Command::arc(direction, x, y, i, j))
    }

    fn set_mode(&mut self, mode: CoordinateMode) -> Result<(), PlotterError> {
        self.send_command(&Command::mode(mode))?;
        self.mode = mode;
        Ok(())
    }

    fn home(&mut self) -> Result<(), PlotterError> {
        info!("Going home");
        self.send_command(&Command::home())?;
        self.position = (0.0, 0.0);
        Ok(())
    }

    fn check_interrupt(&mut self) -> Result<Flow, PlotterError> {
        Plotter::check_interrupt(self)
    }
}

impl<T: Transport, K: Keyboard> Drop for Plotter<T, K> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockTransport, ScriptedKeyboard};
    use pretty_assertions::assert_eq;

    fn settings(mode: CoordinateMode) -> PlotterSettings {
        PlotterSettings {
            mode,
            command_delay: Duration::ZERO,
        }
    }

    fn open_with(
        transport: MockTransport,
        keyboard: ScriptedKeyboard,
        mode: CoordinateMode,
    ) -> Plotter<MockTransport, ScriptedKeyboard> {
        Plotter::open(
            &MockConnector::new(transport),
            "COM8",
            57600,
            keyboard,
            settings(mode),
        )
        .unwrap()
    }

    #[test]
    fn test_open_sends_mode_setup() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let plotter = open_with(transport, ScriptedKeyboard::new(), CoordinateMode::Relative);
        assert_eq!(probe.commands(), vec!["G91".to_string()]);
        assert_eq!(plotter.mode(), CoordinateMode::Relative);
        assert_eq!(probe.connects(), vec![("COM8".to_string(), 57600)]);
    }

    #[test]
    fn test_open_failure_sends_nothing() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let result = Plotter::open(
            &MockConnector::unavailable(transport),
            "COM8",
            57600,
            ScriptedKeyboard::new(),
            settings(CoordinateMode::Absolute),
        );
        assert!(matches!(result, Err(PlotterError::Open(_))));
        assert!(probe.written().is_empty());
    }

    #[test]
    fn test_setup_failure_closes_link() {
        let transport = MockTransport::new().with_short_write("G90");
        let probe = transport.probe();
        let result = Plotter::open(
            &MockConnector::new(transport),
            "COM8",
            57600,
            ScriptedKeyboard::new(),
            settings(CoordinateMode::Absolute),
        );
        assert!(matches!(result, Err(PlotterError::Setup(_))));
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_command_framing() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let mut plotter = open_with(transport, ScriptedKeyboard::new(), CoordinateMode::Absolute);
        plotter.move_xy(1.5, -2.0).unwrap();
        assert_eq!(probe.written(), b"G90;\nG01 X1.500 Y-2.000;\n".to_vec());
    }

    #[test]
    fn test_partial_write_is_reported() {
        let transport = MockTransport::new().with_short_write("G01");
        let probe = transport.probe();
        let mut plotter = open_with(transport, ScriptedKeyboard::new(), CoordinateMode::Absolute);

        let err = plotter.move_xy(10.0, 10.0).unwrap_err();
        assert!(err.is_recoverable());
        match err {
            PlotterError::PartialWrite {
                written, expected, ..
            } => {
                assert_eq!(expected, "G01 X10.000 Y10.000".len());
                assert!(written < expected);
            }
            other => panic!("unexpected error: {other}"),
        }
        // No terminator follows a truncated command.
        assert!(!probe.written().ends_with(TERMINATOR));
    }

    #[test]
    fn test_drain_consumes_replies() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let mut plotter = open_with(transport, ScriptedKeyboard::new(), CoordinateMode::Absolute);
        assert!(probe.unread() > 0);
        plotter.drain_incoming().unwrap();
        assert_eq!(probe.unread(), 0);
    }

    #[test]
    fn test_quit_sets_shutdown_permanently() {
        let keyboard = ScriptedKeyboard::new();
        let mut plotter = open_with(MockTransport::new(), keyboard.clone(), CoordinateMode::Absolute);
        keyboard.press(Key::Char('Q'));

        assert_eq!(plotter.check_interrupt().unwrap(), Flow::Stop);
        assert_eq!(plotter.run_state(), RunState::Shutdown);
        assert_eq!(plotter.check_interrupt().unwrap(), Flow::Stop);
        assert!(matches!(
            plotter.move_xy(1.0, 1.0),
            Err(PlotterError::Interrupted)
        ));
    }

    #[test]
    fn test_pause_spins_until_next_key() {
        let keyboard = ScriptedKeyboard::new();
        let mut plotter = open_with(MockTransport::new(), keyboard.clone(), CoordinateMode::Absolute);
        keyboard.press(Key::Char('P'));
        keyboard.press_after(25, Key::Char('R'));
        let before = keyboard.polls();

        assert_eq!(plotter.check_interrupt().unwrap(), Flow::Continue);
        assert_eq!(plotter.run_state(), RunState::Running);
        assert!(keyboard.polls() - before >= 25);
        assert_eq!(keyboard.remaining(), 0);
    }

    #[test]
    fn test_quit_while_paused() {
        let keyboard = ScriptedKeyboard::new();
        let mut plotter = open_with(MockTransport::new(), keyboard.clone(), CoordinateMode::Absolute);
        keyboard.press(Key::Char(' '));
        keyboard.press(Key::Char('Q'));
        assert_eq!(plotter.check_interrupt().unwrap(), Flow::Stop);
        assert_eq!(plotter.run_state(), RunState::Shutdown);
    }

    #[test]
    fn test_quit_during_acknowledgement_wait() {
        let transport = MockTransport::silent();
        // The silent device never answers, so the mode setup must be acknowledged by hand.
        transport.push_inbound(b">");
        let probe = transport.probe();
        let keyboard = ScriptedKeyboard::new();
        let mut plotter = open_with(transport, keyboard.clone(), CoordinateMode::Absolute);

        keyboard.press_after(10, Key::Char('Q'));
        assert!(matches!(
            plotter.move_xy(5.0, 5.0),
            Err(PlotterError::Interrupted)
        ));
        assert_eq!(probe.commands(), vec!["G90".to_string()]);
    }

    #[test]
    fn test_relative_position_closes_loop() {
        let mut plotter = open_with(MockTransport::new(), ScriptedKeyboard::new(), CoordinateMode::Relative);
        let start = plotter.position();
        for (dx, dy) in [(5.0, 0.0), (0.0, 5.0), (-5.0, 0.0), (0.0, -5.0)] {
            plotter.move_xy(dx, dy).unwrap();
        }
        assert_eq!(plotter.position(), start);
    }

    #[test]
    fn test_absolute_position_tracks_target() {
        let mut plotter = open_with(MockTransport::new(), ScriptedKeyboard::new(), CoordinateMode::Absolute);
        plotter.move_xy(40.0, 60.0).unwrap();
        assert_eq!(plotter.position(), (40.0, 60.0));
        plotter.home().unwrap();
        assert_eq!(plotter.position(), (0.0, 0.0));
    }

    #[test]
    fn test_arc_command() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let mut plotter = open_with(transport, ScriptedKeyboard::new(), CoordinateMode::Absolute);
        plotter
            .arc(10.0, 0.0, 5.0, 0.0, ArcDirection::CounterClockwise)
            .unwrap();
        assert_eq!(
            probe.commands().last().unwrap(),
            "G03 X10.000 Y0.000 I5.000 J0.000"
        );
    }

    #[test]
    fn test_close_once_on_drop() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        {
            let mut plotter = open_with(transport, ScriptedKeyboard::new(), CoordinateMode::Absolute);
            plotter.close();
            assert!(!plotter.is_open());
        }
        assert_eq!(probe.close_count(), 1);
        assert!(!probe.is_open());
    }
}
