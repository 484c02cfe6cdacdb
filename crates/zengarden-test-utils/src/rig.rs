//! A plotter wired to an in-memory device and a scripted keyboard.

use zengarden_config::AppConfig;
use zengarden_core::mock::{MockConnector, MockProbe, MockTransport, ScriptedKeyboard};
use zengarden_core::session::{self, Program};
use zengarden_core::{Outcome, Plotter, PlotterError, PlotterSettings};

/// Everything a test needs to drive and observe a mock plotter.
pub struct TestRig {
    pub config: AppConfig,
    pub connector: MockConnector,
    pub probe: MockProbe,
    pub keyboard: ScriptedKeyboard,
}

impl TestRig {
    /// A rig whose device greets and acknowledges every command.
    pub fn new(config: AppConfig) -> Self {
        Self::with_transport(config, MockTransport::new())
    }

    pub fn with_transport(config: AppConfig, transport: MockTransport) -> Self {
        let probe = transport.probe();
        Self {
            config,
            connector: MockConnector::new(transport),
            probe,
            keyboard: ScriptedKeyboard::new(),
        }
    }

    /// A rig whose serial port cannot be opened.
    pub fn unavailable(config: AppConfig) -> Self {
        let transport = MockTransport::new();
        let probe = transport.probe();
        Self {
            config,
            connector: MockConnector::unavailable(transport),
            probe,
            keyboard: ScriptedKeyboard::new(),
        }
    }

    /// Open a plotter on the configured port.
    pub fn open(&self) -> Result<Plotter<MockTransport, ScriptedKeyboard>, PlotterError> {
        Plotter::open(
            &self.connector,
            &self.config.serial.port,
            self.config.serial.baud_rate,
            self.keyboard.clone(),
            PlotterSettings::from(&self.config),
        )
    }

    /// Run a whole session against the mock device.
    pub fn run(&self, program: Program) -> Result<Outcome, PlotterError> {
        session::run(&self.connector, self.keyboard.clone(), &self.config, program)
    }

    /// G01 commands written so far.
    pub fn moves(&self) -> Vec<String> {
        self.probe
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("G01"))
            .collect()
    }
}
