//! In-memory transport and keyboard for driving the controller in tests.
//!
//! [`MockTransport`] behaves like a small G-code device: it can announce
//! itself on connect and answers every terminated command line with an
//! acknowledgement. A [`MockProbe`] handle reads back everything the
//! controller wrote. [`ScriptedKeyboard`] replays key presses, optionally
//! only after a number of polls so a press can land mid-pattern.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::command::TERMINATOR;
use crate::keyboard::{Key, Keyboard};
use crate::transport::{Connect, Transport, TransportError};

/// Greeting sent by [`MockTransport::new`] when the link opens.
pub const DEFAULT_GREETING: &[u8] = b"Grbl 1.1f ['$' for help]\r\n";

/// Reply queued after every terminated command.
pub const DEFAULT_ACK: &[u8] = b"ok\r\n";

#[derive(Debug, Default)]
struct DeviceState {
    written: Vec<u8>,
    inbound: VecDeque<u8>,
    greeting: Option<Vec<u8>>,
    ack: Option<Vec<u8>>,
    short_write_prefix: Option<String>,
    connects: Vec<(String, u32)>,
    close_count: usize,
    open: bool,
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A scripted plotter on the other end of the link.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<DeviceState>>,
}

impl MockTransport {
    /// A device that greets on connect and acknowledges every command.
    pub fn new() -> Self {
        Self::silent()
            .with_greeting(DEFAULT_GREETING)
            .with_ack(DEFAULT_ACK)
    }

    /// A device that never sends anything.
    pub fn silent() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                open: true,
                ..DeviceState::default()
            })),
        }
    }

    pub fn with_greeting(self, greeting: &[u8]) -> Self {
        lock(&self.state).greeting = Some(greeting.to_vec());
        self
    }

    pub fn with_ack(self, ack: &[u8]) -> Self {
        lock(&self.state).ack = Some(ack.to_vec());
        self
    }

    /// Accept only half of any write whose payload starts with `prefix`.
    pub fn with_short_write(self, prefix: &str) -> Self {
        lock(&self.state).short_write_prefix = Some(prefix.to_string());
        self
    }

    /// Queue bytes as if the device had sent them.
    pub fn push_inbound(&self, bytes: &[u8]) {
        lock(&self.state).inbound.extend(bytes);
    }

    /// A read handle that stays valid after the transport moves into a controller.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn on_connect(&self, port: &str, baud_rate: u32) {
        let mut state = lock(&self.state);
        state.connects.push((port.to_string(), baud_rate));
        state.open = true;
        if let Some(greeting) = state.greeting.clone() {
            state.inbound.extend(greeting);
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::Closed);
        }
        let accepted = match &state.short_write_prefix {
            Some(prefix) if bytes.starts_with(prefix.as_bytes()) => bytes.len() / 2,
            _ => bytes.len(),
        };
        state.written.extend_from_slice(&bytes[..accepted]);
        if accepted == bytes.len() && bytes.ends_with(TERMINATOR) {
            if let Some(ack) = state.ack.clone() {
                state.inbound.extend(ack);
            }
        }
        Ok(accepted)
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let state = lock(&self.state);
        if !state.open {
            return Err(TransportError::Closed);
        }
        Ok(state.inbound.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::Closed);
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
    }
}

/// Read-only view of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockProbe {
    state: Arc<Mutex<DeviceState>>,
}

impl MockProbe {
    /// Every byte written so far.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }

    /// Written command lines with their terminators removed.
    ///
    /// A trailing fragment without a terminator (e.g. a short write) is
    /// returned as its own entry.
    pub fn commands(&self) -> Vec<String> {
        let written = String::from_utf8_lossy(&lock(&self.state).written).into_owned();
        let mut commands: Vec<String> = written.split(";\n").map(str::to_string).collect();
        if commands.last().is_some_and(String::is_empty) {
            commands.pop();
        }
        commands
    }

    /// Number of written commands starting with `mnemonic`.
    pub fn count(&self, mnemonic: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(mnemonic))
            .count()
    }

    /// Bytes still waiting to be read by the controller.
    pub fn unread(&self) -> usize {
        lock(&self.state).inbound.len()
    }

    /// `(port, baud_rate)` of every connect attempt.
    pub fn connects(&self) -> Vec<(String, u32)> {
        lock(&self.state).connects.clone()
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).close_count
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }
}

/// Hands out a [`MockTransport`], or refuses like an absent device.
#[derive(Debug, Clone)]
pub struct MockConnector {
    transport: MockTransport,
    available: bool,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            available: true,
        }
    }

    /// A connector whose port cannot be opened.
    pub fn unavailable(transport: MockTransport) -> Self {
        Self {
            transport,
            available: false,
        }
    }
}

impl Connect for MockConnector {
    type Transport = MockTransport;

    fn connect(&self, port: &str, baud_rate: u32) -> Result<MockTransport, TransportError> {
        if !self.available {
            lock(&self.transport.state)
                .connects
                .push((port.to_string(), baud_rate));
            return Err(TransportError::Open {
                port: port.to_string(),
                baud_rate,
                reason: "device not present".to_string(),
            });
        }
        self.transport.on_connect(port, baud_rate);
        Ok(self.transport.clone())
    }
}

#[derive(Debug, Default)]
struct Script {
    /// Key presses and the poll count at which each becomes visible.
    keys: VecDeque<(u64, Key)>,
    polls: u64,
}

/// Replays key presses in order. Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeyboard {
    script: Arc<Mutex<Script>>,
}

impl ScriptedKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A keyboard with `keys` already pressed.
    pub fn with_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        let keyboard = Self::new();
        for key in keys {
            keyboard.press(key);
        }
        keyboard
    }

    /// Press `key` now.
    pub fn press(&self, key: Key) {
        self.press_after(0, key);
    }

    /// Press `key` once `polls` more pending-checks have happened.
    pub fn press_after(&self, polls: u64, key: Key) {
        let mut script = self.lock();
        let due = script.polls + polls;
        script.keys.push_back((due, key));
    }

    /// How many times `key_pending` has been called.
    pub fn polls(&self) -> u64 {
        self.lock().polls
    }

    /// Presses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().keys.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Keyboard for ScriptedKeyboard {
    fn key_pending(&mut self) -> io::Result<bool> {
        let mut script = self.lock();
        script.polls += 1;
        let polls = script.polls;
        Ok(script.keys.front().is_some_and(|(due, _)| *due <= polls))
    }

    fn read_key(&mut self) -> io::Result<Key> {
        self.lock()
            .keys
            .pop_front()
            .map(|(_, key)| key)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "key script exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_greeting_and_ack() {
        let connector = MockConnector::new(MockTransport::new());
        let mut transport = connector.connect("COM8", 57600).unwrap();
        let probe = transport.probe();
        assert_eq!(probe.unread(), DEFAULT_GREETING.len());

        let mut buf = [0u8; 64];
        let n = transport.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], DEFAULT_GREETING);

        transport.send(b"G90").unwrap();
        assert_eq!(probe.unread(), 0);
        transport.send(TERMINATOR).unwrap();
        assert_eq!(probe.unread(), DEFAULT_ACK.len());
        assert_eq!(probe.commands(), vec!["G90".to_string()]);
    }

    #[test]
    fn test_short_write() {
        let mut transport = MockTransport::silent().with_short_write("G01");
        assert_eq!(transport.send(b"G01 X1.000 Y1.000").unwrap(), 8);
        assert_eq!(transport.send(b"G90").unwrap(), 3);
    }

    #[test]
    fn test_unavailable_connector() {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let connector = MockConnector::unavailable(transport);
        assert!(matches!(
            connector.connect("COM8", 57600),
            Err(TransportError::Open { .. })
        ));
        assert_eq!(probe.connects(), vec![("COM8".to_string(), 57600)]);
        assert!(probe.written().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut transport = MockTransport::new();
        let probe = transport.probe();
        transport.close();
        transport.close();
        assert_eq!(probe.close_count(), 1);
        assert!(matches!(transport.send(b"G90"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_scripted_keyboard_delay() {
        let mut keyboard = ScriptedKeyboard::new();
        keyboard.press_after(2, Key::Char('Q'));
        assert!(!keyboard.key_pending().unwrap());
        assert!(keyboard.key_pending().unwrap());
        assert_eq!(keyboard.read_key().unwrap(), Key::Char('Q'));
        assert_eq!(keyboard.poll_key().unwrap(), None);
        assert_eq!(keyboard.polls(), 3);
    }

    #[test]
    fn test_scripted_keyboard_replays_in_order() {
        let mut keyboard = ScriptedKeyboard::with_keys([Key::Up, Key::Char('Q')]);
        assert_eq!(keyboard.remaining(), 2);
        assert_eq!(keyboard.poll_key().unwrap(), Some(Key::Up));
        assert_eq!(keyboard.poll_key().unwrap(), Some(Key::Char('Q')));
        assert!(keyboard.read_key().is_err());
    }
}
