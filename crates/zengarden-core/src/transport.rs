//! Byte-level serial transport.
//!
//! The controller only needs four primitives from the link: write bytes,
//! ask how many bytes are waiting, read bytes, and close. [`Connect`]
//! acquires a [`Transport`] for a named port so the controller can be driven
//! by a real serial port or by [`crate::mock::MockConnector`] in tests.

use std::io::{Read, Write};
use std::time::Duration;

use tracing::{debug, info};

/// Errors from the serial transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not open serial port {port} at {baud_rate} baud: {reason}")]
    Open {
        port: String,
        baud_rate: u32,
        reason: String,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port is closed")]
    Closed,
}

/// An open, exclusively owned link to the device.
pub trait Transport {
    /// Write `bytes`, returning how many were accepted.
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Number of received bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read up to `buf.len()` received bytes.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Release the underlying handle. Calling it again has no effect.
    fn close(&mut self);
}

/// Acquires transports by port name.
pub trait Connect {
    type Transport: Transport;

    fn connect(&self, port: &str, baud_rate: u32) -> Result<Self::Transport, TransportError>;
}

/// Opens [`SerialTransport`]s through the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    timeout: Duration,
}

impl SerialConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Connect for SerialConnector {
    type Transport = SerialTransport;

    fn connect(&self, port: &str, baud_rate: u32) -> Result<SerialTransport, TransportError> {
        let handle = serialport::new(port, baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| TransportError::Open {
                port: port.to_string(),
                baud_rate,
                reason: e.to_string(),
            })?;
        info!(port, baud_rate, "Serial port opened");
        Ok(SerialTransport {
            port: port.to_string(),
            handle: Some(handle),
        })
    }
}

/// A serial port opened by [`SerialConnector`].
pub struct SerialTransport {
    port: String,
    handle: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    fn handle(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, TransportError> {
        self.handle.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let handle = self.handle()?;
        let written = handle.write(bytes)?;
        handle.flush()?;
        Ok(written)
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let waiting = self
            .handle()?
            .bytes_to_read()
            .map_err(|e| TransportError::Io(e.into()))?;
        Ok(waiting as usize)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.handle()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!(port = %self.port, "Serial port closed");
        }
    }
}
