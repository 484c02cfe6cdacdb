//! Tracing subscriber setup for a terminal in raw mode.
//!
//! Raw mode turns off the terminal's `\n` → `\r\n` translation, so log
//! lines are written through [`CrlfWriter`], which puts it back.

use std::io::{self, Write};

use tracing_subscriber::EnvFilter;

/// Writer that expands every `\n` into `\r\n`.
#[derive(Debug)]
pub struct CrlfWriter<W> {
    inner: W,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, _) in buf.iter().enumerate().filter(|(_, b)| **b == b'\n') {
            self.inner.write_all(&buf[start..i])?;
            self.inner.write_all(b"\r\n")?;
            start = i + 1;
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(|| CrlfWriter::new(io::stderr()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newlines_become_crlf() {
        let mut writer = CrlfWriter::new(Vec::new());
        let n = writer.write(b"one\ntwo\n").unwrap();
        assert_eq!(n, 8);
        assert_eq!(writer.into_inner(), b"one\r\ntwo\r\n".to_vec());
    }

    #[test]
    fn test_text_without_newline_passes_through() {
        let mut writer = CrlfWriter::new(Vec::new());
        writer.write_all(b"G01 X1.000").unwrap();
        assert_eq!(writer.into_inner(), b"G01 X1.000".to_vec());
    }
}
