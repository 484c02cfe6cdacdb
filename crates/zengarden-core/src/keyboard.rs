//! Non-blocking keyboard input.
//!
//! [`TerminalKeyboard`] puts the terminal into raw mode so single key presses
//! are delivered immediately, and restores it when dropped.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// A key press, reduced to what the plotter reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    /// A printable key, upper-cased.
    Char(char),
    /// Ctrl-C. Handled like `Q`.
    Interrupt,
    Other,
}

impl Key {
    /// Whether this key asks the program to quit.
    pub fn is_quit(self) -> bool {
        matches!(self, Key::Char('Q') | Key::Interrupt)
    }
}

impl From<KeyEvent> for Key {
    fn from(event: KeyEvent) -> Self {
        match (event.modifiers, event.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => Key::Interrupt,
            (_, KeyCode::Up) => Key::Up,
            (_, KeyCode::Down) => Key::Down,
            (_, KeyCode::Left) => Key::Left,
            (_, KeyCode::Right) => Key::Right,
            (_, KeyCode::Char(c)) => Key::Char(c.to_ascii_uppercase()),
            _ => Key::Other,
        }
    }
}

/// Source of key presses.
pub trait Keyboard {
    /// Whether a key press is waiting. Never blocks.
    fn key_pending(&mut self) -> io::Result<bool>;

    /// Consume one key press, blocking until one arrives.
    fn read_key(&mut self) -> io::Result<Key>;

    /// Consume a key press if one is waiting.
    fn poll_key(&mut self) -> io::Result<Option<Key>> {
        if self.key_pending()? {
            self.read_key().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// The controlling terminal, read through `crossterm`.
pub struct TerminalKeyboard {
    /// A press already taken off the event queue by `key_pending`.
    pending: Option<Key>,
}

impl TerminalKeyboard {
    /// Enable raw mode on the controlling terminal.
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { pending: None })
    }
}

impl Keyboard for TerminalKeyboard {
    fn key_pending(&mut self) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        // Release events (reported on Windows) are drained here so they never count as pending.
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    self.pending = Some(key.into());
                    return Ok(true);
                }
                _ => {}
            }
        }
        Ok(false)
    }

    fn read_key(&mut self) -> io::Result<Key> {
        if let Some(key) = self.pending.take() {
            return Ok(key);
        }
        loop {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                return Ok(key.into());
            }
        }
    }
}

impl Drop for TerminalKeyboard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
