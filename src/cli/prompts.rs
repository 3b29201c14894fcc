//! Interactive password entry.

use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Result of feeding one key to the password line editor
#[derive(Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Submit,
    Cancel,
}

/// Apply a key event to the hidden input buffer
pub fn apply_key(buffer: &mut String, key_code: KeyCode, modifiers: KeyModifiers) -> KeyOutcome {
    match key_code {
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Esc => KeyOutcome::Cancel,
        // Ctrl+C / Ctrl+D abort like a shell would
        KeyCode::Char('c') | KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
            KeyOutcome::Cancel
        }
        // Ctrl+U clears the line
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.clear();
            KeyOutcome::Continue
        }
        KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.push(c);
            KeyOutcome::Continue
        }
        KeyCode::Backspace => {
            buffer.pop();
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

/// Restores cooked mode when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Ask for the ssh password without echoing it
pub fn prompt_password(destination: &str) -> io::Result<String> {
    eprint!("Password for {}: ", destination);
    io::stderr().flush()?;

    let mut password = String::new();
    let outcome = {
        let _raw = RawModeGuard::enable()?;
        loop {
            if let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? {
                if kind != KeyEventKind::Press {
                    continue;
                }
                match apply_key(&mut password, code, modifiers) {
                    KeyOutcome::Continue => {}
                    done => break done,
                }
            }
        }
    };
    eprintln!();

    match outcome {
        KeyOutcome::Submit => Ok(password),
        _ => Err(io::Error::new(io::ErrorKind::Interrupted, "password entry cancelled")),
    }
}
