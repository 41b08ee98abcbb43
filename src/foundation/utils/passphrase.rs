//! Passphrase entry with the typed characters masked.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, IsTerminal, Write};

/// What a key press means for the passphrase being typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Submit,
    Cancel,
}

/// Characters typed so far. Kept apart from the terminal so editing can be
/// tested without one.
#[derive(Debug, Default)]
pub struct PassphraseInput {
    buffer: String,
}

impl PassphraseInput {
    pub fn handle(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind == KeyEventKind::Release {
            return KeyOutcome::Continue;
        }

        match key.code {
            KeyCode::Enter => KeyOutcome::Submit,
            KeyCode::Esc => KeyOutcome::Cancel,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                KeyOutcome::Cancel
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                KeyOutcome::Continue
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                KeyOutcome::Continue
            }
            _ => KeyOutcome::Continue,
        }
    }

    /// Number of characters, i.e. how many `*` are on screen.
    pub fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Prints `message` and reads a passphrase, echoing `*` for each character.
///
/// When stdin is not a terminal (piped input) the line is read as is.
pub fn read_passphrase(message: &str) -> io::Result<String> {
    println!("\x1b[1m{message}\x1b[0m");

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut line = String::new();
        stdin.read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let mut input = PassphraseInput::default();
    let mut stdout = io::stdout();
    let outcome = {
        let _raw = RawModeGuard::enable()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };

            let before = input.len();
            let outcome = input.handle(key);
            if outcome != KeyOutcome::Continue {
                break outcome;
            }

            let after = input.len();
            if after > before {
                write!(stdout, "*")?;
            } else if after < before {
                write!(stdout, "\x08 \x08")?;
            }
            stdout.flush()?;
        }
    };
    println!();

    match outcome {
        KeyOutcome::Cancel => Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "passphrase entry cancelled",
        )),
        _ => Ok(input.into_string()),
    }
}
