//! Terminal side of the credential exchange: lists the unauthorized images,
//! reads a selection and a username/password pair.

use crate::auth::Credentials;
use crate::authenticator::{CredentialCollector, CredentialReply};
use crate::store::PendingAuthorization;
use anyhow::{Context, Result};
use colored::*;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Write};

const TIPS: &str = "numbers - select (e.g. 1 3) | all - select every image | Enter on empty line, Ctrl+c or Ctrl+d - finish";

/// RAII guard that restores terminal mode on drop.
struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    fn new() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Finish,
    Positions(Vec<usize>),
}

pub struct TerminalCollector;

impl CredentialCollector for TerminalCollector {
    fn collect(&mut self, pending: &[PendingAuthorization]) -> Result<CredentialReply> {
        println!();
        println!("{}", "Unauthorized images".red().bold());
        for entry in pending {
            println!("  [{}] {}", entry.position + 1, entry.image.raw_name.yellow());
        }
        println!("{}", TIPS.dimmed());

        let positions = loop {
            let Some(line) = read_line("Select images to authorize: ", Echo::Plain)? else {
                return Ok(CredentialReply::Cancel);
            };
            match parse_selection(&line, pending.len()) {
                Ok(Selection::Finish) => return Ok(CredentialReply::Cancel),
                Ok(Selection::Positions(positions)) => break positions,
                Err(msg) => println!("{} {}", "⚠️".yellow(), msg),
            }
        };

        let credentials = match read_credentials()? {
            Some(credentials) => credentials,
            None => return Ok(CredentialReply::Cancel),
        };

        Ok(CredentialReply::Submit(
            positions
                .into_iter()
                .map(|position| (position, credentials.clone()))
                .collect(),
        ))
    }
}

/// `None` when the user cancelled at either prompt.
fn read_credentials() -> Result<Option<Credentials>> {
    let Some(username) = read_line("Enter username: ", Echo::Plain)? else {
        return Ok(None);
    };
    if username.is_empty() {
        return Ok(Some(Credentials::declined()));
    }

    Ok(read_line("Password: ", Echo::Masked)?.map(|password| Credentials::new(username, password)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Plain,
    Masked,
}

/// What a single key press does to the line being typed.
#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    Insert(char),
    Erase,
    Submit,
    Cancel,
    Ignore,
}

fn key_action(key: &KeyEvent) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::Ignore;
    }
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyAction::Cancel
        }
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Backspace => KeyAction::Erase,
        KeyCode::Char(c) => KeyAction::Insert(c),
        _ => KeyAction::Ignore,
    }
}

/// Reads one line in raw mode, so Ctrl+c reaches us as a key instead of
/// killing the process. `None` on Ctrl+c or Ctrl+d.
fn read_line(prompt: &str, echo: Echo) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let line = {
        let _guard = RawModeGuard::new()?;
        read_keys(echo)?
    };
    println!();
    Ok(line.map(|line| match echo {
        Echo::Plain => line.trim().to_string(),
        Echo::Masked => line,
    }))
}

fn read_keys(echo: Echo) -> Result<Option<String>> {
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };

        match key_action(&key) {
            KeyAction::Submit => return Ok(Some(line)),
            KeyAction::Cancel => return Ok(None),
            KeyAction::Erase => {
                if line.pop().is_some() {
                    write!(stdout, "\u{8} \u{8}")?;
                }
            }
            KeyAction::Insert(c) => {
                line.push(c);
                match echo {
                    Echo::Plain => write!(stdout, "{}", c)?,
                    Echo::Masked => write!(stdout, "*")?,
                }
            }
            KeyAction::Ignore => continue,
        }
        stdout.flush()?;
    }
}

/// Parses `1 3`, `1,3` or `all` into zero based positions.
fn parse_selection(input: &str, len: usize) -> std::result::Result<Selection, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Selection::Finish);
    }
    if input.eq_ignore_ascii_case("all") {
        return Ok(Selection::Positions((0..len).collect()));
    }

    let mut positions = Vec::new();
    for token in input.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        let number: usize = token
            .parse()
            .map_err(|_| format!("'{}' is not a number", token))?;
        if number == 0 || number > len {
            return Err(format!("{} is out of range 1-{}", number, len));
        }
        if !positions.contains(&(number - 1)) {
            positions.push(number - 1);
        }
    }
    Ok(Selection::Positions(positions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_finishes() {
        assert_eq!(parse_selection("   ", 3), Ok(Selection::Finish));
    }

    #[test]
    fn selects_numbers_as_zero_based_positions() {
        assert_eq!(
            parse_selection("3, 1 3", 3),
            Ok(Selection::Positions(vec![2, 0]))
        );
    }

    #[test]
    fn selects_everything() {
        assert_eq!(
            parse_selection("ALL", 3),
            Ok(Selection::Positions(vec![0, 1, 2]))
        );
    }

    #[test]
    fn rejects_bad_selections() {
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("two", 3).is_err());
    }

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        key_action(&KeyEvent::new(code, modifiers))
    }

    #[test]
    fn control_c_and_control_d_cancel_the_line() {
        assert_eq!(press(KeyCode::Char('c'), KeyModifiers::CONTROL), KeyAction::Cancel);
        assert_eq!(press(KeyCode::Char('d'), KeyModifiers::CONTROL), KeyAction::Cancel);
    }

    #[test]
    fn plain_keys_edit_the_line() {
        assert_eq!(press(KeyCode::Char('c'), KeyModifiers::NONE), KeyAction::Insert('c'));
        assert_eq!(press(KeyCode::Char('D'), KeyModifiers::SHIFT), KeyAction::Insert('D'));
        assert_eq!(press(KeyCode::Backspace, KeyModifiers::NONE), KeyAction::Erase);
        assert_eq!(press(KeyCode::Enter, KeyModifiers::NONE), KeyAction::Submit);
        assert_eq!(press(KeyCode::Left, KeyModifiers::NONE), KeyAction::Ignore);
    }

    #[test]
    fn key_release_is_ignored() {
        let mut key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        key.kind = KeyEventKind::Release;
        assert_eq!(key_action(&key), KeyAction::Ignore);
    }
}
