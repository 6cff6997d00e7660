//! Interactive commands typed on stdin.

use crate::host::HostEvent;
use std::io::{self, BufRead};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

pub const RATE_STEP: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    TogglePlayPause,
    Stop,
    Restart,
    AdjustRate(f32),
    SelectVoice(String),
    ListVoices,
    Quit,
}

pub const HELP: &str = "commands: p pause/resume, s stop, r restart, +/- rate, v <name> voice, l list voices, q quit";

/// Parse one input line. Blank lines and unknown input yield `None`.
pub fn parse_command(line: &str) -> Option<UserCommand> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head {
        "p" | "pause" | "play" => Some(UserCommand::TogglePlayPause),
        "s" | "stop" => Some(UserCommand::Stop),
        "r" | "restart" => Some(UserCommand::Restart),
        "+" => Some(UserCommand::AdjustRate(RATE_STEP)),
        "-" => Some(UserCommand::AdjustRate(-RATE_STEP)),
        "v" | "voice" if !rest.is_empty() => Some(UserCommand::SelectVoice(rest.to_string())),
        "l" | "voices" => Some(UserCommand::ListVoices),
        "q" | "quit" => Some(UserCommand::Quit),
        _ => None,
    }
}

/// Forward stdin lines to the host loop until EOF.
pub fn spawn_stdin_reader(tx: Sender<HostEvent>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!("Failed to read stdin: {err}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some(command) => {
                        debug!(?command, "Received user command");
                        if tx.send(HostEvent::Command(command)).is_err() {
                            return;
                        }
                    }
                    None => eprintln!("unknown command {:?}; {HELP}", line.trim()),
                }
            }
            let _ = tx.send(HostEvent::InputClosed);
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_letter_commands() {
        assert_eq!(parse_command("p"), Some(UserCommand::TogglePlayPause));
        assert_eq!(parse_command(" s "), Some(UserCommand::Stop));
        assert_eq!(parse_command("r"), Some(UserCommand::Restart));
        assert_eq!(parse_command("q"), Some(UserCommand::Quit));
        assert_eq!(parse_command("+"), Some(UserCommand::AdjustRate(RATE_STEP)));
        assert_eq!(parse_command("-"), Some(UserCommand::AdjustRate(-RATE_STEP)));
    }

    #[test]
    fn voice_selection_keeps_the_full_name() {
        assert_eq!(
            parse_command("v  Console Natural "),
            Some(UserCommand::SelectVoice("Console Natural".into()))
        );
        assert_eq!(parse_command("v"), None);
    }

    #[test]
    fn unknown_input_is_ignored() {
        assert_eq!(parse_command("jump"), None);
        assert_eq!(parse_command(""), None);
    }
}
