//! Runtime control surface. Stands in for the original start/stop buttons
//! and the pair of mutually exclusive mode checkboxes: commands are read
//! from stdin on a background thread and drained by the pipeline between
//! frames.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Hands,
    Holistic,
    Off,
    Quit,
}

pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "stop" => Some(Command::Stop),
        "hands" => Some(Command::Hands),
        "holistic" => Some(Command::Holistic),
        "off" => Some(Command::Off),
        "quit" | "q" => Some(Command::Quit),
        "" => None,
        other => {
            tracing::warn!("Unknown command: {other:?}");
            None
        }
    }
}

/// Reads commands from stdin until it closes or the pipeline goes away.
pub fn spawn_stdin_controller() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = parse_command(&line) {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
    });
    rx
}
