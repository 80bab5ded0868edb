use std::io::{self, BufRead};

use log::{info, warn};
use moodify_client::{Mode, SessionCommand, SessionHandle};
use moodify_core::GestureKind;

const HELP: &str = "Commands: start, skip, mood <label>, mode <match|lift>, status, quit. Press enter to enable audio.";

/// What a line typed into the console means.
#[derive(Debug, PartialEq)]
enum Input {
    Command(SessionCommand),
    Gesture(GestureKind),
    Help,
}

fn parse(line: &str) -> Result<Input, String> {
    let line = line.trim();

    if line.is_empty() {
        return Ok(Input::Gesture(GestureKind::KeyDown));
    }

    let (word, argument) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "start" => SessionCommand::Start,
        "skip" | "next" => SessionCommand::Skip,
        "status" => SessionCommand::Status,
        "quit" | "exit" => SessionCommand::Shutdown,
        "help" => return Ok(Input::Help),
        "mood" if argument.is_empty() => return Err("Usage: mood <label>".to_string()),
        "mood" => SessionCommand::Manual(argument.to_string()),
        "mode" => {
            let mode = argument.parse::<Mode>().map_err(|e| e.to_string())?;
            SessionCommand::SetMode(mode)
        }
        other => return Err(format!("Unknown command \"{}\"", other)),
    };

    Ok(Input::Command(command))
}

/// Reads commands from stdin until it closes or the session stops.
pub fn run(handle: SessionHandle) {
    info!("{}", HELP);

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };

        let delivered = match parse(&line) {
            Ok(Input::Command(command)) => {
                let is_shutdown = command == SessionCommand::Shutdown;
                let delivered = handle.send(command);

                if is_shutdown {
                    return;
                }

                delivered
            }
            Ok(Input::Gesture(kind)) => {
                // Once audio is unlocked, enter has nothing left to do.
                handle.gesture(kind);
                true
            }
            Ok(Input::Help) => {
                info!("{}", HELP);
                true
            }
            Err(e) => {
                warn!("{}", e);
                true
            }
        };

        if !delivered {
            return;
        }
    }

    handle.shutdown();
}
