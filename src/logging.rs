use std::fmt::Display;

use colored::Colorize;
use log::{info, warn, Level, LevelFilter};
use moodify_core::{EventReceiver, SessionEvent};

/// Dependencies only get to log warnings and errors
const EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];

/// Sets up the logger. `verbose` includes debug messages from moodify itself.
pub fn init_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let local_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            let target = Target::from_target(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                badge(record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(move |meta| {
            let target = Target::from_target(meta.target());

            if target.is_local() {
                meta.level() <= local_level
            } else {
                EXTERNAL_LEVELS.contains(&meta.level())
            }
        })
        .chain(std::io::stdout())
        .apply()
}

enum Target {
    External(String),
    App,
    Core,
    Client,
    Impls,
}

impl Target {
    fn from_target(target: &str) -> Self {
        let module = target.split("::").next().unwrap_or_default();

        match module {
            "moodify" => Self::App,
            "moodify_core" => Self::Core,
            "moodify_client" => Self::Client,
            "moodify_impls" => Self::Impls,
            other => Self::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Target::External(x) => x.as_str().clear(),
            Target::App => "APP".bright_green(),
            Target::Core => "CORE".blue(),
            Target::Client => "CLIENT".bright_purple(),
            Target::Impls => "IMPLS".cyan(),
        };

        Display::fmt(&tag, f)
    }
}

fn badge(level: Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}

/// Logs session events until the session goes away.
pub fn log_events(events: EventReceiver) {
    for event in events {
        log_event(&event);
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::MoodObserved {
            detected,
            top,
            count,
            observed,
        } => info!(
            "Detected {} (top: {} {}/{})",
            detected.bold(),
            top,
            count,
            observed
        ),
        SessionEvent::MoodCommitted { mood, forced } => {
            let how = if *forced { "chosen" } else { "detected" };
            info!("Mood {} {}", how, mood.bold().bright_yellow())
        }
        SessionEvent::QueueUpdated { items } => {
            let titles: Vec<_> = items.iter().map(|t| t.title.as_str()).collect();
            info!("Queue: {}", describe_queue(&titles))
        }
        SessionEvent::TrackStarted { track, next } => {
            let next = next
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "nothing".to_string());

            info!("Now playing {} (next: {})", track.to_string().bold(), next)
        }
        SessionEvent::PlaybackStopped => info!("Nothing left to play"),
        SessionEvent::StateUpdate { new_state } => info!("Playback is now {:?}", new_state),
        SessionEvent::Status { message } => warn!("{}", message),
        SessionEvent::GestureRequired { message } => {
            warn!("{} (press enter)", message.bold())
        }
        SessionEvent::AudioUnlocked { gesture } => info!("Audio unlocked by {:?}", gesture),
        SessionEvent::OutputFailed { slot, error } => warn!("Output {} failed: {}", slot, error),
    }
}

fn describe_queue(titles: &[&str]) -> String {
    if titles.is_empty() {
        return "empty".to_string();
    }

    titles.join(", ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_targets() {
        assert!(matches!(Target::from_target("moodify::console"), Target::App));
        assert!(matches!(Target::from_target("moodify_core::playback::engine"), Target::Core));
        assert!(!Target::from_target("reqwest::connect").is_local());
    }

    #[test]
    fn test_queue_description() {
        assert_eq!(describe_queue(&[]), "empty");
        assert_eq!(describe_queue(&["Sunny", "Bright"]), "Sunny, Bright");
    }
}
