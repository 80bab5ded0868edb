use std::{env, sync::Arc, thread};

use colored::Colorize;
use log::{error, info};
use moodify_client::{FrameSource, HttpAnalyzer, NoCamera, Session, StillImageSource};
use moodify_impls::{ClockedOutput, SourceLocator};
use settings::{Settings, SettingsError};
use thiserror::Error;
use tokio::{
    runtime::{self, Runtime},
    sync::mpsc::unbounded_channel,
};

mod console;
mod logging;
mod settings;

#[derive(Debug, Error)]
enum MoodifyError {
    #[error("Invalid configuration: {0}")]
    Settings(#[from] SettingsError),

    #[error("Could not start the async runtime: {0}")]
    Runtime(std::io::Error),
}

impl MoodifyError {
    fn hint(&self) -> String {
        match self {
            MoodifyError::Settings(SettingsError::Endpoint(_)) => "Set MOODIFY_ENDPOINT to the full URL of the analyzer, for example http://127.0.0.1:5000/analyze.".to_string(),
            MoodifyError::Settings(SettingsError::Mode(_)) => "Set MOODIFY_MODE to either \"match\" or \"lift\", or leave it unset.".to_string(),
            MoodifyError::Runtime(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

struct Moodify {
    settings: Settings,
    runtime: Runtime,
}

impl Moodify {
    fn new() -> Result<Self, MoodifyError> {
        let settings = Settings::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("moodify-async")
            .build()
            .map_err(MoodifyError::Runtime)?;

        Ok(Self { settings, runtime })
    }

    fn run(self) {
        let Self { settings, runtime } = self;

        let (event_sender, event_receiver) = crossbeam::channel::unbounded();
        thread::spawn(move || logging::log_events(event_receiver));

        info!("Using analyzer at {}", settings.endpoint);

        runtime.block_on(async move {
            match settings.frame_path.clone() {
                Some(path) => {
                    info!("Reading frames from {}", path.display());
                    run_session(settings, StillImageSource::new(path), event_sender).await
                }
                None => {
                    info!("No frame source configured, mood can only be set by hand");
                    run_session(settings, NoCamera, event_sender).await
                }
            }
        });
    }
}

async fn run_session<F>(settings: Settings, frames: F, events: moodify_core::EventSender)
where
    F: FrameSource,
{
    let (output_sender, output_events) = unbounded_channel();

    let locator = Arc::new(SourceLocator::new(Some(settings.endpoint.clone())));
    let outputs = ClockedOutput::pair(locator, output_sender);
    let analyzer = Arc::new(HttpAnalyzer::new(settings.endpoint, &settings.config));

    let (session, handle) = Session::new(
        &settings.config,
        analyzer,
        Arc::new(frames),
        outputs,
        output_events,
        events,
    );

    thread::spawn(move || console::run(handle));

    session.with_mode(settings.mode).run().await;
}

fn main() {
    let verbose = env::var("MOODIFY_DEBUG").is_ok();

    if let Err(e) = logging::init_logger(verbose) {
        eprintln!("Could not set up logging: {}", e);
    }

    match Moodify::new() {
        Ok(moodify) => {
            info!("Initialized successfully.");
            moodify.run();
        }
        Err(error) => {
            error!("{}", "moodify failed to start!".bold().red());
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
        }
    }
}
