use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use moodify_core::{
    AudioOutput, Config, EventSender, GestureKind, Introspect, MoodSmoother, OutputEvent,
    OutputEventKind, PlaybackEngine, SessionEvent, UnlockOutcome,
};
use thiserror::Error;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::{interval, sleep_until, Instant, MissedTickBehavior},
};

use crate::{AnalyzeRequest, AnalyzeResponse, Analyzer, AnalyzerError, CaptureError, FrameSource, Mode};

/// Things the user can ask a running session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Starts the session by committing the bootstrap mood. Only the first one counts.
    Start,
    /// Skips the current track.
    Skip,
    /// Commits a mood chosen by the user, bypassing detection.
    Manual(String),
    SetMode(Mode),
    /// Logs the state of the session.
    Status,
    Shutdown,
}

/// Why a mood was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitReason {
    /// Enough frames agreed on it.
    Detected,
    /// The user picked it.
    Manual,
    /// The queue is running dry before the current track ends.
    Prefetch,
    /// The session was started.
    Bootstrap,
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// The result of an analyzer call made in the background.
enum CallResult {
    Detection(Result<AnalyzeResponse, DetectionError>),
    Recommendation {
        mood: String,
        reason: CommitReason,
        result: Result<AnalyzeResponse, AnalyzerError>,
    },
}

/// Sends commands and gestures to a running [Session].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: UnboundedSender<SessionCommand>,
    gestures: UnboundedSender<GestureKind>,
}

impl SessionHandle {
    /// Returns false if the session is no longer running.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn start(&self) -> bool {
        self.send(SessionCommand::Start)
    }

    pub fn skip(&self) -> bool {
        self.send(SessionCommand::Skip)
    }

    pub fn manual(&self, mood: impl Into<String>) -> bool {
        self.send(SessionCommand::Manual(mood.into()))
    }

    pub fn set_mode(&self, mode: Mode) -> bool {
        self.send(SessionCommand::SetMode(mode))
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionCommand::Shutdown)
    }

    /// Reports a user gesture.
    /// Returns false once the session stopped listening for gestures, which happens after audio is unlocked.
    pub fn gesture(&self, kind: GestureKind) -> bool {
        self.gestures.send(kind).is_ok()
    }
}

/// Ties mood detection, track recommendations, and playback together.
///
/// A session runs as a single task. Analyzer calls are spawned separately and report back,
/// so capturing and waiting for the analyzer never holds up playback.
pub struct Session<A, F, O> {
    config: Config,
    analyzer: Arc<A>,
    frames: Arc<F>,
    mode: Mode,
    smoother: MoodSmoother,
    engine: PlaybackEngine<O>,
    events: EventSender,

    commands: UnboundedReceiver<SessionCommand>,
    gestures: Option<UnboundedReceiver<GestureKind>>,
    output_events: UnboundedReceiver<OutputEvent>,

    results_sender: UnboundedSender<CallResult>,
    results: UnboundedReceiver<CallResult>,

    detecting: bool,
    prefetching: bool,
    started: bool,
}

impl<A, F, O> Session<A, F, O>
where
    A: Analyzer,
    F: FrameSource,
    O: AudioOutput,
{
    /// Creates a new session.
    ///
    /// `output_events` must receive the events of both outputs, tagged with the slot they were given.
    pub fn new(
        config: &Config,
        analyzer: Arc<A>,
        frames: Arc<F>,
        outputs: [O; 2],
        output_events: UnboundedReceiver<OutputEvent>,
        events: EventSender,
    ) -> (Self, SessionHandle) {
        let (command_sender, commands) = unbounded_channel();
        let (gesture_sender, gestures) = unbounded_channel();
        let (results_sender, results) = unbounded_channel();

        let session = Self {
            config: config.clone(),
            analyzer,
            frames,
            mode: Mode::default(),
            smoother: MoodSmoother::new(config),
            engine: PlaybackEngine::new(config, outputs, events.clone()),
            events,
            commands,
            gestures: Some(gestures),
            output_events,
            results_sender,
            results,
            detecting: false,
            prefetching: false,
            started: false,
        };

        let handle = SessionHandle {
            commands: command_sender,
            gestures: gesture_sender,
        };

        (session, handle)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Runs the session until it is shut down, or every [SessionHandle] is dropped.
    pub async fn run(mut self) {
        let mut detection = interval(self.config.detection_interval);
        detection.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut monitor = interval(self.config.monitor_interval);
        monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Session running in {} mode", self.mode);

        loop {
            let deadline = self.engine.next_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + IDLE_WAKE);

            tokio::select! {
                _ = detection.tick() => self.detect(),
                _ = monitor.tick() => self.monitor(),
                _ = sleep_until(wake_at), if deadline.is_some() => self.engine.tick(Instant::now()),
                Some(event) = self.output_events.recv() => self.handle_output_event(event),
                Some(result) = self.results.recv() => self.handle_result(result),
                Some(gesture) = recv_gesture(&mut self.gestures) => self.handle_gesture(gesture),
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }

        info!("Session stopped");
    }

    /// Starts a detection cycle, unless one is already in flight.
    fn detect(&mut self) {
        if self.detecting {
            debug!("Previous detection has not finished, skipping cycle");
            return;
        }

        self.detecting = true;

        let analyzer = self.analyzer.clone();
        let frames = self.frames.clone();
        let mode = self.mode;
        let results = self.results_sender.clone();

        tokio::spawn(async move {
            let result = detect_mood(analyzer.as_ref(), frames.as_ref(), mode).await;
            let _ = results.send(CallResult::Detection(result));
        });
    }

    fn monitor(&mut self) {
        if self.engine.monitor(Instant::now()) {
            self.prefetch();
        }
    }

    /// Requests more tracks for the most likely mood, unless a request is already in flight.
    fn prefetch(&mut self) {
        if self.prefetching {
            return;
        }

        self.prefetching = true;

        let mood = self
            .smoother
            .latest()
            .unwrap_or_else(|| Config::DEFAULT_MOOD.to_string());

        info!("Queue is running low, pre-fetching tracks for {}", mood);
        self.force_commit(&mood, CommitReason::Prefetch);
    }

    fn force_commit(&mut self, mood: &str, reason: CommitReason) {
        let mood = self.smoother.force(mood, Instant::now());
        self.commit(mood, reason);
    }

    /// Announces a committed mood and asks the analyzer for tracks to go with it.
    fn commit(&mut self, mood: String, reason: CommitReason) {
        info!("Committed mood {} ({:?})", mood, reason);

        self.emit(SessionEvent::MoodCommitted {
            mood: mood.clone(),
            forced: reason != CommitReason::Detected,
        });

        let analyzer = self.analyzer.clone();
        let request = AnalyzeRequest::manual(&mood, self.mode);
        let results = self.results_sender.clone();

        tokio::spawn(async move {
            let result = analyzer.analyze(&request).await;

            let _ = results.send(CallResult::Recommendation {
                mood,
                reason,
                result,
            });
        });
    }

    fn handle_result(&mut self, result: CallResult) {
        let now = Instant::now();

        match result {
            CallResult::Detection(result) => {
                self.detecting = false;

                let response = match result {
                    Ok(response) => response,
                    Err(e) => {
                        error!("Detection failed: {}", e);
                        return;
                    }
                };

                if let Some(error) = &response.error {
                    warn!("Analyzer could not detect a mood: {}", error);
                    return;
                }

                let Some(detected) = response.emotion() else {
                    warn!("Analyzer responded without a mood");
                    return;
                };

                let committed = self.smoother.observe(detected, now);

                if let Some(tally) = self.smoother.tally() {
                    self.emit(SessionEvent::MoodObserved {
                        detected: detected.to_lowercase(),
                        top: tally.label,
                        count: tally.count,
                        observed: tally.observed,
                    });
                }

                if let Some(mood) = committed {
                    self.commit(mood, CommitReason::Detected);
                }
            }
            CallResult::Recommendation {
                mood,
                reason,
                result,
            } => {
                if reason == CommitReason::Prefetch {
                    self.prefetching = false;
                }

                let response = match result {
                    Ok(response) => response,
                    Err(e) => {
                        error!("Could not get tracks for {}: {}", mood, e);
                        return;
                    }
                };

                if let Some(error) = &response.error {
                    warn!("Analyzer could not recommend tracks for {}: {}", mood, error);
                    return;
                }

                let added = self.engine.enqueue(response.tracks, now);
                info!("Queued {} new tracks for {}", added, mood);
            }
        }
    }

    fn handle_output_event(&mut self, event: OutputEvent) {
        let is_active = event.slot == self.engine.active_slot();
        let kind = event.kind.clone();

        self.engine.handle_event(event, Instant::now());

        match kind {
            OutputEventKind::Ended if is_active => {
                if self.engine.queue().len() < self.config.prefetch_queue_depth {
                    debug!("Track ended with few tracks left, detecting mood");
                    self.detect();
                }
            }
            OutputEventKind::Seeked if is_active => {
                if self.engine.needs_prefetch() {
                    self.prefetch();
                }
            }
            _ => {}
        }
    }

    fn handle_gesture(&mut self, gesture: GestureKind) {
        match self.engine.unlock(gesture) {
            UnlockOutcome::Blocked => warn!("Gesture did not unlock audio, waiting for another"),
            UnlockOutcome::Unlocked | UnlockOutcome::AlreadyUnlocked => {
                // Gestures are no longer needed.
                self.gestures = None;
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start => {
                if self.started {
                    debug!("Session was already started");
                    return;
                }

                self.started = true;

                // Starting is itself a gesture.
                if self.gestures.is_some() {
                    self.handle_gesture(GestureKind::Click);
                }

                let mood = self.config.bootstrap_mood.clone();
                self.force_commit(&mood, CommitReason::Bootstrap);
            }
            SessionCommand::Skip => self.engine.skip(Instant::now()),
            SessionCommand::Manual(mood) => {
                if mood.trim().is_empty() {
                    warn!("Ignoring empty mood");
                    return;
                }

                self.force_commit(&mood, CommitReason::Manual);
            }
            SessionCommand::SetMode(mode) => {
                info!("Switched to {} mode", mode);
                self.mode = mode;
            }
            SessionCommand::Status => {
                let committed = self.smoother.committed().map(|c| c.mood.as_str());
                let window: Vec<_> = self.smoother.window().collect();

                info!("Mode: {}, committed mood: {:?}, window: {:?}", self.mode, committed, window);
                info!("{:?}", self.engine.introspect());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// How long to sleep when the engine has nothing scheduled. The branch is disabled in that case anyway.
const IDLE_WAKE: Duration = Duration::from_secs(3600);

async fn detect_mood<A, F>(analyzer: &A, frames: &F, mode: Mode) -> Result<AnalyzeResponse, DetectionError>
where
    A: Analyzer,
    F: FrameSource,
{
    let frame = frames.capture().await?;
    let request = AnalyzeRequest::detect(frame.to_data_url(), mode);

    Ok(analyzer.analyze(&request).await?)
}

async fn recv_gesture(gestures: &mut Option<UnboundedReceiver<GestureKind>>) -> Option<GestureKind> {
    match gestures {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
