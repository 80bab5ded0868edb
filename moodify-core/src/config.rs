use std::time::Duration;

/// The configuration of a moodify session
#[derive(Debug, Clone)]
pub struct Config {
    /// How many recent mood labels are kept for the majority vote
    pub window_size: usize,
    /// How many times a label must appear in the window to be committed
    pub quorum: usize,
    /// How long to wait before a different mood can be committed again
    pub min_recommit_interval: Duration,
    /// How often a frame is captured and analyzed
    pub detection_interval: Duration,
    /// How often the active output is checked for an upcoming end
    pub monitor_interval: Duration,
    /// How many seconds the crossfade between two tracks lasts
    pub crossfade_in_seconds: f32,
    /// How many volume steps are applied per second of crossfade
    pub crossfade_steps_per_second: f32,
    /// How many seconds can be left of a track before the next mood is pre-fetched
    pub prefetch_threshold_in_seconds: f32,
    /// Pre-fetching only happens when the queue holds fewer tracks than this
    pub prefetch_queue_depth: usize,
    /// How long to wait for a loaded track to become playable before playing it anyway
    pub ready_timeout: Duration,
    /// How long to wait before skipping a track that failed to play
    pub error_skip_delay: Duration,
    /// How many times a failed analyze call is retried
    pub analyze_retries: usize,
    /// How long to wait between analyze attempts
    pub analyze_backoff: Duration,
    /// The source loaded into empty outputs when unlocking audio
    pub fallback_source: String,
    /// The mood committed when a session is started
    pub bootstrap_mood: String,
}

impl Config {
    /// The mood used when nothing better is known
    pub const DEFAULT_MOOD: &'static str = "neutral";

    /// How many volume steps a crossfade consists of
    pub fn crossfade_steps(&self) -> u32 {
        ((self.crossfade_in_seconds * self.crossfade_steps_per_second).round() as u32).max(1)
    }

    /// How long to wait between each crossfade step
    pub fn crossfade_step_interval(&self) -> Duration {
        Duration::from_secs_f32(self.crossfade_in_seconds.max(0.) / self.crossfade_steps() as f32)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: 5,
            quorum: 3,
            min_recommit_interval: Duration::from_millis(6000),
            detection_interval: Duration::from_secs(3),
            monitor_interval: Duration::from_millis(600),
            crossfade_in_seconds: 2.0,
            // Roughly one step per display frame
            crossfade_steps_per_second: 60.,
            prefetch_threshold_in_seconds: 10.,
            prefetch_queue_depth: 2,
            ready_timeout: Duration::from_millis(2500),
            error_skip_delay: Duration::from_millis(700),
            analyze_retries: 1,
            analyze_backoff: Duration::from_millis(400),
            fallback_source: "/static/samples/neutral1.mp3".to_string(),
            bootstrap_mood: Self::DEFAULT_MOOD.to_string(),
        }
    }
}
