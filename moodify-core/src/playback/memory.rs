use crate::{AudioOutput, OutputError};

/// An output that only keeps state in memory and never makes a sound.
///
/// Its readiness, position, and playback permission are set by hand,
/// which makes it useful wherever playback has to be driven deterministically.
#[derive(Debug, Clone)]
pub struct MemoryOutput {
    source: Option<String>,
    ready: bool,
    defer_ready: bool,
    paused: bool,
    position: f32,
    duration: Option<f32>,
    volume: f32,
    allowed: bool,
    loads: usize,
}

impl MemoryOutput {
    /// Creates an output that is ready as soon as a source is loaded, and is allowed to play.
    pub fn new() -> Self {
        Self {
            source: None,
            ready: false,
            defer_ready: false,
            paused: true,
            position: 0.,
            duration: None,
            volume: 1.,
            allowed: true,
            loads: 0,
        }
    }

    /// Loaded sources only become ready once [MemoryOutput::mark_ready] is called.
    pub fn deferred(mut self) -> Self {
        self.defer_ready = true;
        self
    }

    /// Playback is refused until [MemoryOutput::allow] is called.
    pub fn blocked(mut self) -> Self {
        self.allowed = false;
        self
    }

    pub fn allow(&mut self) {
        self.allowed = true;
    }

    pub fn mark_ready(&mut self) {
        self.ready = self.source.is_some();
    }

    pub fn set_duration(&mut self, duration: Option<f32>) {
        self.duration = duration;
    }

    pub fn set_position(&mut self, position: f32) {
        self.position = position;
    }

    /// Plays to the end of the source, as if it finished.
    pub fn finish(&mut self) {
        self.position = self.duration.unwrap_or(self.position);
        self.paused = true;
    }

    /// How many times a source was loaded
    pub fn loads(&self) -> usize {
        self.loads
    }
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for MemoryOutput {
    fn load(&mut self, source: &str) {
        self.source = Some(source.to_string());
        self.ready = !self.defer_ready;
        self.paused = true;
        self.position = 0.;
        self.loads += 1;
    }

    fn unload(&mut self) {
        self.source = None;
        self.ready = false;
        self.paused = true;
        self.position = 0.;
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn play(&mut self) -> Result<(), OutputError> {
        if self.source.is_none() {
            return Err(OutputError::NoSource);
        }

        if !self.allowed {
            return Err(OutputError::NotAllowed);
        }

        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn rewind(&mut self) {
        self.position = 0.;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn position(&self) -> f32 {
        self.position
    }

    fn duration(&self) -> Option<f32> {
        self.duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0., 1.);
    }
}
