use thiserror::Error;

use super::SlotIndex;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// Playback was refused until the user interacts.
    #[error("Playback is not allowed without a user gesture")]
    NotAllowed,

    #[error("The source is not supported")]
    NotSupported,

    #[error("Nothing is loaded")]
    NoSource,

    #[error("{0}")]
    Other(String),
}

impl OutputError {
    /// Returns true if the error can be resolved by a user gesture.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::NotAllowed | Self::NotSupported)
    }
}

/// Represents a single audio output that plays one source at a time.
///
/// Outputs report what happens to them asynchronously with [OutputEvent]s tagged with their [SlotIndex].
pub trait AudioOutput
where
    Self: Send + 'static,
{
    /// Starts loading a source, replacing the current one.
    fn load(&mut self, source: &str);

    /// Removes the current source.
    fn unload(&mut self);

    /// Returns the currently loaded source, if any.
    fn source(&self) -> Option<&str>;

    /// Returns true if the loaded source can start playing.
    fn is_ready(&self) -> bool;

    /// Starts or resumes playback.
    fn play(&mut self) -> Result<(), OutputError>;

    fn pause(&mut self);

    /// Moves the playback position back to the start.
    fn rewind(&mut self);

    /// Returns true if the output is not playing. This includes outputs whose source ended.
    fn is_paused(&self) -> bool;

    /// Returns the playback position in seconds.
    fn position(&self) -> f32;

    /// Returns the length of the loaded source in seconds, if known.
    fn duration(&self) -> Option<f32>;

    fn volume(&self) -> f32;

    /// Sets the volume, from 0 to 1.
    fn set_volume(&mut self, volume: f32);
}

/// Something that happened to an output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEvent {
    pub slot: SlotIndex,
    pub kind: OutputEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputEventKind {
    /// The loaded source can start playing.
    CanPlay,
    /// The source played to the end.
    Ended,
    /// The playback position was moved.
    Seeked,
    /// The source could not be loaded or played.
    Error(String),
}

impl OutputEvent {
    pub fn new(slot: SlotIndex, kind: OutputEventKind) -> Self {
        Self { slot, kind }
    }
}
