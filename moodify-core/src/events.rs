use crossbeam::channel::{Receiver, Sender};

use crate::{GestureKind, PlaybackState, SlotIndex, Track};

pub type EventSender = Sender<SessionEvent>;
pub type EventReceiver = Receiver<SessionEvent>;

/// Describes the events that can be emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A frame was analyzed and its label added to the window.
    MoodObserved {
        /// The label of the analyzed frame.
        detected: String,
        /// The most frequent label in the window.
        top: String,
        /// How many times the top label appears in the window.
        count: usize,
        /// How many labels the window holds.
        observed: usize,
    },
    /// A mood was committed and tracks will be requested for it.
    MoodCommitted { mood: String, forced: bool },
    /// The queue changed.
    QueueUpdated { items: Vec<Track> },
    /// A track became the current track and started playing, or is ready to once audio is unlocked.
    TrackStarted { track: Track, next: Option<Track> },
    /// The queue ran out and nothing is playing.
    PlaybackStopped,
    /// The playback state changed.
    StateUpdate { new_state: PlaybackState },
    /// A transient message meant for the user.
    Status { message: String },
    /// Audio can not play until the user interacts.
    GestureRequired { message: String },
    /// A gesture unlocked audio playback.
    AudioUnlocked { gesture: GestureKind },
    /// An output reported an error.
    OutputFailed { slot: SlotIndex, error: String },
}
