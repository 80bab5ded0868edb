//! The core of moodify: mood smoothing, the track queue, and crossfading playback.
//!
//! Nothing in this crate waits or performs I/O. Time is passed in by the caller,
//! which makes every component deterministic.

mod config;
mod events;
mod mood;
mod playback;
mod queuing;
mod track;
mod unlock;
mod util;

pub use config::*;
pub use events::*;
pub use mood::*;
pub use playback::*;
pub use queuing::*;
pub use track::*;
pub use unlock::*;
pub use util::*;
