//! Playback is responsible for moving tracks from the queue onto the two outputs.

mod crossfade;
mod engine;
mod memory;
mod output;
mod slots;

pub use crossfade::*;
pub use engine::*;
pub use memory::*;
pub use output::*;
pub use slots::*;
