//! Talks to the mood analyzer and drives a [moodify_core::PlaybackEngine] from what it detects.

mod analyzer;
mod capture;
mod session;

pub use analyzer::*;
pub use capture::*;
pub use session::*;
