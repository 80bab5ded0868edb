//! Outputs and media helpers for running moodify outside of tests.

mod clocked;
mod locator;
mod probe;

pub use clocked::*;
pub use locator::*;
pub use probe::*;
