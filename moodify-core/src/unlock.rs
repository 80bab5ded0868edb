use log::{info, warn};
use serde::Serialize;

use crate::{AudioOutput, OutputError, Slots};

/// The kinds of user interaction that count as a gesture for autoplay purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GestureKind {
    PointerDown,
    TouchStart,
    Click,
    KeyDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// This gesture unlocked audio. No further gestures need to be handled.
    Unlocked,
    /// No output could be primed; the next gesture will try again.
    Blocked,
    /// Audio was already unlocked, so the gesture was ignored.
    AlreadyUnlocked,
}

/// Primes the outputs on the first user gesture, so that later programmatic playback is allowed.
#[derive(Debug)]
pub struct GestureUnlock {
    fallback_source: String,
    unlocked: bool,
    prompted: bool,
}

impl GestureUnlock {
    pub fn new(fallback_source: impl Into<String>) -> Self {
        Self {
            fallback_source: fallback_source.into(),
            unlocked: false,
            prompted: false,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Returns true if the user was asked for a gesture that has not happened yet.
    pub fn is_prompted(&self) -> bool {
        self.prompted && !self.unlocked
    }

    /// Marks that the user was asked for a gesture.
    /// Returns false if audio is already unlocked and there is no need to ask.
    pub fn prompt(&mut self) -> bool {
        if self.unlocked {
            return false;
        }

        self.prompted = true;
        true
    }

    /// Handles a gesture by playing and immediately pausing both outputs.
    ///
    /// Outputs without a source get the fallback source for the duration of the attempt.
    /// If `keep_sources` is false, those fallback sources are removed afterwards.
    pub fn unlock<O>(&mut self, slots: &mut Slots<O>, keep_sources: bool) -> UnlockOutcome
    where
        O: AudioOutput,
    {
        if self.unlocked {
            return UnlockOutcome::AlreadyUnlocked;
        }

        let mut primed = 0;

        for (slot, output) in slots.iter_mut() {
            // An output that is already playing is evidently allowed to.
            if !output.is_paused() {
                primed += 1;
                continue;
            }

            let borrowed_fallback = output.source().is_none();

            if borrowed_fallback {
                output.load(&self.fallback_source);
            }

            match prime(output) {
                Ok(()) => primed += 1,
                Err(e) => warn!("Could not unlock output {}: {}", slot, e),
            }

            if borrowed_fallback && !keep_sources {
                output.unload();
            }
        }

        if primed == 0 {
            return UnlockOutcome::Blocked;
        }

        info!("Audio unlocked by user gesture");

        self.unlocked = true;
        self.prompted = false;

        UnlockOutcome::Unlocked
    }
}

fn prime<O>(output: &mut O) -> Result<(), OutputError>
where
    O: AudioOutput,
{
    output.play()?;
    output.pause();
    output.rewind();

    Ok(())
}
