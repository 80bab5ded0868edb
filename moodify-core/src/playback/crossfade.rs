use std::time::Duration;

use crate::Config;

/// A linear crossfade, advanced one step at a time.
///
/// At every step the outgoing and incoming volumes add up to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossfade {
    steps: u32,
    step: u32,
    interval: Duration,
}

/// The volumes to apply at a step of a [Crossfade].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeStep {
    pub outgoing: f32,
    pub incoming: f32,
}

impl Crossfade {
    pub fn new(config: &Config) -> Self {
        Self {
            steps: config.crossfade_steps(),
            step: 0,
            interval: config.crossfade_step_interval(),
        }
    }

    /// How long to wait between steps
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }

    /// How far along the crossfade is, from 0 to 1.
    pub fn progress(&self) -> f32 {
        self.step as f32 / self.steps as f32
    }
}

impl Iterator for Crossfade {
    type Item = CrossfadeStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_finished() {
            return None;
        }

        self.step += 1;
        let t = self.progress();

        Some(CrossfadeStep {
            outgoing: (1. - t).max(0.),
            incoming: t.min(1.),
        })
    }
}
