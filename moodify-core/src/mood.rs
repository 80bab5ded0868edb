//! Smoothing of the noisy per-frame mood labels into a stable mood.

use std::{collections::VecDeque, time::Duration};

use tokio::time::Instant;

use crate::Config;

/// Keeps a sliding window of recent mood labels and decides when the majority is stable enough to commit.
#[derive(Debug)]
pub struct MoodSmoother {
    window: VecDeque<String>,
    capacity: usize,
    quorum: usize,
    min_recommit_interval: Duration,
    committed: Option<CommittedMood>,
}

/// The last mood that was accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedMood {
    pub mood: String,
    pub at: Instant,
}

/// The most frequent label in the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodTally {
    pub label: String,
    /// How many times the label appears in the window
    pub count: usize,
    /// How many labels the window holds
    pub observed: usize,
}

impl MoodSmoother {
    pub fn new(config: &Config) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window_size),
            capacity: config.window_size.max(1),
            quorum: config.quorum,
            min_recommit_interval: config.min_recommit_interval,
            committed: None,
        }
    }

    /// Records a label and returns the mood to commit, if the window agrees on a new one.
    pub fn observe(&mut self, label: &str, now: Instant) -> Option<String> {
        let label = normalize(label)?;

        self.window.push_back(label);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }

        let tally = self.tally()?;

        if tally.count < self.quorum {
            return None;
        }

        let is_new = self
            .committed
            .as_ref()
            .map(|c| c.mood != tally.label)
            .unwrap_or(true);

        if !is_new || !self.is_recommit_allowed(now) {
            return None;
        }

        Some(self.force(&tally.label, now))
    }

    /// Commits a mood regardless of quorum and recency.
    pub fn force(&mut self, mood: &str, now: Instant) -> String {
        let mood = normalize(mood).unwrap_or_else(|| Config::DEFAULT_MOOD.to_string());

        self.committed = Some(CommittedMood {
            mood: mood.clone(),
            at: now,
        });

        mood
    }

    /// Returns the most frequent label in the window.
    /// Ties go to the label that was seen first.
    pub fn tally(&self) -> Option<MoodTally> {
        let mut counts: Vec<(&str, usize)> = Vec::new();

        for label in &self.window {
            match counts.iter_mut().find(|(l, _)| *l == label.as_str()) {
                Some((_, count)) => *count += 1,
                None => counts.push((label, 1)),
            }
        }

        let mut top: Option<(&str, usize)> = None;

        for (label, count) in counts {
            if top.map(|(_, c)| count > c).unwrap_or(true) {
                top = Some((label, count));
            }
        }

        top.map(|(label, count)| MoodTally {
            label: label.to_string(),
            count,
            observed: self.window.len(),
        })
    }

    /// Returns the best guess of the current mood: the window's top label, or the last committed mood.
    pub fn latest(&self) -> Option<String> {
        self.tally()
            .map(|t| t.label)
            .or_else(|| self.committed.as_ref().map(|c| c.mood.clone()))
    }

    pub fn committed(&self) -> Option<&CommittedMood> {
        self.committed.as_ref()
    }

    pub fn window(&self) -> impl Iterator<Item = &str> {
        self.window.iter().map(String::as_str)
    }

    fn is_recommit_allowed(&self, now: Instant) -> bool {
        match &self.committed {
            Some(committed) => now.duration_since(committed.at) >= self.min_recommit_interval,
            None => true,
        }
    }
}

fn normalize(label: &str) -> Option<String> {
    let label = label.trim().to_lowercase();
    (!label.is_empty()).then_some(label)
}
