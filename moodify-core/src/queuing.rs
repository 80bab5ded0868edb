use std::collections::VecDeque;

use crate::Track;

/// A first-in first-out queue of tracks waiting to be played.
///
/// No two tracks in the queue share an id, and none share the id of the currently playing track.
#[derive(Debug, Default, Clone)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the tracks that are not already queued or playing, returning how many were added.
    pub fn enqueue<I>(&mut self, tracks: I, current: Option<&Track>) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let mut added = 0;

        for track in tracks {
            if !track.has_id() {
                continue;
            }

            if current.map(|c| c.id == track.id).unwrap_or_default() {
                continue;
            }

            if self.contains(&track.id) {
                continue;
            }

            self.items.push_back(track);
            added += 1;
        }

        added
    }

    /// Removes and returns the next track.
    pub fn dequeue(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Returns the next track without removing it.
    pub fn peek(&self) -> Option<&Track> {
        self.items.front()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}
