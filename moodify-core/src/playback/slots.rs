use std::fmt::Display;

use serde::Serialize;

/// Identifies one of the two output slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SlotIndex {
    A,
    B,
}

impl SlotIndex {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    fn position(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Two outputs, one of which is active (audible) while the other is idle (loading the next track).
#[derive(Debug)]
pub struct Slots<O> {
    outputs: [O; 2],
    active: SlotIndex,
}

impl<O> Slots<O> {
    /// Creates the slots, with the first output active.
    pub fn new(outputs: [O; 2]) -> Self {
        Self {
            outputs,
            active: SlotIndex::A,
        }
    }

    pub fn active_index(&self) -> SlotIndex {
        self.active
    }

    pub fn idle_index(&self) -> SlotIndex {
        self.active.other()
    }

    pub fn active(&self) -> &O {
        &self.outputs[self.active.position()]
    }

    pub fn idle(&self) -> &O {
        &self.outputs[self.idle_index().position()]
    }

    pub fn active_mut(&mut self) -> &mut O {
        &mut self.outputs[self.active.position()]
    }

    pub fn idle_mut(&mut self) -> &mut O {
        let index = self.idle_index().position();
        &mut self.outputs[index]
    }

    pub fn get(&self, slot: SlotIndex) -> &O {
        &self.outputs[slot.position()]
    }

    pub fn get_mut(&mut self, slot: SlotIndex) -> &mut O {
        &mut self.outputs[slot.position()]
    }

    /// Makes the idle output active and the active one idle.
    pub fn swap(&mut self) {
        self.active = self.active.other();
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotIndex, &mut O)> {
        let [a, b] = &mut self.outputs;
        [(SlotIndex::A, a), (SlotIndex::B, b)].into_iter()
    }
}
