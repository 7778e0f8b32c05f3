//! Per-deck cue points
//!
//! Stored in frames at the canonical rate, in the order they were set.

/// Cue points of one deck
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueList {
    points: Vec<u64>,
}

impl CueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cue; returns false if one already sits on `frame`
    pub fn add(&mut self, frame: u64) -> bool {
        if self.points.contains(&frame) {
            return false;
        }
        self.points.push(frame);
        true
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        self.points.get(index).copied()
    }

    pub fn remove(&mut self, index: usize) -> Option<u64> {
        (index < self.points.len()).then(|| self.points.remove(index))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn frames(&self) -> &[u64] {
        &self.points
    }
}
