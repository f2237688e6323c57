use image::RgbaImage;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::canvas::CanvasState;

/// Snapshots kept before the oldest is dropped.
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

// ============================================================================
// SNAPSHOT: one immutable full-canvas state
// ============================================================================

/// Full copy of the raster buffer after one user action.
///
/// Pixels sit behind an `Arc`, so handing a snapshot to the autosave path or
/// cloning the history never copies image data.
#[derive(Clone)]
pub struct Snapshot {
    description: String,
    pixels: Arc<RgbaImage>,
}

impl Snapshot {
    pub fn capture(description: impl Into<String>, canvas: &CanvasState) -> Self {
        Self {
            description: description.into(),
            pixels: Arc::new(canvas.pixels().clone()),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn restore_into(&self, canvas: &mut CanvasState) {
        canvas.restore(&self.pixels);
    }

    fn memory_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

// ============================================================================
// HISTORY MANAGER: linear undo/redo over snapshots
// ============================================================================

/// Linear snapshot history with branch truncation.
///
/// `index` points at the entry equal to the live canvas after the most recent
/// commit, undo or redo. Entries past `index` are the redo branch; a commit
/// discards them.
pub struct HistoryManager {
    entries: VecDeque<Snapshot>,
    index: usize,
    capacity: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: 0,
            capacity: capacity.max(1),
        }
    }

    /// Drop everything and make `canvas` the sole, un-undoable entry.
    pub fn seed(&mut self, description: impl Into<String>, canvas: &CanvasState) {
        self.entries.clear();
        self.entries.push_back(Snapshot::capture(description, canvas));
        self.index = 0;
    }

    /// Record `canvas` as the result of one user action.
    pub fn commit(&mut self, description: impl Into<String>, canvas: &CanvasState) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(Snapshot::capture(description, canvas));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
    }

    /// Commit only when `canvas` differs from the current entry. Returns
    /// whether an entry was added.
    pub fn commit_if_changed(&mut self, description: impl Into<String>, canvas: &CanvasState) -> bool {
        if self.matches_current(canvas) {
            return false;
        }
        self.commit(description, canvas);
        true
    }

    /// Step back one entry and restore it. Returns the description of the
    /// action that was undone, or `None` at the oldest entry.
    pub fn undo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        if self.index == 0 || self.entries.is_empty() {
            return None;
        }
        let undone = self.entries[self.index].description.clone();
        self.index -= 1;
        self.entries[self.index].restore_into(canvas);
        Some(undone)
    }

    /// Step forward one entry and restore it. Returns the description of the
    /// redone action, or `None` at the newest entry.
    pub fn redo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        let entry = &self.entries[self.index];
        entry.restore_into(canvas);
        Some(entry.description.clone())
    }

    /// Put the current entry back into `canvas`, discarding uncommitted edits.
    pub fn revert(&self, canvas: &mut CanvasState) -> bool {
        match self.current() {
            Some(snap) => {
                snap.restore_into(canvas);
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.index)
    }

    /// Whether `canvas` is byte-identical to the current entry.
    pub fn matches_current(&self, canvas: &CanvasState) -> bool {
        self.current()
            .is_some_and(|snap| snap.pixels() == canvas.pixels())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.can_undo()
            .then(|| self.entries[self.index].description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.index + 1).map(|s| s.description())
    }

    /// Descriptions from the current entry back to the oldest.
    pub fn undo_history(&self) -> Vec<String> {
        self.entries
            .iter()
            .take(self.index + 1)
            .rev()
            .map(|s| s.description.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes of pixel data held across all entries.
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(Snapshot::memory_size).sum()
    }
}
