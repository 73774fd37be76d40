//! Linear snapshot undo/redo.
//!
//! [`History`] keeps every committed state as an `Arc` snapshot plus a cursor
//! pointing at the current one:
//!
//! ```text
//! record(s3)          snapshots: [s0, s1, s2, s3]   cursor: 3
//! undo() x2           snapshots: [s0, s1, s2, s3]   cursor: 1
//! record(s4)          snapshots: [s0, s1, s4]       cursor: 2
//! ```
//!
//! Recording a state equal to the current snapshot is a no-op, so callers
//! may record after every operation without creating empty undo steps.

use std::sync::Arc;

/// Snapshot list with a cursor.
///
/// # Invariants
///
/// 1. `cursor < snapshots.len()` whenever `snapshots` is non-empty.
/// 2. Recording truncates everything after the cursor before appending.
/// 3. With a depth limit, `snapshots.len() <= max_depth`.
#[derive(Debug, Clone)]
pub struct History<T> {
    snapshots: Vec<Arc<T>>,
    cursor: usize,
    max_depth: Option<usize>,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            max_depth: None,
        }
    }
}

impl<T: PartialEq> History<T> {
    /// Creates an empty history. The first recorded state becomes the seed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history seeded with `initial`.
    pub fn seeded(initial: T) -> Self {
        let mut history = Self::new();
        history.record(initial);
        history
    }

    /// Limits the number of retained snapshots; the oldest are evicted first.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.set_max_depth(max_depth);
        self
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = Some(max_depth.max(1));
        self.enforce_depth();
    }

    /// Records a new state.
    ///
    /// Returns false, leaving history untouched, if `state` equals the
    /// current snapshot.
    pub fn record(&mut self, state: T) -> bool {
        if self.current().is_some_and(|current| **current == state) {
            return false;
        }
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(Arc::new(state));
        self.cursor = self.snapshots.len() - 1;
        self.enforce_depth();
        true
    }

    /// Steps back one snapshot and returns it. `None` at the oldest snapshot.
    pub fn undo(&mut self) -> Option<Arc<T>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.current().cloned()
    }

    /// Steps forward one snapshot and returns it. `None` at the newest snapshot.
    pub fn redo(&mut self) -> Option<Arc<T>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.current().cloned()
    }

    /// The snapshot under the cursor.
    pub fn current(&self) -> Option<&Arc<T>> {
        self.snapshots.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Drops every snapshot and reseeds with `state`.
    pub fn reset(&mut self, state: T) {
        self.snapshots.clear();
        self.cursor = 0;
        self.record(state);
    }

    fn enforce_depth(&mut self) {
        let Some(max) = self.max_depth else {
            return;
        };
        if self.snapshots.len() > max {
            let excess = self.snapshots.len() - max;
            self.snapshots.drain(..excess);
            self.cursor = self.cursor.saturating_sub(excess);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
