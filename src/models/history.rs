// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Undo/redo history for the detail list.
//!
//! Snapshots are captured after edits settle (debounced) and are
//! content-deduplicated. Restoring a snapshot writes through the list like
//! any other edit; a guard keeps that write from being recorded again.

use super::detail::TextDetail;
use super::detail_list::DetailList;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Whether the next observed change is the history's own write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreGuard {
    Idle,
    /// Waiting to observe the write that produced `revision`.
    Restoring { revision: u64 },
}

/// History system for undo/redo functionality.
#[derive(Debug)]
pub struct DetailHistory {
    snapshots: Vec<Arc<Vec<TextDetail>>>,
    cursor: usize,
    max_size: usize,
    debounce: Duration,
    pending: Option<(Arc<Vec<TextDetail>>, Instant)>,
    guard: RestoreGuard,
}

impl DetailHistory {
    pub fn new(max_size: usize, debounce: Duration) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            max_size: max_size.max(1),
            debounce,
            pending: None,
            guard: RestoreGuard::Idle,
        }
    }

    /// Drop all history and start over from `initial`.
    pub fn reset(&mut self, initial: Arc<Vec<TextDetail>>) {
        self.snapshots.clear();
        self.snapshots.push(initial);
        self.cursor = 0;
        self.pending = None;
        self.guard = RestoreGuard::Idle;
    }

    /// Report that `list` changed at `now`.
    pub fn observe(&mut self, list: &DetailList, now: Instant) {
        if let RestoreGuard::Restoring { revision } = self.guard {
            if list.revision() == revision {
                self.guard = RestoreGuard::Idle;
                return;
            }
            // Someone else wrote after the restore; record normally.
            self.guard = RestoreGuard::Idle;
        }
        self.pending = Some((list.snapshot(), now));
    }

    /// Capture the pending snapshot once it has settled.
    pub fn poll(&mut self, now: Instant) {
        let settled = matches!(
            &self.pending,
            Some((_, at)) if now.saturating_duration_since(*at) >= self.debounce
        );
        if settled {
            self.flush();
        }
    }

    /// Capture the pending snapshot immediately.
    pub fn flush(&mut self) {
        if let Some((snapshot, _)) = self.pending.take() {
            self.save_snapshot(snapshot);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_none()
    }

    fn save_snapshot(&mut self, snapshot: Arc<Vec<TextDetail>>) {
        if self.snapshots.is_empty() {
            self.snapshots.push(snapshot);
            self.cursor = 0;
            return;
        }

        if let Some(last) = self.snapshots.get(self.cursor) {
            if Arc::ptr_eq(last, &snapshot) || **last == *snapshot {
                return;
            }
        }

        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);

        if self.snapshots.len() > self.max_size {
            self.snapshots.remove(0);
        } else {
            self.cursor += 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0 || self.has_unsaved_change()
    }

    pub fn can_redo(&self) -> bool {
        self.pending.is_none() && self.cursor + 1 < self.snapshots.len()
    }

    fn has_unsaved_change(&self) -> bool {
        match (&self.pending, self.snapshots.get(self.cursor)) {
            (Some((pending, _)), Some(current)) => **pending != **current,
            _ => false,
        }
    }

    /// Restore the previous snapshot into `list`. Returns false at the oldest.
    pub fn undo(&mut self, list: &mut DetailList) -> bool {
        self.flush();
        if self.cursor == 0 || self.snapshots.is_empty() {
            return false;
        }
        self.cursor -= 1;
        self.restore(list);
        true
    }

    /// Restore the next snapshot into `list`. Returns false at the newest.
    pub fn redo(&mut self, list: &mut DetailList) -> bool {
        self.flush();
        if self.cursor + 1 >= self.snapshots.len() {
            return false;
        }
        self.cursor += 1;
        self.restore(list);
        true
    }

    fn restore(&mut self, list: &mut DetailList) {
        let snapshot = self.snapshots[self.cursor].as_ref().clone();
        list.replace(snapshot);
        self.guard = RestoreGuard::Restoring {
            revision: list.revision(),
        };
        log::debug!(
            "History restored snapshot {}/{}",
            self.cursor + 1,
            self.snapshots.len()
        );
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}
