// Ordered record of commands captured during one recording session.

use super::command::Command;
use std::collections::VecDeque;
use std::time::Duration;

/// A command and the session-relative offset it was issued at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub offset: Duration,
    pub command: Command,
}

/// Entries kept in non-decreasing offset order; ties keep insertion order.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: VecDeque<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Inserts after every entry whose offset is not later than `offset`.
    pub fn push(&mut self, offset: Duration, command: Command) {
        let entry = TimelineEntry { offset, command };
        // Recording clocks only move forward, so this is almost always an append.
        if self.entries.back().is_none_or(|last| last.offset <= offset) {
            self.entries.push_back(entry);
            return;
        }
        let at = self.entries.partition_point(|e| e.offset <= offset);
        self.entries.insert(at, entry);
    }

    pub fn front(&self) -> Option<&TimelineEntry> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<TimelineEntry> {
        self.entries.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter()
    }
}
