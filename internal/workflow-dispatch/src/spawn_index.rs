//! Per-parent child spawn index bookkeeping.

use std::ops::Range;

use dashmap::DashMap;

/// Maps a parent workflow run id to the next child spawn index.
///
/// Entries are created on the first spawn for a parent and are never removed.
/// Each allocation holds the shard lock for its key while reading and
/// incrementing, so racing callers for the same parent always receive
/// distinct, gap-free indices starting at 0. Root workflows (no parent) do
/// not share a counter and always get index 0.
#[derive(Debug, Default)]
pub struct SpawnIndexTable {
    indices: DashMap<String, u32>,
}

impl SpawnIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next index for `parent_run_id` and advances the counter.
    pub fn allocate(&self, parent_run_id: Option<&str>) -> u32 {
        self.reserve(parent_run_id, 1).start
    }

    /// Reserves `count` contiguous indices for `parent_run_id` in one step.
    ///
    /// Used by bulk triggers so that no other trigger from the same parent can
    /// interleave with the batch. For a root workflow the range is `0..count`
    /// and nothing is recorded.
    pub fn reserve(&self, parent_run_id: Option<&str>, count: u32) -> Range<u32> {
        let Some(parent_run_id) = parent_run_id.filter(|id| !id.is_empty()) else {
            return 0..count;
        };
        let mut next = self.indices.entry(parent_run_id.to_string()).or_insert(0);
        let start = *next;
        *next += count;
        start..*next
    }

    /// Returns the next index that would be handed out, without allocating.
    pub fn peek(&self, parent_run_id: &str) -> Option<u32> {
        self.indices.get(parent_run_id).map(|next| *next)
    }

    /// Number of parent runs with recorded spawns.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
