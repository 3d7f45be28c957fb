use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::assignment::AssignmentStatus;
use crate::models::history::StatusHistoryEntry;

/// Append-once log of assignment status transitions.
///
/// The log exposes no mutation or removal API; entries written here stay
/// for the lifetime of the process, including entries for assignments that
/// were deleted afterwards.
pub struct HistoryLog {
    entries: DashMap<Uuid, StatusHistoryEntry>,
    seq: AtomicU64,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn record(
        &self,
        assignment_id: Uuid,
        old_status: Option<AssignmentStatus>,
        new_status: AssignmentStatus,
        changed_by: &str,
        notes: Option<String>,
    ) -> StatusHistoryEntry {
        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            assignment_id,
            old_status,
            new_status,
            changed_by: changed_by.to_string(),
            notes,
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            created_at: Utc::now(),
        };

        self.entries.insert(entry.id, entry.clone());
        entry
    }

    /// All entries for one assignment in the order they were written.
    pub fn for_assignment(&self, assignment_id: Uuid) -> Vec<StatusHistoryEntry> {
        let mut entries: Vec<StatusHistoryEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.value().assignment_id == assignment_id)
            .map(|entry| entry.value().clone())
            .collect();

        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}
