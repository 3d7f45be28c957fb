use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::AssignmentStatus;

/// One immutable audit row per status transition. Entries outlive their
/// assignment: deleting an assignment leaves its trail intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub assignment_id: Uuid,
    /// Absent on the creation entry.
    pub old_status: Option<AssignmentStatus>,
    pub new_status: AssignmentStatus,
    pub changed_by: String,
    pub notes: Option<String>,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}
