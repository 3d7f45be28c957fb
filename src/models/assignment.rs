use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Failed,
    Returned,
}

impl AssignmentStatus {
    /// Terminal statuses release the order for re-assignment. `Delivered`
    /// is final too, but a delivered order is never reassigned, so it keeps
    /// the order slot claimed.
    pub fn releases_order(&self) -> bool {
        matches!(self, AssignmentStatus::Failed | AssignmentStatus::Returned)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::Delivered | AssignmentStatus::Failed | AssignmentStatus::Returned
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::PickedUp => "picked_up",
            AssignmentStatus::InTransit => "in_transit",
            AssignmentStatus::Delivered => "delivered",
            AssignmentStatus::Failed => "failed",
            AssignmentStatus::Returned => "returned",
        }
    }
}

/// Broadcast to websocket subscribers on every transition, including the
/// initial `assigned` state.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentEvent {
    pub assignment: DeliveryAssignment,
    pub old_status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub rider_id: Uuid,
    pub status: AssignmentStatus,
    pub priority: Priority,
    pub delivery_notes: Option<String>,
    pub delivery_fee: Option<Decimal>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub proof_of_delivery: Option<String>,
    pub failure_reason: Option<String>,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
