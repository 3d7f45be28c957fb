use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::order::OrderStatus;

/// How the state machine treats the requested target status.
///
/// Permissive is the default: any of the six statuses is accepted as a
/// target, which tolerates out-of-order status reports from the field (a
/// rider confirming delivery without the app ever recording pickup).
/// Strict mode only allows the forward delivery chain plus failure/return
/// from a non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    Permissive,
    Strict,
}

impl TransitionPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }

    pub fn validate(
        &self,
        from: AssignmentStatus,
        to: AssignmentStatus,
    ) -> Result<(), AppError> {
        if *self == TransitionPolicy::Permissive {
            return Ok(());
        }

        let legal = matches!(
            (from, to),
            (AssignmentStatus::Assigned, AssignmentStatus::PickedUp)
                | (AssignmentStatus::PickedUp, AssignmentStatus::InTransit)
                | (AssignmentStatus::InTransit, AssignmentStatus::Delivered)
        ) || (!from.is_terminal()
            && matches!(to, AssignmentStatus::Failed | AssignmentStatus::Returned));

        if legal {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "illegal status transition {} -> {}",
                from.as_str(),
                to.as_str()
            )))
        }
    }
}

/// Fields a status update may carry alongside the target status.
#[derive(Debug, Default, Clone)]
pub struct TransitionChanges {
    pub delivery_notes: Option<String>,
    pub failure_reason: Option<String>,
    pub proof_of_delivery: Option<String>,
}

/// Applies the target status and its side effects. Effects depend only on
/// the target, not the path taken, and each stage timestamp is written at
/// most once.
pub fn apply(
    assignment: &mut DeliveryAssignment,
    target: AssignmentStatus,
    changes: &TransitionChanges,
    now: DateTime<Utc>,
) {
    assignment.status = target;

    match target {
        AssignmentStatus::PickedUp => stamp(&mut assignment.picked_up_at, now),
        AssignmentStatus::InTransit => stamp(&mut assignment.in_transit_at, now),
        AssignmentStatus::Delivered => stamp(&mut assignment.delivered_at, now),
        AssignmentStatus::Failed => {
            stamp(&mut assignment.failed_at, now);
            if changes.failure_reason.is_some() {
                assignment.failure_reason = changes.failure_reason.clone();
            }
        }
        AssignmentStatus::Assigned | AssignmentStatus::Returned => {}
    }

    if changes.delivery_notes.is_some() {
        assignment.delivery_notes = changes.delivery_notes.clone();
    }
    if changes.proof_of_delivery.is_some() {
        assignment.proof_of_delivery = changes.proof_of_delivery.clone();
    }

    assignment.updated_at = now;
}

/// The order-status side effect of reaching `target`, if any. Delivery
/// completes the order; failure sends it back to triage.
pub fn order_effect(target: AssignmentStatus) -> Option<OrderStatus> {
    match target {
        AssignmentStatus::Delivered => Some(OrderStatus::Delivered),
        AssignmentStatus::Failed => Some(OrderStatus::Processing),
        _ => None,
    }
}

fn stamp(slot: &mut Option<DateTime<Utc>>, now: DateTime<Utc>) {
    if slot.is_none() {
        *slot = Some(now);
    }
}
