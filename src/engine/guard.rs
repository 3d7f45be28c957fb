use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::AssignmentStatus;
use crate::state::AppState;

/// The assignment currently occupying an order's active slot.
#[derive(Debug, Clone, Copy)]
pub struct ActiveAssignment {
    pub id: Uuid,
    pub status: AssignmentStatus,
}

/// Read-only conflict check: is there an assignment for this order whose
/// status is neither `failed` nor `returned`?
pub fn active_assignment(state: &AppState, order_id: Uuid) -> Option<ActiveAssignment> {
    let assignment_id = *state.active_by_order.get(&order_id)?;
    let assignment = state.assignments.get(&assignment_id)?;

    Some(ActiveAssignment {
        id: assignment.id,
        status: assignment.status,
    })
}

/// Claims the order's active slot for `assignment_id`. The claim goes
/// through the index map's entry API, so of two concurrent claims for the
/// same order exactly one wins; the loser gets the conflict error a plain
/// read-then-insert would have missed.
pub fn claim_order_slot(
    state: &AppState,
    order_id: Uuid,
    assignment_id: Uuid,
) -> Result<(), AppError> {
    let holder = match state.active_by_order.entry(order_id) {
        Entry::Occupied(entry) => *entry.get(),
        Entry::Vacant(entry) => {
            entry.insert(assignment_id);
            return Ok(());
        }
    };

    if holder == assignment_id {
        return Ok(());
    }

    let holder_status = state
        .assignments
        .get(&holder)
        .map(|assignment| assignment.status.as_str())
        .unwrap_or("assigned");

    Err(AppError::Conflict(format!(
        "order {order_id} already has an active assignment {holder} ({holder_status})"
    )))
}

/// Releases the slot if this assignment still holds it. Called on
/// transition to `failed`/`returned` and on delete; a delivered assignment
/// keeps the slot so the order cannot be reassigned.
pub fn release_order_slot(state: &AppState, order_id: Uuid, assignment_id: Uuid) {
    state
        .active_by_order
        .remove_if(&order_id, |_, holder| *holder == assignment_id);
}
