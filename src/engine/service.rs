use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Operator;
use crate::engine::{availability, guard, transitions};
use crate::engine::transitions::{TransitionChanges, TransitionPolicy};
use crate::error::AppError;
use crate::models::assignment::{
    AssignmentEvent, AssignmentStatus, DeliveryAssignment, Priority,
};
use crate::models::order::{OrderStatus, OrderSummary};
use crate::models::rider::RiderSummary;
use crate::state::AppState;

pub const MAX_PAGE_SIZE: u64 = 100;
const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Debug, Deserialize)]
pub struct CreateAssignment {
    pub order_id: Uuid,
    pub rider_id: Uuid,
    #[serde(default)]
    pub priority: Priority,
    pub delivery_notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivery_fee: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssignment {
    pub id: Uuid,
    pub status: AssignmentStatus,
    pub delivery_notes: Option<String>,
    pub failure_reason: Option<String>,
    pub proof_of_delivery: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignmentFilter {
    pub status: Option<AssignmentStatus>,
    pub rider_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// One listing row: the assignment plus rider and order display fields.
#[derive(Debug, Serialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: DeliveryAssignment,
    pub rider: Option<RiderSummary>,
    pub order: Option<OrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentPage {
    pub assignments: Vec<AssignmentView>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Filtered, newest-first listing. Read-only; no guard checks.
pub fn list_assignments(state: &AppState, filter: &AssignmentFilter) -> AssignmentPage {
    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut matching: Vec<DeliveryAssignment> = state
        .assignments
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|a| filter.status.is_none_or(|wanted| a.status == wanted))
        .filter(|a| filter.rider_id.is_none_or(|wanted| a.rider_id == wanted))
        .filter(|a| filter.date_from.is_none_or(|from| a.assigned_at >= from))
        .filter(|a| filter.date_to.is_none_or(|to| a.assigned_at <= to))
        .collect();

    matching.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));

    let total = matching.len() as u64;
    let skip = ((page - 1) * limit) as usize;

    let assignments = matching
        .into_iter()
        .skip(skip)
        .take(limit as usize)
        .map(|assignment| AssignmentView {
            rider: state
                .riders
                .get(&assignment.rider_id)
                .map(|rider| RiderSummary::from(rider.value())),
            order: state
                .orders
                .get(&assignment.order_id)
                .map(|order| OrderSummary::from(order.value())),
            assignment,
        })
        .collect();

    AssignmentPage {
        assignments,
        total,
        page,
        limit,
    }
}

/// Creates an assignment and dispatches the order to the rider. Conflict
/// and rider checks run in that order so the caller sees the conflict
/// first; the order slot claim re-checks atomically before the insert.
pub fn create_assignment(
    state: &AppState,
    actor: &Operator,
    req: CreateAssignment,
) -> Result<DeliveryAssignment, AppError> {
    if !state.orders.contains_key(&req.order_id) {
        return Err(AppError::NotFound(format!(
            "order {} not found",
            req.order_id
        )));
    }

    if let Some(active) = guard::active_assignment(state, req.order_id) {
        return Err(AppError::Conflict(format!(
            "order {} already has an active assignment {} ({})",
            req.order_id,
            active.id,
            active.status.as_str()
        )));
    }

    let rider = availability::require_available_rider(state, req.rider_id)?;

    let now = Utc::now();
    let assignment = DeliveryAssignment {
        id: Uuid::new_v4(),
        order_id: req.order_id,
        rider_id: rider.id,
        status: AssignmentStatus::Assigned,
        priority: req.priority,
        delivery_notes: req.delivery_notes.clone(),
        delivery_fee: req.delivery_fee,
        estimated_delivery: req.estimated_delivery,
        proof_of_delivery: None,
        failure_reason: None,
        assigned_by: actor.name.clone(),
        assigned_at: now,
        picked_up_at: None,
        in_transit_at: None,
        delivered_at: None,
        failed_at: None,
        updated_at: now,
    };

    guard::claim_order_slot(state, req.order_id, assignment.id)?;
    state.assignments.insert(assignment.id, assignment.clone());

    set_order_status(state, req.order_id, OrderStatus::DispatchedToRider, now);

    state.history.record(
        assignment.id,
        None,
        AssignmentStatus::Assigned,
        &actor.name,
        req.delivery_notes,
    );
    state.metrics.history_entries_total.inc();

    publish(state, &assignment, None);

    state
        .metrics
        .assignments_total
        .with_label_values(&["created"])
        .inc();
    state.metrics.active_assignments.inc();

    info!(
        assignment_id = %assignment.id,
        order_id = %assignment.order_id,
        rider_id = %assignment.rider_id,
        assigned_by = %actor.name,
        role = actor.role.as_str(),
        "assignment created"
    );

    Ok(assignment)
}

/// Moves an assignment to the requested status, applying the timestamp and
/// order side effects for that target and writing one history entry.
pub fn update_assignment(
    state: &AppState,
    actor: &Operator,
    req: UpdateAssignment,
) -> Result<DeliveryAssignment, AppError> {
    let (old_status, order_id) = {
        let assignment = state
            .assignments
            .get(&req.id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {} not found", req.id)))?;
        (assignment.status, assignment.order_id)
    };

    TransitionPolicy::from_strict_flag(state.strict_transitions).validate(old_status, req.status)?;

    // A terminal assignment coming back to life must win the order slot
    // back, otherwise a replacement created in the meantime would coexist
    // with it.
    let resurrecting = old_status.releases_order() && !req.status.releases_order();
    if resurrecting {
        guard::claim_order_slot(state, order_id, req.id)?;
    }

    let changes = TransitionChanges {
        delivery_notes: req.delivery_notes.clone(),
        failure_reason: req.failure_reason.clone(),
        proof_of_delivery: req.proof_of_delivery.clone(),
    };

    let updated = match state.assignments.get_mut(&req.id) {
        Some(mut assignment) => {
            transitions::apply(&mut assignment, req.status, &changes, Utc::now());
            assignment.clone()
        }
        None => {
            if resurrecting {
                guard::release_order_slot(state, order_id, req.id);
            }
            return Err(AppError::NotFound(format!(
                "assignment {} not found",
                req.id
            )));
        }
    };

    if req.status.releases_order() {
        guard::release_order_slot(state, order_id, req.id);
    }

    if let Some(order_status) = transitions::order_effect(req.status) {
        set_order_status(state, order_id, order_status, updated.updated_at);
    }

    state.history.record(
        req.id,
        Some(old_status),
        req.status,
        &actor.name,
        req.delivery_notes,
    );
    state.metrics.history_entries_total.inc();

    publish(state, &updated, Some(old_status));

    state
        .metrics
        .transitions_total
        .with_label_values(&[req.status.as_str()])
        .inc();
    if !old_status.is_terminal() && updated.status.is_terminal() {
        state.metrics.active_assignments.dec();
    } else if old_status.is_terminal() && !updated.status.is_terminal() {
        state.metrics.active_assignments.inc();
    }

    info!(
        assignment_id = %req.id,
        old_status = old_status.as_str(),
        new_status = req.status.as_str(),
        changed_by = %actor.name,
        "assignment status updated"
    );

    Ok(updated)
}

/// Removes an assignment that never got underway. In-transit and delivered
/// assignments stay; the order goes back to triage. History survives.
pub fn delete_assignment(state: &AppState, actor: &Operator, id: Uuid) -> Result<(), AppError> {
    use dashmap::mapref::entry::Entry;

    let removed = match state.assignments.entry(id) {
        Entry::Occupied(entry) => {
            let status = entry.get().status;
            if matches!(
                status,
                AssignmentStatus::InTransit | AssignmentStatus::Delivered
            ) {
                return Err(AppError::BadRequest(format!(
                    "cannot delete assignment {id} while {}",
                    status.as_str()
                )));
            }
            entry.remove()
        }
        Entry::Vacant(_) => {
            return Err(AppError::NotFound(format!("assignment {id} not found")));
        }
    };

    guard::release_order_slot(state, removed.order_id, removed.id);
    set_order_status(state, removed.order_id, OrderStatus::Processing, Utc::now());

    state
        .metrics
        .assignments_total
        .with_label_values(&["deleted"])
        .inc();
    if !removed.status.is_terminal() {
        state.metrics.active_assignments.dec();
    }

    info!(
        assignment_id = %id,
        order_id = %removed.order_id,
        deleted_by = %actor.name,
        "assignment deleted, order returned to triage"
    );

    Ok(())
}

fn set_order_status(state: &AppState, order_id: Uuid, status: OrderStatus, now: DateTime<Utc>) {
    match state.orders.get_mut(&order_id) {
        Some(mut order) => {
            order.status = status;
            order.updated_at = now;
        }
        None => {
            // The order store is shared with the storefront; a missing row
            // here is an operator problem, not a request failure.
            warn!(order_id = %order_id, "order missing while syncing status");
        }
    }
}

fn publish(state: &AppState, assignment: &DeliveryAssignment, old_status: Option<AssignmentStatus>) {
    let event = AssignmentEvent {
        assignment: assignment.clone(),
        old_status,
    };
    let _ = state.assignment_events_tx.send(event);
}
