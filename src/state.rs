use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::Operator;
use crate::engine::history::HistoryLog;
use crate::models::assignment::{AssignmentEvent, DeliveryAssignment};
use crate::models::order::Order;
use crate::models::rider::Rider;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub orders: DashMap<Uuid, Order>,
    pub riders: DashMap<Uuid, Rider>,
    pub assignments: DashMap<Uuid, DeliveryAssignment>,
    /// Maps an order to the assignment currently holding its active slot.
    /// Claiming through this map's entry API is what keeps two concurrent
    /// creates from both inserting for the same order.
    pub active_by_order: DashMap<Uuid, Uuid>,
    pub history: HistoryLog,
    /// Bearer token -> operator, seeded from config.
    pub operators: DashMap<String, Operator>,
    pub assignment_events_tx: broadcast::Sender<AssignmentEvent>,
    pub strict_transitions: bool,
    pub metrics: Metrics,
    order_seq: AtomicU64,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        strict_transitions: bool,
        api_tokens: Vec<(String, Operator)>,
    ) -> Self {
        let (assignment_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        let operators = DashMap::new();
        for (token, operator) in api_tokens {
            operators.insert(token, operator);
        }

        Self {
            orders: DashMap::new(),
            riders: DashMap::new(),
            assignments: DashMap::new(),
            active_by_order: DashMap::new(),
            history: HistoryLog::new(),
            operators,
            assignment_events_tx,
            strict_transitions,
            metrics: Metrics::new(),
            order_seq: AtomicU64::new(0),
        }
    }

    pub fn next_order_number(&self) -> String {
        let seq = self.order_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ORD-{seq:06}")
    }
}
