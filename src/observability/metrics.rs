use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub transitions_total: IntCounterVec,
    pub active_assignments: IntGauge,
    pub history_entries_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Assignments created/deleted"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Status transitions by target status"),
            &["status"],
        )
        .expect("valid transitions_total metric");

        let active_assignments = IntGauge::new(
            "active_assignments",
            "Assignments currently in a non-terminal status",
        )
        .expect("valid active_assignments metric");

        let history_entries_total = IntCounter::new(
            "history_entries_total",
            "Status history entries written since startup",
        )
        .expect("valid history_entries_total metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(active_assignments.clone()))
            .expect("register active_assignments");
        registry
            .register(Box::new(history_entries_total.clone()))
            .expect("register history_entries_total");

        Self {
            registry,
            assignments_total,
            transitions_total,
            active_assignments,
            history_entries_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
