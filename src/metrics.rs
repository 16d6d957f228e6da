// Prometheus metrics for the gate
//
// Exposed on the /metrics HTTP endpoint:
// - Gate decisions by outcome (counter)
// - Counter store failures by operation and kind (counter)
// - Recorded usages (counter)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref GATE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("gate_decisions_total", "Gate decisions by outcome"),
        &["outcome"]
    ).expect("Failed to create gate decisions metric");

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("counter_store_errors_total", "Counter store failures absorbed by the gate"),
        &["operation", "kind"]
    ).expect("Failed to create store errors metric");

    pub static ref USAGE_RECORDED_TOTAL: IntCounter = IntCounter::new(
        "usage_recorded_total",
        "Usages recorded against daily quotas"
    ).expect("Failed to create usage recorded metric");
}

/// Register all metrics. Safe to call more than once.
pub fn init() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(GATE_DECISIONS_TOTAL.clone()),
        Box::new(STORE_ERRORS_TOTAL.clone()),
        Box::new(USAGE_RECORDED_TOTAL.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Count a gate decision
pub fn record_decision(outcome: &str) {
    GATE_DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Count an absorbed store failure
pub fn record_store_error(operation: &str, kind: &str) {
    STORE_ERRORS_TOTAL.with_label_values(&[operation, kind]).inc();
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
