//! Prometheus metrics (§4.8): counters for changelog throughput and token
//! verification outcomes, a histogram for batch commit latency.

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref ENTRIES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "adr_changelog_entries_total",
            "Changelog entries processed by outcome"
        ),
        &["outcome"],
    )
    .expect("metric names and labels are static and valid");

    pub static ref BATCH_COMMIT_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "adr_batch_commit_seconds",
            "Latency of one batch commit against the KV store"
        ),
        &["result"],
    )
    .expect("metric names and labels are static and valid");

    pub static ref TOKEN_OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "adr_token_operations_total",
            "STS session token issue/verify operations by outcome"
        ),
        &["operation", "outcome"],
    )
    .expect("metric names and labels are static and valid");
}

/// Registers all metrics with the global registry. Idempotent: safe to call
/// more than once (e.g. once per test).
pub fn register() -> Result<(), prometheus::Error> {
    for collector in [
        Box::new(ENTRIES_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(BATCH_COMMIT_SECONDS.clone()),
        Box::new(TOKEN_OPERATIONS_TOTAL.clone()),
    ] {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Records one applied, failed, or skipped changelog entry.
pub fn observe_entry(outcome: &str) {
    ENTRIES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Records one batch commit's latency, tagged by whether it succeeded.
pub fn observe_commit(seconds: f64, result: &str) {
    BATCH_COMMIT_SECONDS.with_label_values(&[result]).observe(seconds);
}

/// Records one token issue/verify outcome, e.g. `("verify", "expired")`.
pub fn observe_token(operation: &str, outcome: &str) {
    TOKEN_OPERATIONS_TOTAL.with_label_values(&[operation, outcome]).inc();
}

/// Encodes all registered metrics in Prometheus text exposition format.
pub fn encode() -> Result<Vec<u8>, prometheus::Error> {
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    Ok(buf)
}
