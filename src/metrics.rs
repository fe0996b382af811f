//! Prometheus metrics for the relayer
//!
//! Exposed on the /metrics endpoint for scraping.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec,
};

lazy_static! {
    pub static ref UP: Gauge =
        register_gauge!("relayer_up", "Whether the relayer is running").unwrap();

    pub static ref EVENTS_DETECTED: CounterVec = register_counter_vec!(
        "relayer_events_detected_total",
        "Total number of finalized source events detected",
        &["route", "kind"]
    )
    .unwrap();

    pub static ref DISPATCHES: CounterVec = register_counter_vec!(
        "relayer_dispatches_total",
        "Total number of dispatch attempts by outcome",
        &["route", "outcome"]
    )
    .unwrap();

    pub static ref PASS_FAILURES: CounterVec = register_counter_vec!(
        "relayer_pass_failures_total",
        "Total number of failed scan+dispatch passes",
        &["chain"]
    )
    .unwrap();

    pub static ref CURSOR: GaugeVec = register_gauge_vec!(
        "relayer_cursor_block",
        "Last fully-scanned block per source chain",
        &["chain"]
    )
    .unwrap();

    pub static ref PENDING_ACTIONS: Gauge = register_gauge!(
        "relayer_pending_actions",
        "Number of actions queued for retry"
    )
    .unwrap();
}
