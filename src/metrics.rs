//! Prometheus collectors (default registry, exposed on `/metrics`)

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

lazy_static! {
    pub static ref CACHE_HITS: IntCounter =
        register_int_counter!("gateway_cache_hits_total", "Artifact cache hits").unwrap();
    pub static ref CACHE_MISSES: IntCounter =
        register_int_counter!("gateway_cache_misses_total", "Artifact cache misses or stale entries").unwrap();
    pub static ref PRODUCER_RUNS: IntCounter =
        register_int_counter!("gateway_cache_producer_runs_total", "Upstream fetch-and-rewrite runs").unwrap();
    pub static ref UPSTREAM_ERRORS: IntCounter =
        register_int_counter!("gateway_upstream_errors_total", "Failed upstream requests").unwrap();
    pub static ref ACTIVE_STREAMS: IntGauge =
        register_int_gauge!("gateway_active_streams", "Streams currently relayed to clients").unwrap();
    pub static ref API_ACTIONS: IntCounterVec = register_int_counter_vec!(
        "gateway_api_actions_total",
        "player_api.php dispatches by action",
        &["action"]
    )
    .unwrap();
}
