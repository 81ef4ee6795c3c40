use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Histogram, IntCounterVec, IntGauge, TextEncoder, register_counter,
    register_histogram, register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_chat_requests_total", "Total number of chat requests").unwrap();
    pub static ref QUOTA_DECISIONS: IntCounterVec = register_int_counter_vec!(
        "gateway_quota_decisions_total",
        "Quota decisions by principal kind and outcome",
        &["kind", "outcome"]
    )
    .unwrap();
    pub static ref ACTIVE_WINDOWS: IntGauge =
        register_int_gauge!("gateway_quota_windows", "Current number of open quota windows").unwrap();
    pub static ref ACTIVE_SESSIONS: IntGauge =
        register_int_gauge!("gateway_sessions", "Current number of chat sessions").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "gateway_upstream_latency_seconds",
        "Upstream chat API latency in seconds"
    )
    .unwrap();
}

// Prometheus text format of the default registry
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
