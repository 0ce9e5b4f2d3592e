use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::sync::LazyLock;

// Proxy metrics
pub static PROXY_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "bib_gateway_proxy_requests_total",
        "Requests relayed to the newsletter service",
        &["outcome", "status_class"]
    )
    .unwrap()
});

pub static PROXY_LATENCY: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "bib_gateway_proxy_duration_seconds",
        "Newsletter relay latency in seconds",
        &["outcome"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

// Auth counters
pub static AUTH_EVENTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "bib_gateway_auth_events_total",
        "Authentication attempts by kind and result",
        &["kind", "result"]
    )
    .unwrap()
});

// Stats counters
pub static STATS_UPDATES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "bib_gateway_stats_updates_total",
        "Follower counter writes",
        &["mode"]
    )
    .unwrap()
});

pub static WELCOME_NOTIFICATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "bib_gateway_welcome_notifications_total",
        "Welcome notification deliveries",
        &["result"]
    )
    .unwrap()
});

/// `2xx`, `4xx`, ... for a numeric status.
pub fn status_class(status: u16) -> &'static str {
    match status / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "other",
    }
}

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
