//! Prometheus counters for the API.
//!
//! A single global registry; handlers and services bump counters through
//! `METRICS`, and `GET /metrics` renders the text exposition format.

pub mod middleware;

use std::time::Instant;

use once_cell::sync::Lazy;
use prometheus::{CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

/// Global metrics instance
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

pub struct Metrics {
    registry: Registry,

    /// Requests by method and response status
    pub http_requests_total: CounterVec,
    /// Cache lookups by cache namespace and result (hit, miss, error)
    pub cache_requests_total: CounterVec,
    /// CV analyses by detected format, extraction method and outcome
    pub cv_parse_total: CounterVec,
    /// Login / refresh / register outcomes
    pub auth_events_total: CounterVec,
    /// Application submissions and status transitions, by target status
    pub applications_total: CounterVec,
    pub notifications_created_total: CounterVec,
    pub uptime_seconds: Gauge,
}

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    CounterVec::new(Opts::new(name, help), labels)
        .expect("valid metric definition")
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = counter(
            "hirehub_http_requests_total",
            "Total HTTP requests by method and status",
            &["method", "status"],
        );
        let cache_requests_total = counter(
            "hirehub_cache_requests_total",
            "Cache lookups by cache and result",
            &["cache", "result"],
        );
        let cv_parse_total = counter(
            "hirehub_cv_parse_total",
            "CV analyses by format, extraction method and outcome",
            &["format", "method", "outcome"],
        );
        let auth_events_total = counter(
            "hirehub_auth_events_total",
            "Authentication events by kind and outcome",
            &["event", "outcome"],
        );
        let applications_total = counter(
            "hirehub_applications_total",
            "Application submissions and status transitions by status",
            &["status"],
        );
        let notifications_created_total = counter(
            "hirehub_notifications_created_total",
            "Notifications created by kind",
            &["kind"],
        );
        let uptime_seconds = Gauge::new("hirehub_uptime_seconds", "Server uptime in seconds")
            .expect("valid metric definition");

        for collector in [
            &http_requests_total,
            &cache_requests_total,
            &cv_parse_total,
            &auth_events_total,
            &applications_total,
            &notifications_created_total,
        ] {
            registry
                .register(Box::new(collector.clone()))
                .expect("metric names are unique");
        }
        registry
            .register(Box::new(uptime_seconds.clone()))
            .expect("metric names are unique");

        Lazy::force(&STARTED_AT);

        Self {
            registry,
            http_requests_total,
            cache_requests_total,
            cv_parse_total,
            auth_events_total,
            applications_total,
            notifications_created_total,
            uptime_seconds,
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        self.uptime_seconds.set(STARTED_AT.elapsed().as_secs_f64());

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {e}");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Shorthand for `METRICS.<vec>.with_label_values(labels).inc()`.
pub fn inc(vec: &CounterVec, labels: &[&str]) {
    vec.with_label_values(labels).inc();
}

/// GET /metrics
pub async fn metrics_handler() -> String {
    METRICS.export()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_incremented_counter() {
        inc(&METRICS.cv_parse_total, &["pdf", "direct", "success"]);
        let text = METRICS.export();
        assert!(text.contains("hirehub_cv_parse_total"));
        assert!(text.contains("format=\"pdf\""));
        assert!(text.contains("hirehub_uptime_seconds"));
    }
}
