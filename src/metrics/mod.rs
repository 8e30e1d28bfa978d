/// Metrics registry for the issuance pipeline, rate-limit engine and SA.
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub mod events;

pub use events::{AuditEvent, EventAuditor};

/// Health status for a collaborator (VA, CA, CT, cache, store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Prometheus registry wrapper exposing the core's operational counters.
pub struct MetricsRegistry {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub orders_finalized_total: IntCounter,
    pub validations_total: IntCounterVec,
    pub rate_limit_denials_total: IntCounterVec,
    pub certificates_issued_total: IntCounter,
    pub certificates_revoked_total: IntCounter,
    pub sct_quorum_wait_seconds: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("ra_orders_created_total", "Total orders created").unwrap();
        let orders_finalized_total =
            IntCounter::new("ra_orders_finalized_total", "Total orders finalized").unwrap();
        let validations_total = IntCounterVec::new(
            Opts::new("ra_validations_total", "Validation attempts by outcome"),
            &["outcome"],
        )
        .unwrap();
        let rate_limit_denials_total = IntCounterVec::new(
            Opts::new("ra_rate_limit_denials_total", "Rate-limit denials by limit"),
            &["limit"],
        )
        .unwrap();
        let certificates_issued_total =
            IntCounter::new("ra_certificates_issued_total", "Total certificates issued").unwrap();
        let certificates_revoked_total =
            IntCounter::new("ra_certificates_revoked_total", "Total certificates revoked").unwrap();
        let sct_quorum_wait_seconds = Histogram::with_opts(HistogramOpts::new(
            "ra_sct_quorum_wait_seconds",
            "Time spent waiting for SCT quorum during finalization",
        ))
        .unwrap();

        registry.register(Box::new(orders_created_total.clone())).unwrap();
        registry.register(Box::new(orders_finalized_total.clone())).unwrap();
        registry.register(Box::new(validations_total.clone())).unwrap();
        registry.register(Box::new(rate_limit_denials_total.clone())).unwrap();
        registry.register(Box::new(certificates_issued_total.clone())).unwrap();
        registry.register(Box::new(certificates_revoked_total.clone())).unwrap();
        registry.register(Box::new(sct_quorum_wait_seconds.clone())).unwrap();

        Self {
            registry,
            orders_created_total,
            orders_finalized_total,
            validations_total,
            rate_limit_denials_total,
            certificates_issued_total,
            certificates_revoked_total,
            sct_quorum_wait_seconds,
        }
    }

    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&mf, &mut buffer).unwrap();
        String::from_utf8_lossy(&buffer).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn health_status_code(status: HealthStatus) -> (&'static str, u16) {
    match status {
        HealthStatus::Healthy => ("ok", 200),
        HealthStatus::Degraded => ("degraded", 200),
        HealthStatus::Unhealthy => ("unhealthy", 503),
    }
}

pub type SharedMetrics = Arc<MetricsRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_gathers_without_panicking() {
        let metrics = MetricsRegistry::new();
        metrics.orders_created_total.inc();
        metrics.validations_total.with_label_values(&["success"]).inc();
        let text = metrics.gather_text();
        assert!(text.contains("ra_orders_created_total"));
    }
}
