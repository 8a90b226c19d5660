//! Metrics definitions for the authorizer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authorizer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 2 values (allow, deny)
//! - `reason`: 4 values (none, format, key_resolution, invalid_token)
//! - `tenant`: bounded by configuration
//! - `status`: bounded by `KeyResolutionError` variants plus `success`
//! - `result`: 2 values (hit, miss)
//!
//! Token contents, subjects and key IDs are never used as labels.

use crate::errors::RejectionReason;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle for `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Key-set fetches are bounded by the HTTP timeout (10s default)
        .set_buckets_for_metric(
            Matcher::Full("authorizer_jwks_fetch_duration_seconds".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set key set fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record an authorization outcome.
///
/// Metric: `authorizer_decisions_total`
/// Labels: `outcome`, `reason`
pub fn record_decision(rejection: Option<RejectionReason>) {
    let (outcome, reason) = match rejection {
        None => ("allow", "none"),
        Some(reason) => ("deny", reason.as_str()),
    };

    counter!("authorizer_decisions_total",
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
}

/// Record a key-set fetch attempt.
///
/// Metric: `authorizer_jwks_fetch_total`, `authorizer_jwks_fetch_duration_seconds`
/// Labels: `tenant`, `status`
///
/// Rate-limited attempts are counted but never reach the network, so no
/// duration is recorded for them.
pub fn record_jwks_fetch(tenant: &str, status: &'static str, duration: Duration) {
    counter!("authorizer_jwks_fetch_total",
        "tenant" => tenant.to_string(),
        "status" => status
    )
    .increment(1);

    if status != "rate_limited" {
        histogram!("authorizer_jwks_fetch_duration_seconds",
            "tenant" => tenant.to_string()
        )
        .record(duration.as_secs_f64());
    }
}

/// Record a signing-key cache lookup.
///
/// Metric: `authorizer_key_cache_total`
/// Labels: `tenant`, `result`
pub fn record_key_cache(tenant: &str, result: &'static str) {
    counter!("authorizer_key_cache_total",
        "tenant" => tenant.to_string(),
        "result" => result
    )
    .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    /// Collect `(name, labels, value)` for every counter recorded by `f`.
    fn counters(f: impl FnOnce()) -> Vec<(String, Vec<(String, String)>, u64)> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, f);

        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => {
                    let key = key.key();
                    let labels = key
                        .labels()
                        .map(|l| (l.key().to_string(), l.value().to_string()))
                        .collect();
                    Some((key.name().to_string(), labels, count))
                }
                _ => None,
            })
            .collect()
    }

    fn label<'a>(labels: &'a [(String, String)], name: &str) -> Option<&'a str> {
        labels
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_record_decision_allow_and_deny() {
        let recorded = counters(|| {
            record_decision(None);
            record_decision(None);
            record_decision(Some(RejectionReason::InvalidToken));
        });

        let allow = recorded
            .iter()
            .find(|(_, labels, _)| label(labels, "outcome") == Some("allow"))
            .unwrap();
        assert_eq!(allow.0, "authorizer_decisions_total");
        assert_eq!(label(&allow.1, "reason"), Some("none"));
        assert_eq!(allow.2, 2);

        let deny = recorded
            .iter()
            .find(|(_, labels, _)| label(labels, "outcome") == Some("deny"))
            .unwrap();
        assert_eq!(label(&deny.1, "reason"), Some("invalid_token"));
        assert_eq!(deny.2, 1);
    }

    #[test]
    fn test_record_jwks_fetch_labels() {
        let recorded = counters(|| {
            record_jwks_fetch("default", "success", Duration::from_millis(20));
            record_jwks_fetch("default", "rate_limited", Duration::ZERO);
        });

        assert_eq!(recorded.len(), 2);
        for (name, labels, count) in &recorded {
            assert_eq!(name, "authorizer_jwks_fetch_total");
            assert_eq!(label(labels, "tenant"), Some("default"));
            assert_eq!(*count, 1);
        }
    }

    #[test]
    fn test_record_key_cache() {
        let recorded = counters(|| {
            record_key_cache("external_api_token", "hit");
            record_key_cache("external_api_token", "hit");
            record_key_cache("external_api_token", "miss");
        });

        let hits = recorded
            .iter()
            .find(|(_, labels, _)| label(labels, "result") == Some("hit"))
            .unwrap();
        assert_eq!(hits.0, "authorizer_key_cache_total");
        assert_eq!(hits.2, 2);
    }
}
