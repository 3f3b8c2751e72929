use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{error, warn};

use crate::result::{ComparisonOutcome, ComparisonResult, SkipReason};

pub const THRESHOLD_VIOLATIONS: &str = "chat_parity_threshold_violations_total";

/// Coverage under this is critical no matter what the configured minimum is.
const COVERAGE_CRITICAL_PERCENT: f64 = 50.0;
const CHAT_MISSING_PERCENT_MAX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Critical,
    Warning,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Critical => "CRITICAL",
            AlertLevel::Warning => "WARNING",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub metric: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub message: String,
    pub team_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub coverage_percentage_min: f64,
    pub content_mismatch_rate_percent: f64,
    pub ordering_violations_count: f64,
    pub latency_diff_ms_max: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            coverage_percentage_min: 90.0,
            content_mismatch_rate_percent: 1.0,
            ordering_violations_count: 0.0,
            latency_diff_ms_max: 5000.0,
        }
    }
}

impl Thresholds {
    /// Apply named overrides on top of `self`. Unknown names and non-finite values are ignored.
    pub fn with_overrides(mut self, overrides: &HashMap<String, f64>) -> Self {
        for (name, value) in overrides.iter().filter(|(_, v)| v.is_finite()) {
            match name.as_str() {
                "coverage_percentage_min" => self.coverage_percentage_min = *value,
                "content_mismatch_rate_percent" => self.content_mismatch_rate_percent = *value,
                "ordering_violations_count" => self.ordering_violations_count = *value,
                "latency_diff_ms_max" => self.latency_diff_ms_max = *value,
                _ => {}
            }
        }
        self
    }

    pub fn from_overrides(overrides: &HashMap<String, f64>) -> Self {
        Thresholds::default().with_overrides(overrides)
    }
}

/// Evaluates comparison results against thresholds. Every rule is checked on its own, so one
/// result can raise several alerts.
#[derive(Debug, Clone, Default)]
pub struct AlertManager {
    thresholds: Thresholds,
}

impl AlertManager {
    pub fn new(thresholds: Thresholds) -> Self {
        AlertManager { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn check_thresholds(&self, result: &ComparisonResult) -> Vec<Alert> {
        let alert = |level, metric, message: String| Alert {
            level,
            metric,
            value: None,
            threshold: None,
            percentage: None,
            message,
            team_id: result.team_id.clone(),
            channel_id: result.channel_id.clone(),
        };

        let (metrics, details) = match &result.outcome {
            ComparisonOutcome::Skipped { reason } => {
                if *reason == SkipReason::BothFailed {
                    return vec![alert(
                        AlertLevel::Critical,
                        "api_failures",
                        "Both realtime and chat APIs failed".to_owned(),
                    )];
                }
                return Vec::new();
            }
            ComparisonOutcome::Completed {
                metrics, details, ..
            } => (metrics, details),
        };

        let thresholds = &self.thresholds;
        let mut alerts = Vec::new();

        if metrics.primary_missing_count > 0 {
            alerts.push(Alert {
                value: Some(metrics.primary_missing_count as f64),
                ..alert(
                    AlertLevel::Critical,
                    "realtime_missing_messages",
                    "Messages found in chat but not in realtime (should never happen)".to_owned(),
                )
            });
        }

        if metrics.coverage < COVERAGE_CRITICAL_PERCENT {
            alerts.push(Alert {
                value: Some(metrics.coverage),
                threshold: Some(thresholds.coverage_percentage_min),
                ..alert(
                    AlertLevel::Critical,
                    "coverage_percentage",
                    format!(
                        "Coverage dropped below {}% (current: {:.2}%)",
                        COVERAGE_CRITICAL_PERCENT, metrics.coverage
                    ),
                )
            });
        } else if metrics.coverage < thresholds.coverage_percentage_min {
            alerts.push(Alert {
                value: Some(metrics.coverage),
                threshold: Some(thresholds.coverage_percentage_min),
                ..alert(
                    AlertLevel::Warning,
                    "coverage_percentage",
                    format!(
                        "Coverage below threshold (current: {:.2}%, threshold: {}%)",
                        metrics.coverage, thresholds.coverage_percentage_min
                    ),
                )
            });
        }

        if metrics.content_mismatch_rate > thresholds.content_mismatch_rate_percent {
            alerts.push(Alert {
                value: Some(metrics.content_mismatch_rate),
                threshold: Some(thresholds.content_mismatch_rate_percent),
                ..alert(
                    AlertLevel::Warning,
                    "content_mismatch_rate",
                    format!(
                        "Content mismatch rate above threshold ({:.2}% > {}%)",
                        metrics.content_mismatch_rate, thresholds.content_mismatch_rate_percent
                    ),
                )
            });
        }

        if metrics.ordering_violations as f64 > thresholds.ordering_violations_count {
            alerts.push(Alert {
                value: Some(metrics.ordering_violations as f64),
                threshold: Some(thresholds.ordering_violations_count),
                ..alert(
                    AlertLevel::Warning,
                    "ordering_violations",
                    format!("Ordering violations detected ({})", metrics.ordering_violations),
                )
            });
        }

        if metrics.secondary_missing_count > 0 {
            let missing = metrics.secondary_missing_count as f64;
            let percent = missing / (missing + details.matched_count as f64) * 100.0;
            if percent > CHAT_MISSING_PERCENT_MAX {
                alerts.push(Alert {
                    value: Some(missing),
                    threshold: Some(CHAT_MISSING_PERCENT_MAX),
                    percentage: Some(percent),
                    ..alert(
                        AlertLevel::Warning,
                        "chat_missing_messages",
                        format!(
                            "Messages in realtime but not in chat ({} messages, {:.2}%)",
                            metrics.secondary_missing_count, percent
                        ),
                    )
                });
            }
        }

        if metrics.max_latency_diff as f64 > thresholds.latency_diff_ms_max {
            alerts.push(Alert {
                value: Some(metrics.max_latency_diff as f64),
                threshold: Some(thresholds.latency_diff_ms_max),
                ..alert(
                    AlertLevel::Warning,
                    "latency_diff_ms",
                    format!(
                        "High latency difference detected (max: {}ms, avg: {}ms)",
                        metrics.max_latency_diff, metrics.avg_latency_diff
                    ),
                )
            });
        }

        alerts
    }

    pub fn emit_alerts(&self, alerts: &[Alert]) {
        for alert in alerts {
            let labels = [
                ("level", alert.level.as_str().to_owned()),
                ("metric", alert.metric.to_owned()),
                ("channel", alert.channel_id.clone()),
            ];
            metrics::counter!(THRESHOLD_VIOLATIONS, &labels).increment(1);

            match alert.level {
                AlertLevel::Critical => error!(
                    level = %alert.level,
                    metric = alert.metric,
                    value = alert.value,
                    threshold = alert.threshold,
                    team_id = %alert.team_id,
                    channel_id = %alert.channel_id,
                    "threshold violation detected: {}",
                    alert.message
                ),
                AlertLevel::Warning => warn!(
                    level = %alert.level,
                    metric = alert.metric,
                    value = alert.value,
                    threshold = alert.threshold,
                    team_id = %alert.team_id,
                    channel_id = %alert.channel_id,
                    "threshold violation detected: {}",
                    alert.message
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ComparisonDetails, ComparisonMetrics};

    fn completed(metrics: ComparisonMetrics, matched_count: usize) -> ComparisonResult {
        ComparisonResult {
            team_id: "t1".to_owned(),
            channel_id: "team_t1".to_owned(),
            timestamp: 0,
            outcome: ComparisonOutcome::Completed {
                metrics,
                details: ComparisonDetails {
                    matched_count,
                    ..Default::default()
                },
                content_mismatches: vec![],
                ordering_violations: vec![],
            },
        }
    }

    fn healthy() -> ComparisonMetrics {
        ComparisonMetrics {
            coverage: 100.0,
            ..Default::default()
        }
    }

    fn metrics_of(alerts: &[Alert]) -> Vec<(AlertLevel, &'static str)> {
        alerts.iter().map(|a| (a.level, a.metric)).collect()
    }

    #[test]
    fn test_healthy_result_has_no_alerts() {
        let alerts = AlertManager::default().check_thresholds(&completed(healthy(), 10));
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_chat_missing_ratio() {
        let manager = AlertManager::default();

        let six_percent = ComparisonMetrics {
            secondary_missing_count: 6,
            coverage: 94.0,
            ..Default::default()
        };
        let alerts = manager.check_thresholds(&completed(six_percent, 94));
        assert_eq!(
            metrics_of(&alerts),
            vec![(AlertLevel::Warning, "chat_missing_messages")]
        );
        assert_eq!(alerts[0].value, Some(6.0));

        let two_percent = ComparisonMetrics {
            secondary_missing_count: 2,
            coverage: 98.0,
            ..Default::default()
        };
        assert!(manager
            .check_thresholds(&completed(two_percent, 98))
            .is_empty());

        let nothing_matched = ComparisonMetrics {
            secondary_missing_count: 3,
            ..Default::default()
        };
        let alerts = manager.check_thresholds(&completed(nothing_matched, 0));
        let missing = alerts
            .iter()
            .find(|alert| alert.metric == "chat_missing_messages")
            .unwrap();
        assert_eq!(missing.percentage, Some(100.0));
    }

    #[test]
    fn test_coverage_levels_are_exclusive() {
        let manager = AlertManager::default();

        let low = ComparisonMetrics {
            coverage: 40.0,
            ..Default::default()
        };
        assert_eq!(
            metrics_of(&manager.check_thresholds(&completed(low, 0))),
            vec![(AlertLevel::Critical, "coverage_percentage")]
        );

        let below_min = ComparisonMetrics {
            coverage: 80.0,
            ..Default::default()
        };
        assert_eq!(
            metrics_of(&manager.check_thresholds(&completed(below_min, 0))),
            vec![(AlertLevel::Warning, "coverage_percentage")]
        );
    }

    #[test]
    fn test_rules_are_independent() {
        let metrics = ComparisonMetrics {
            coverage: 100.0,
            primary_missing_count: 1,
            content_mismatch_rate: 2.5,
            ordering_violations: 1,
            max_latency_diff: 6000,
            ..Default::default()
        };

        let alerts = AlertManager::default().check_thresholds(&completed(metrics, 10));

        assert_eq!(
            metrics_of(&alerts),
            vec![
                (AlertLevel::Critical, "realtime_missing_messages"),
                (AlertLevel::Warning, "content_mismatch_rate"),
                (AlertLevel::Warning, "ordering_violations"),
                (AlertLevel::Warning, "latency_diff_ms"),
            ]
        );
    }

    #[test]
    fn test_skipped_results() {
        let manager = AlertManager::default();
        let skipped = |reason| ComparisonResult {
            team_id: "t1".to_owned(),
            channel_id: "team_t1".to_owned(),
            timestamp: 0,
            outcome: ComparisonOutcome::Skipped { reason },
        };

        assert_eq!(
            metrics_of(&manager.check_thresholds(&skipped(SkipReason::BothFailed))),
            vec![(AlertLevel::Critical, "api_failures")]
        );
        assert!(manager
            .check_thresholds(&skipped(SkipReason::PrimaryFailed))
            .is_empty());
    }

    #[test]
    fn test_overrides() {
        let overrides = HashMap::from([
            ("latency_diff_ms_max".to_owned(), 10_000.0),
            ("coverage_percentage_min".to_owned(), 75.0),
            ("unknown".to_owned(), 1.0),
            ("ordering_violations_count".to_owned(), f64::NAN),
        ]);
        let thresholds = Thresholds::from_overrides(&overrides);

        assert_eq!(thresholds.latency_diff_ms_max, 10_000.0);
        assert_eq!(thresholds.coverage_percentage_min, 75.0);
        assert_eq!(thresholds.ordering_violations_count, 0.0);
        assert_eq!(thresholds.content_mismatch_rate_percent, 1.0);

        let metrics = ComparisonMetrics {
            coverage: 80.0,
            max_latency_diff: 6000,
            ..Default::default()
        };
        assert!(AlertManager::new(thresholds)
            .check_thresholds(&completed(metrics, 10))
            .is_empty());
    }
}
