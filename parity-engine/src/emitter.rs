use tracing::{info, warn};

use crate::alerts::AlertManager;
use crate::result::{ComparisonMetrics, ComparisonOutcome, ComparisonResult};

const MESSAGE_COUNT_DISCREPANCY: &str = "chat_parity_message_count_discrepancy";
const CONTENT_MISMATCH_RATE: &str = "chat_parity_content_mismatch_rate";
const ORDERING_VIOLATIONS: &str = "chat_parity_ordering_violations";
const COVERAGE_PERCENTAGE: &str = "chat_parity_coverage_percentage";
const LATENCY_DIFF_MS: &str = "chat_parity_latency_diff_ms";
const MAX_LATENCY_DIFF_MS: &str = "chat_parity_max_latency_diff_ms";
const CHAT_MISSING_MESSAGES: &str = "chat_parity_chat_missing_messages_total";
const REALTIME_MISSING_MESSAGES: &str = "chat_parity_realtime_missing_messages_total";

const BATCH_TOTAL: &str = "chat_parity_batch_total_comparisons";
const BATCH_SUCCESSFUL: &str = "chat_parity_batch_successful_comparisons";
const BATCH_SKIPPED: &str = "chat_parity_batch_skipped_comparisons";
const BATCH_WITH_ISSUES: &str = "chat_parity_batch_comparisons_with_issues";

const LOGGED_SAMPLES: usize = 3;
const CHAT_MISSING_TOLERATED: usize = 5;

/// Whether a completed comparison is worth a closer look.
pub fn has_issues(metrics: &ComparisonMetrics) -> bool {
    metrics.primary_missing_count > 0
        || metrics.secondary_missing_count > CHAT_MISSING_TOLERATED
        || metrics.content_mismatch_rate > 1.0
        || metrics.ordering_violations > 0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub skipped: usize,
    pub with_issues: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ComparisonResult]) -> Self {
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        let with_issues = results
            .iter()
            .filter_map(ComparisonResult::metrics)
            .filter(|m| has_issues(m))
            .count();

        BatchSummary {
            total: results.len(),
            successful: results.len() - skipped,
            skipped,
            with_issues,
        }
    }
}

/// Publishes comparison results as gauges, counters and log lines, then raises alerts.
#[derive(Debug, Clone, Default)]
pub struct MetricsEmitter {
    alerts: AlertManager,
}

impl MetricsEmitter {
    pub fn new(alerts: AlertManager) -> Self {
        MetricsEmitter { alerts }
    }

    pub fn alert_manager(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn emit_comparison_metrics(&self, result: &ComparisonResult) {
        let (metrics, details, mismatches, violations) = match &result.outcome {
            ComparisonOutcome::Skipped { reason } => {
                warn!(
                    team_id = %result.team_id,
                    channel_id = %result.channel_id,
                    reason = reason.as_str(),
                    "comparison skipped, no metrics emitted"
                );
                self.alerts
                    .emit_alerts(&self.alerts.check_thresholds(result));
                return;
            }
            ComparisonOutcome::Completed {
                metrics,
                details,
                content_mismatches,
                ordering_violations,
            } => (metrics, details, content_mismatches, ordering_violations),
        };

        let labels = [
            ("team", result.team_id.clone()),
            ("channel", result.channel_id.clone()),
        ];

        metrics::gauge!(MESSAGE_COUNT_DISCREPANCY, &labels).set(metrics.count_diff as f64);
        metrics::gauge!(CONTENT_MISMATCH_RATE, &labels).set(metrics.content_mismatch_rate);
        metrics::gauge!(ORDERING_VIOLATIONS, &labels).set(metrics.ordering_violations as f64);
        metrics::gauge!(COVERAGE_PERCENTAGE, &labels).set(metrics.coverage);
        metrics::gauge!(LATENCY_DIFF_MS, &labels).set(metrics.avg_latency_diff as f64);
        metrics::gauge!(MAX_LATENCY_DIFF_MS, &labels).set(metrics.max_latency_diff as f64);

        if metrics.secondary_missing_count > 0 {
            metrics::counter!(CHAT_MISSING_MESSAGES, &labels)
                .increment(metrics.secondary_missing_count as u64);
        }
        if metrics.primary_missing_count > 0 {
            metrics::counter!(REALTIME_MISSING_MESSAGES, &labels)
                .increment(metrics.primary_missing_count as u64);
        }

        macro_rules! log_result {
            ($level:ident, $message:literal) => {
                $level!(
                    team_id = %result.team_id,
                    channel_id = %result.channel_id,
                    timestamp = result.timestamp,
                    count_diff = metrics.count_diff,
                    content_mismatch_rate = metrics.content_mismatch_rate,
                    ordering_violations = metrics.ordering_violations,
                    coverage = metrics.coverage,
                    avg_latency_diff_ms = metrics.avg_latency_diff,
                    max_latency_diff_ms = metrics.max_latency_diff,
                    chat_missing = metrics.secondary_missing_count,
                    realtime_missing = metrics.primary_missing_count,
                    total_realtime = details.total_primary_messages,
                    total_chat = details.total_secondary_messages,
                    matched = details.matched_count,
                    $message
                )
            };
        }

        if has_issues(metrics) {
            log_result!(warn, "comparison completed with issues");
        } else {
            log_result!(info, "comparison completed successfully");
        }

        if !mismatches.is_empty() {
            let samples = serde_json::to_string(&mismatches[..mismatches.len().min(LOGGED_SAMPLES)])
                .unwrap_or_default();
            warn!(
                team_id = %result.team_id,
                channel_id = %result.channel_id,
                count = mismatches.len(),
                samples = %samples,
                "content mismatches detected"
            );
        }

        if !violations.is_empty() {
            let samples = serde_json::to_string(&violations[..violations.len().min(LOGGED_SAMPLES)])
                .unwrap_or_default();
            warn!(
                team_id = %result.team_id,
                channel_id = %result.channel_id,
                count = violations.len(),
                samples = %samples,
                "ordering violations detected"
            );
        }

        let alerts = self.alerts.check_thresholds(result);
        if !alerts.is_empty() {
            self.alerts.emit_alerts(&alerts);
        }
    }

    pub fn emit_batch_summary(&self, results: &[ComparisonResult]) -> BatchSummary {
        let summary = BatchSummary::from_results(results);

        metrics::gauge!(BATCH_TOTAL).set(summary.total as f64);
        metrics::gauge!(BATCH_SUCCESSFUL).set(summary.successful as f64);
        metrics::gauge!(BATCH_SKIPPED).set(summary.skipped as f64);
        metrics::gauge!(BATCH_WITH_ISSUES).set(summary.with_issues as f64);

        info!(
            total_comparisons = summary.total,
            successful_comparisons = summary.successful,
            skipped_comparisons = summary.skipped,
            comparisons_with_issues = summary.with_issues,
            "batch comparison summary"
        );

        summary
    }
}
