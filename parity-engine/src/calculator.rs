use crate::matcher::MatchedPair;
use crate::result::ComparisonMetrics;

/// Latency between the two systems over matched pairs, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub avg: u64,
    pub max: u64,
    pub min: u64,
    pub median: u64,
    /// Number of pairs with a resolvable timestamp on both sides.
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn new() -> Self {
        MetricsCalculator
    }

    /// Aggregate one channel's counts. Ordering violations are not known here and are left at
    /// zero for the caller to fill in.
    pub fn calculate_metrics(
        &self,
        matched: &[MatchedPair],
        primary_only_count: usize,
        secondary_only_count: usize,
        mismatch_count: usize,
        primary_total: usize,
        secondary_total: usize,
    ) -> ComparisonMetrics {
        let latency = self.latency_stats(matched);

        ComparisonMetrics {
            count_diff: primary_total.abs_diff(secondary_total),
            coverage: round2(coverage(matched.len(), primary_total)),
            content_mismatch_rate: round2(content_mismatch_rate(mismatch_count, matched.len())),
            ordering_violations: 0,
            avg_latency_diff: latency.avg,
            max_latency_diff: latency.max,
            primary_missing_count: secondary_only_count,
            secondary_missing_count: primary_only_count,
        }
    }

    pub fn latency_stats(&self, matched: &[MatchedPair]) -> LatencyStats {
        let mut diffs: Vec<u64> = matched
            .iter()
            .filter_map(|pair| {
                let primary = pair.primary.timestamp_ms?;
                let secondary = pair.secondary.timestamp_ms?;
                Some(primary.abs_diff(secondary))
            })
            .collect();

        if diffs.is_empty() {
            return LatencyStats::default();
        }

        diffs.sort_unstable();
        let samples = diffs.len();
        let sum: u128 = diffs.iter().map(|d| u128::from(*d)).sum();
        let count = samples as u128;
        // Round half up.
        let avg = u64::try_from((sum * 2 + count) / (count * 2)).unwrap_or(u64::MAX);

        LatencyStats {
            avg,
            max: diffs[samples - 1],
            min: diffs[0],
            median: diffs[(samples - 1) / 2],
            samples,
        }
    }
}

/// Percentage of primary messages that found a counterpart. Nothing to cover counts as full
/// coverage.
pub fn coverage(matched: usize, primary_total: usize) -> f64 {
    if primary_total == 0 {
        return 100.0;
    }
    matched as f64 / primary_total as f64 * 100.0
}

pub fn content_mismatch_rate(mismatches: usize, matched: usize) -> f64 {
    if matched == 0 {
        return 0.0;
    }
    mismatches as f64 / matched as f64 * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
