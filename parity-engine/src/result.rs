use serde::Serialize;
use serde_json::Value;

use crate::comparator::ContentDifference;
use crate::message::OrderingKey;
use crate::ordering::OrderingViolation;

/// Raw messages fetched for one channel and window from both systems.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub team_id: String,
    pub channel_id: String,
    pub primary_messages: Vec<Value>,
    pub secondary_messages: Vec<Value>,
    pub primary_success: bool,
    pub secondary_success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PrimaryFailed,
    SecondaryFailed,
    BothFailed,
}

impl SkipReason {
    /// The reason a comparison cannot run, if any.
    pub fn from_fetch(primary_success: bool, secondary_success: bool) -> Option<Self> {
        match (primary_success, secondary_success) {
            (true, true) => None,
            (false, true) => Some(SkipReason::PrimaryFailed),
            (true, false) => Some(SkipReason::SecondaryFailed),
            (false, false) => Some(SkipReason::BothFailed),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::PrimaryFailed => "primary_failed",
            SkipReason::SecondaryFailed => "secondary_failed",
            SkipReason::BothFailed => "both_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ComparisonMetrics {
    pub count_diff: usize,
    pub coverage: f64,
    pub content_mismatch_rate: f64,
    pub ordering_violations: usize,
    pub avg_latency_diff: u64,
    pub max_latency_diff: u64,
    /// Messages the chat store has that the realtime transport never reported.
    pub primary_missing_count: usize,
    /// Messages the realtime transport reported that never reached the chat store.
    pub secondary_missing_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonDetails {
    pub total_primary_messages: usize,
    pub total_secondary_messages: usize,
    pub matched_count: usize,
    pub content_mismatch_count: usize,
    pub ordering_violation_count: usize,
}

/// A sampled matched pair whose content differs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentMismatch {
    pub index: usize,
    pub primary_timetoken: Option<OrderingKey>,
    pub secondary_message_id: Option<String>,
    pub differences: Vec<ContentDifference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Completed {
        metrics: ComparisonMetrics,
        details: ComparisonDetails,
        content_mismatches: Vec<ContentMismatch>,
        ordering_violations: Vec<OrderingViolation>,
    },
    Skipped {
        reason: SkipReason,
    },
}

/// Everything learned about one channel in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub team_id: String,
    pub channel_id: String,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub outcome: ComparisonOutcome,
}

impl ComparisonResult {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ComparisonOutcome::Skipped { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.outcome {
            ComparisonOutcome::Skipped { reason } => Some(reason),
            ComparisonOutcome::Completed { .. } => None,
        }
    }

    pub fn metrics(&self) -> Option<&ComparisonMetrics> {
        match &self.outcome {
            ComparisonOutcome::Completed { metrics, .. } => Some(metrics),
            ComparisonOutcome::Skipped { .. } => None,
        }
    }

    pub fn details(&self) -> Option<&ComparisonDetails> {
        match &self.outcome {
            ComparisonOutcome::Completed { details, .. } => Some(details),
            ComparisonOutcome::Skipped { .. } => None,
        }
    }
}
