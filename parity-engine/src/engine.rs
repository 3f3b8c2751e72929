use std::sync::Arc;

use tracing::{info, warn};

use crate::calculator::MetricsCalculator;
use crate::comparator::ContentComparator;
use crate::fuzzy::FuzzyMatcher;
use crate::matcher::{MatchedPair, MessageMatcher};
use crate::message::{PrimaryMessage, SecondaryMessage};
use crate::ordering::OrderingValidator;
use crate::result::{
    ComparisonDetails, ComparisonOutcome, ComparisonResult, ContentMismatch, FetchResult,
    SkipReason,
};
use crate::time::{SystemTime, TimeSource};

pub const MAX_SAMPLES: usize = 10;
pub const MAX_DIFFERENCES_PER_SAMPLE: usize = 5;

/// Runs the whole comparison for one channel. Holds no per-channel state, so a single engine can
/// be shared across concurrent channel comparisons.
#[derive(Clone)]
pub struct ComparisonEngine {
    matcher: MessageMatcher,
    comparator: ContentComparator,
    validator: OrderingValidator,
    calculator: MetricsCalculator,
    timesource: Arc<dyn TimeSource + Send + Sync>,
}

impl Default for ComparisonEngine {
    fn default() -> Self {
        ComparisonEngine::new(FuzzyMatcher::default())
    }
}

impl ComparisonEngine {
    pub fn new(fuzzy: FuzzyMatcher) -> Self {
        ComparisonEngine::with_time_source(fuzzy, SystemTime {})
    }

    pub fn with_time_source<TZ>(fuzzy: FuzzyMatcher, timesource: TZ) -> Self
    where
        TZ: TimeSource + Send + Sync + 'static,
    {
        ComparisonEngine {
            matcher: MessageMatcher::new(fuzzy),
            comparator: ContentComparator::new(),
            validator: OrderingValidator::new(),
            calculator: MetricsCalculator::new(),
            timesource: Arc::new(timesource),
        }
    }

    pub fn set_fuzzy_time_tolerance_ms(&mut self, tolerance_ms: u64) {
        self.matcher.fuzzy_mut().set_time_tolerance_ms(tolerance_ms);
    }

    pub fn compare(&self, fetch: FetchResult) -> ComparisonResult {
        let FetchResult {
            team_id,
            channel_id,
            primary_messages,
            secondary_messages,
            primary_success,
            secondary_success,
        } = fetch;

        info!(
            team_id = %team_id,
            channel_id = %channel_id,
            realtime_count = primary_messages.len(),
            chat_count = secondary_messages.len(),
            "starting comparison"
        );

        if let Some(reason) = SkipReason::from_fetch(primary_success, secondary_success) {
            warn!(
                team_id = %team_id,
                channel_id = %channel_id,
                realtime_success = primary_success,
                chat_success = secondary_success,
                "skipping comparison due to fetch failures"
            );
            return ComparisonResult {
                team_id,
                channel_id,
                timestamp: self.timesource.current_millis(),
                outcome: ComparisonOutcome::Skipped { reason },
            };
        }

        let primary_total = primary_messages.len();
        let secondary_total = secondary_messages.len();
        let primary: Vec<_> = primary_messages
            .into_iter()
            .map(PrimaryMessage::from_raw)
            .collect();
        let secondary: Vec<_> = secondary_messages
            .into_iter()
            .map(SecondaryMessage::from_raw)
            .collect();

        let matches = self.matcher.match_messages(primary, secondary);
        let mismatches = self.content_mismatches(&matches.matched);
        let violations = self.validator.validate(&matches.matched);

        let mut metrics = self.calculator.calculate_metrics(
            &matches.matched,
            matches.primary_only.len(),
            matches.secondary_only.len(),
            mismatches.len(),
            primary_total,
            secondary_total,
        );
        metrics.ordering_violations = violations.len();

        let details = ComparisonDetails {
            total_primary_messages: primary_total,
            total_secondary_messages: secondary_total,
            matched_count: matches.matched.len(),
            content_mismatch_count: mismatches.len(),
            ordering_violation_count: violations.len(),
        };

        info!(
            team_id = %team_id,
            channel_id = %channel_id,
            coverage = metrics.coverage,
            content_mismatch_rate = metrics.content_mismatch_rate,
            ordering_violations = metrics.ordering_violations,
            matched = details.matched_count,
            "comparison completed"
        );

        ComparisonResult {
            team_id,
            channel_id,
            timestamp: self.timesource.current_millis(),
            outcome: ComparisonOutcome::Completed {
                metrics,
                details,
                content_mismatches: mismatches.into_iter().take(MAX_SAMPLES).collect(),
                ordering_violations: violations.into_iter().take(MAX_SAMPLES).collect(),
            },
        }
    }

    fn content_mismatches(&self, matched: &[MatchedPair]) -> Vec<ContentMismatch> {
        matched
            .iter()
            .enumerate()
            .filter_map(|(index, pair)| {
                let comparison = self.comparator.compare(&pair.primary, &pair.secondary);
                if comparison.equal {
                    return None;
                }

                let mut differences = comparison.differences;
                differences.truncate(MAX_DIFFERENCES_PER_SAMPLE);

                Some(ContentMismatch {
                    index,
                    primary_timetoken: pair.primary.timetoken.clone(),
                    secondary_message_id: pair.secondary.id.clone(),
                    differences,
                })
            })
            .collect()
    }
}
