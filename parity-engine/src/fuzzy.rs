use tracing::debug;

use crate::hasher::hash_content;
use crate::message::{PrimaryMessage, SecondaryMessage};

pub const DEFAULT_TIME_TOLERANCE_MS: u64 = 5000;

/// What fuzzy matching looks at: a content hash and a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub timestamp_ms: i64,
}

impl Fingerprint {
    pub fn of_primary(message: &PrimaryMessage) -> Option<Self> {
        Some(Fingerprint {
            hash: hash_content(&message.content)?,
            timestamp_ms: message.timestamp_ms?,
        })
    }

    pub fn of_secondary(message: &SecondaryMessage) -> Option<Self> {
        Some(Fingerprint {
            hash: hash_content(&message.content)?,
            timestamp_ms: message.timestamp_ms?,
        })
    }
}

/// Pairs messages that carry no usable identity key by content and time proximity.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    time_tolerance_ms: u64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        FuzzyMatcher::new(DEFAULT_TIME_TOLERANCE_MS)
    }
}

impl FuzzyMatcher {
    pub fn new(time_tolerance_ms: u64) -> Self {
        FuzzyMatcher { time_tolerance_ms }
    }

    pub fn time_tolerance_ms(&self) -> u64 {
        self.time_tolerance_ms
    }

    pub fn set_time_tolerance_ms(&mut self, time_tolerance_ms: u64) {
        self.time_tolerance_ms = time_tolerance_ms;
    }

    /// Hashes must be equal and the timestamps strictly closer than the tolerance.
    pub fn matches(&self, target: &Fingerprint, candidate: &Fingerprint) -> bool {
        target.hash == candidate.hash
            && target.timestamp_ms.abs_diff(candidate.timestamp_ms) < self.time_tolerance_ms
    }

    /// Return the first candidate that matches, in list order. Closer candidates further down the
    /// list do not win over an earlier one.
    pub fn find_match<'p>(
        &self,
        secondary: &SecondaryMessage,
        candidates: &[&'p PrimaryMessage],
    ) -> Option<&'p PrimaryMessage> {
        let target = Fingerprint::of_secondary(secondary)?;

        let found = candidates.iter().copied().find(|candidate| {
            Fingerprint::of_primary(candidate)
                .map(|fingerprint| self.matches(&target, &fingerprint))
                .unwrap_or(false)
        });

        if let Some(primary) = found {
            debug!(
                secondary_id = secondary.id.as_deref().unwrap_or(""),
                timetoken = primary.timetoken.as_ref().map(|t| t.as_str()).unwrap_or(""),
                "fuzzy match found"
            );
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOKEN: &str = "17000000000000000";
    const TOKEN_MS: i64 = 1_700_000_000_000;

    fn primary(content: serde_json::Value) -> PrimaryMessage {
        PrimaryMessage::from_raw(json!({"timetoken": TOKEN, "content": content}))
    }

    fn secondary(content: serde_json::Value, created_at: i64) -> SecondaryMessage {
        SecondaryMessage::from_raw(json!({"content": content, "createdAt": created_at}))
    }

    #[test]
    fn test_no_match_outside_tolerance() {
        let matcher = FuzzyMatcher::default();
        let p = primary(json!({"text": "hi"}));
        let s = secondary(json!({"text": "hi"}), TOKEN_MS + 6000);

        assert_eq!(matcher.find_match(&s, &[&p]), None);
    }

    #[test]
    fn test_match_inside_tolerance() {
        let matcher = FuzzyMatcher::default();
        let p = primary(json!({"text": "hi"}));
        let s = secondary(json!({"text": "hi"}), TOKEN_MS + 4000);

        assert_eq!(matcher.find_match(&s, &[&p]), Some(&p));
    }

    #[test]
    fn test_tolerance_bound_is_exclusive() {
        let matcher = FuzzyMatcher::default();
        let p = primary(json!({"text": "hi"}));
        let s = secondary(json!({"text": "hi"}), TOKEN_MS - 5000);

        assert_eq!(matcher.find_match(&s, &[&p]), None);
    }

    #[test]
    fn test_tolerance_is_adjustable() {
        let mut matcher = FuzzyMatcher::default();
        let p = primary(json!({"text": "hi"}));
        let s = secondary(json!({"text": "hi"}), TOKEN_MS + 6000);

        matcher.set_time_tolerance_ms(10_000);
        assert_eq!(matcher.time_tolerance_ms(), 10_000);
        assert_eq!(matcher.find_match(&s, &[&p]), Some(&p));
    }

    #[test]
    fn test_content_must_hash_equal() {
        let matcher = FuzzyMatcher::default();
        let p = primary(json!({"text": "hi"}));
        let s = secondary(json!({"text": "hello"}), TOKEN_MS);

        assert_eq!(matcher.find_match(&s, &[&p]), None);
    }

    #[test]
    fn test_volatile_fields_do_not_affect_hash() {
        let matcher = FuzzyMatcher::default();
        let p = primary(json!({"text": "hi", "timestamp": 1}));
        let s = secondary(json!({"text": "hi", "metadata": {"delivered": true}}), TOKEN_MS);

        assert_eq!(matcher.find_match(&s, &[&p]), Some(&p));
    }

    #[test]
    fn test_integer_valued_float_matches_integer() {
        let matcher = FuzzyMatcher::default();
        let p = primary(json!({"count": 1}));
        let s = secondary(json!({"count": 1.0}), TOKEN_MS);

        assert_eq!(matcher.find_match(&s, &[&p]), Some(&p));
    }

    #[test]
    fn test_first_candidate_wins() {
        let matcher = FuzzyMatcher::default();
        let far = PrimaryMessage::from_raw(
            json!({"timetoken": "17000000030000000", "content": {"text": "hi"}}),
        );
        let near = primary(json!({"text": "hi"}));
        let s = secondary(json!({"text": "hi"}), TOKEN_MS + 2000);

        let found = matcher.find_match(&s, &[&far, &near]).unwrap();
        assert_eq!(found, &far);
    }

    #[test]
    fn test_messages_without_time_or_content_never_match() {
        let matcher = FuzzyMatcher::default();
        let p = primary(json!({"text": "hi"}));
        let no_time = SecondaryMessage::from_raw(json!({"content": {"text": "hi"}}));
        let no_content = SecondaryMessage::from_raw(json!({"createdAt": TOKEN_MS}));

        assert_eq!(matcher.find_match(&no_time, &[&p]), None);
        assert_eq!(matcher.find_match(&no_content, &[&p]), None);
        assert_eq!(matcher.find_match(&no_time, &[]), None);
    }
}
