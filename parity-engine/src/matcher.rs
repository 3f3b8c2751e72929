use serde::Serialize;

use crate::fuzzy::{Fingerprint, FuzzyMatcher};
use crate::message::{OrderingKey, PrimaryMessage, SecondaryMessage};

/// One message confirmed equivalent across both systems.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub primary: PrimaryMessage,
    pub secondary: SecondaryMessage,
}

/// Partition of both message lists.
///
/// `matched` follows the order of the secondary list, which is also the order the ordering
/// validator walks. `primary_only` keeps the primary list's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub matched: Vec<MatchedPair>,
    pub primary_only: Vec<PrimaryMessage>,
    pub secondary_only: Vec<SecondaryMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageMatcher {
    fuzzy: FuzzyMatcher,
}

impl MessageMatcher {
    pub fn new(fuzzy: FuzzyMatcher) -> Self {
        MessageMatcher { fuzzy }
    }

    pub fn fuzzy(&self) -> &FuzzyMatcher {
        &self.fuzzy
    }

    pub fn fuzzy_mut(&mut self) -> &mut FuzzyMatcher {
        &mut self.fuzzy
    }

    pub fn match_messages(
        &self,
        primary: Vec<PrimaryMessage>,
        secondary: Vec<SecondaryMessage>,
    ) -> MatchResult {
        let mut claimed = vec![false; primary.len()];
        let fingerprints: Vec<Option<Fingerprint>> =
            primary.iter().map(Fingerprint::of_primary).collect();

        let mut pairs: Vec<(usize, SecondaryMessage)> = Vec::new();
        let mut secondary_only = Vec::new();

        for message in secondary {
            let found = self
                .exact_match(&message, &primary, &claimed)
                .or_else(|| self.fuzzy_match(&message, &fingerprints, &claimed));

            match found {
                Some(index) => {
                    claimed[index] = true;
                    pairs.push((index, message));
                }
                None => secondary_only.push(message),
            }
        }

        let mut slots: Vec<Option<PrimaryMessage>> = primary.into_iter().map(Some).collect();
        let matched = pairs
            .into_iter()
            .filter_map(|(index, secondary)| {
                slots[index]
                    .take()
                    .map(|primary| MatchedPair { primary, secondary })
            })
            .collect();

        MatchResult {
            matched,
            primary_only: slots.into_iter().flatten().collect(),
            secondary_only,
        }
    }

    /// The secondary identity key names the primary timetoken it was published under.
    fn exact_match(
        &self,
        message: &SecondaryMessage,
        primary: &[PrimaryMessage],
        claimed: &[bool],
    ) -> Option<usize> {
        let key: OrderingKey = message.id.as_deref()?.parse().ok()?;

        primary
            .iter()
            .enumerate()
            .find(|(index, candidate)| !claimed[*index] && candidate.timetoken.as_ref() == Some(&key))
            .map(|(index, _)| index)
    }

    fn fuzzy_match(
        &self,
        message: &SecondaryMessage,
        fingerprints: &[Option<Fingerprint>],
        claimed: &[bool],
    ) -> Option<usize> {
        let target = Fingerprint::of_secondary(message)?;

        fingerprints
            .iter()
            .enumerate()
            .find(|(index, fingerprint)| {
                !claimed[*index]
                    && fingerprint
                        .as_ref()
                        .map(|fingerprint| self.fuzzy.matches(&target, fingerprint))
                        .unwrap_or(false)
            })
            .map(|(index, _)| index)
    }
}
