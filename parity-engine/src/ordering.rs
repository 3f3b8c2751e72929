use std::cmp::Ordering;

use serde::{Serialize, Serializer};

use crate::matcher::MatchedPair;
use crate::message::OrderingKey;

/// Two adjacent matched pairs whose relative order disagrees between the systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderingViolation {
    /// Position of the later pair in the matched list.
    pub index: usize,
    pub prev_primary_key: OrderingKey,
    pub curr_primary_key: OrderingKey,
    pub prev_secondary_key: OrderingKey,
    pub curr_secondary_key: OrderingKey,
    #[serde(serialize_with = "serialize_sign")]
    pub primary_order: Ordering,
    #[serde(serialize_with = "serialize_sign")]
    pub secondary_order: Ordering,
}

fn serialize_sign<S: Serializer>(order: &Ordering, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i8(*order as i8)
}

/// Checks that adjacent matched pairs are ordered the same way on both sides.
///
/// Only neighbours are compared, so a message moved several positions away is not guaranteed to
/// be reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderingValidator;

impl OrderingValidator {
    pub fn new() -> Self {
        OrderingValidator
    }

    pub fn validate(&self, pairs: &[MatchedPair]) -> Vec<OrderingViolation> {
        pairs
            .windows(2)
            .enumerate()
            .filter_map(|(i, window)| check(i + 1, &window[0], &window[1]))
            .collect()
    }
}

fn check(index: usize, prev: &MatchedPair, curr: &MatchedPair) -> Option<OrderingViolation> {
    let prev_primary = prev.primary.timetoken.as_ref()?;
    let curr_primary = curr.primary.timetoken.as_ref()?;
    let prev_secondary = prev.secondary.offset.as_ref()?;
    let curr_secondary = curr.secondary.offset.as_ref()?;

    let primary_order = prev_primary.cmp(curr_primary);
    let secondary_order = prev_secondary.cmp(curr_secondary);

    if primary_order == secondary_order
        || primary_order == Ordering::Equal
        || secondary_order == Ordering::Equal
    {
        return None;
    }

    Some(OrderingViolation {
        index,
        prev_primary_key: prev_primary.clone(),
        curr_primary_key: curr_primary.clone(),
        prev_secondary_key: prev_secondary.clone(),
        curr_secondary_key: curr_secondary.clone(),
        primary_order,
        secondary_order,
    })
}
