//! Canonical records for messages reported by either system.
//!
//! Both systems hand us loosely shaped JSON, and over time several shapes have been in
//! circulation (identifiers nested under `message` or sitting at the top level, content under
//! `message` or `content`, and so on). Every raw payload goes through [`PrimaryMessage::from_raw`]
//! or [`SecondaryMessage::from_raw`] exactly once, and the rest of the engine only ever reads the
//! extracted fields. Extraction never fails: anything we cannot find is left empty.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Realtime timetokens count 100ns ticks since the epoch.
const TICKS_PER_MILLISECOND: u32 = 10_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrderingKeyError {
    #[error("ordering key is empty")]
    Empty,
    #[error("ordering key is not a non-negative integer: {0}")]
    NotAnInteger(String),
}

/// A per-system sequence identifier.
///
/// Realtime timetokens are 17 digit integers, well past what an `f64` can hold exactly, so keys
/// are kept as arbitrary precision integers and compared numerically. The original decimal text
/// is kept around for reporting.
#[derive(Debug, Clone, Eq)]
pub struct OrderingKey {
    text: String,
    value: BigUint,
}

impl OrderingKey {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Read a key from a JSON string or integer. Floats and negative numbers are not keys.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().map(OrderingKey::from),
            _ => None,
        }
    }

    /// Milliseconds since the epoch, reading the key as a count of 100ns ticks.
    pub fn tick_millis(&self) -> Option<i64> {
        let millis = self.value.clone() / TICKS_PER_MILLISECOND;
        i64::try_from(&millis).ok()
    }
}

impl FromStr for OrderingKey {
    type Err = OrderingKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(OrderingKeyError::Empty);
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderingKeyError::NotAnInteger(trimmed.to_owned()));
        }

        let value = BigUint::from_str(trimmed)
            .map_err(|_| OrderingKeyError::NotAnInteger(trimmed.to_owned()))?;

        Ok(OrderingKey {
            text: trimmed.to_owned(),
            value,
        })
    }
}

impl From<u64> for OrderingKey {
    fn from(value: u64) -> Self {
        OrderingKey {
            text: value.to_string(),
            value: BigUint::from(value),
        }
    }
}

impl PartialEq for OrderingKey {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for OrderingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for OrderingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// A message as reported by the realtime transport, the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimaryMessage {
    pub timetoken: Option<OrderingKey>,
    pub content: Value,
    pub timestamp_ms: Option<i64>,
    #[serde(skip)]
    pub raw: Value,
}

impl PrimaryMessage {
    pub fn from_raw(raw: Value) -> Self {
        let timetoken = present(&raw, "timetoken").and_then(OrderingKey::from_json);
        let content = present(&raw, "message")
            .or_else(|| present(&raw, "content"))
            .cloned()
            .unwrap_or_else(|| raw.clone());
        let timestamp_ms = timetoken
            .as_ref()
            .and_then(OrderingKey::tick_millis)
            .or_else(|| present(&raw, "createdAt").and_then(millis_from_json));

        PrimaryMessage {
            timetoken,
            content,
            timestamp_ms,
            raw,
        }
    }
}

/// A message as stored by the chat service whose fidelity is being checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryMessage {
    /// Cross-system identity: the realtime timetoken this message was published under.
    pub id: Option<String>,
    pub offset: Option<OrderingKey>,
    pub timestamp_ms: Option<i64>,
    /// Message content with the delivery `metadata` the chat service attaches removed.
    pub content: Value,
    #[serde(skip)]
    pub raw: Value,
}

impl SecondaryMessage {
    pub fn from_raw(raw: Value) -> Self {
        let id = nested_or_top(&raw, "id").and_then(identifier_from_json);
        let offset = nested_or_top(&raw, "offset").and_then(OrderingKey::from_json);
        let timestamp_ms = nested_or_top(&raw, "createdAt").and_then(millis_from_json);
        let content = nested_or_top(&raw, "content")
            .map(strip_metadata)
            .unwrap_or(Value::Null);

        SecondaryMessage {
            id,
            offset,
            timestamp_ms,
            content,
            raw,
        }
    }
}

/// Look up a non-null field on an object. Anything that isn't an object has no fields.
fn present<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    value.get(field).filter(|v| !v.is_null())
}

/// Chat payloads may wrap everything in a `message` object; the nested field wins.
fn nested_or_top<'a>(raw: &'a Value, field: &str) -> Option<&'a Value> {
    present(raw, "message")
        .and_then(|message| present(message, field))
        .or_else(|| present(raw, field))
}

fn identifier_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn millis_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(millis) = s.parse::<i64>() {
                return Some(millis);
            }
            if let Ok(millis) = s.parse::<f64>() {
                return Some(millis.round() as i64);
            }
            OffsetDateTime::parse(s, &Rfc3339)
                .ok()
                .and_then(|dt| i64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok())
        }
        _ => None,
    }
}

fn strip_metadata(content: &Value) -> Value {
    match content {
        Value::Object(map) if map.contains_key("metadata") => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "metadata")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}
