use serde_json::Value;

use crate::error::TargetFileError;

/// Teams and channels named by a caller, from a request body or an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    pub team_ids: Option<Vec<String>>,
    pub channel_ids: Option<Vec<String>>,
}

/// Read a targets file.
///
/// A bare JSON array lists team ids. An object may carry `teamIds` and `channelIds` arrays.
/// Entries that are not strings are dropped.
pub fn parse_targets(bytes: &[u8]) -> Result<Targets, TargetFileError> {
    let content = String::from_utf8_lossy(bytes);
    let content = content.trim();
    if content.is_empty() {
        return Err(TargetFileError::Empty);
    }

    match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => Ok(Targets {
            team_ids: Some(strings(&items)),
            channel_ids: None,
        }),
        Value::Object(map) => Ok(Targets {
            team_ids: map.get("teamIds").and_then(Value::as_array).map(|a| strings(a)),
            channel_ids: map
                .get("channelIds")
                .and_then(Value::as_array)
                .map(|a| strings(a)),
        }),
        _ => Err(TargetFileError::UnexpectedShape),
    }
}

pub async fn read_targets_file(path: &str) -> Result<Targets, TargetFileError> {
    let bytes = tokio::fs::read(path).await?;
    parse_targets(&bytes)
}

fn strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect()
}
