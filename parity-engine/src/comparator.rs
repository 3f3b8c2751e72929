use serde::Serialize;
use serde_json::{Number, Value};

use crate::message::{PrimaryMessage, SecondaryMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    TypeMismatch,
    ValueMismatch,
    MissingInPrimary,
    MissingInSecondary,
}

/// One divergent field between the two sides of a matched pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentDifference {
    /// Dotted path from the content root, empty for the root itself. Array elements use their
    /// index as the path segment.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: DifferenceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentComparison {
    pub equal: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub differences: Vec<ContentDifference>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentComparator;

impl ContentComparator {
    pub fn new() -> Self {
        ContentComparator
    }

    pub fn compare(&self, primary: &PrimaryMessage, secondary: &SecondaryMessage) -> ContentComparison {
        self.compare_content(&primary.content, &secondary.content)
    }

    /// Compare two already extracted content values.
    ///
    /// When exactly one side is null the contents are unequal, but there is nothing to walk so
    /// no differences are reported.
    pub fn compare_content(&self, primary: &Value, secondary: &Value) -> ContentComparison {
        if primary == secondary {
            return ContentComparison {
                equal: true,
                differences: Vec::new(),
            };
        }

        if primary.is_null() || secondary.is_null() {
            return ContentComparison::default();
        }

        let mut differences = Vec::new();
        diff(String::new(), primary, secondary, &mut differences);
        ContentComparison {
            equal: differences.is_empty(),
            differences,
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_owned()
    } else {
        format!("{}.{}", path, segment)
    }
}

/// `1` and `1.0` are the same number no matter how either side serialized it.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    a.as_f64() == b.as_f64()
}

fn diff(path: String, primary: &Value, secondary: &Value, out: &mut Vec<ContentDifference>) {
    let (primary_kind, secondary_kind) = (kind_name(primary), kind_name(secondary));
    if primary_kind != secondary_kind {
        out.push(ContentDifference {
            path,
            kind: DifferenceKind::TypeMismatch,
            primary: Some(Value::from(primary_kind)),
            secondary: Some(Value::from(secondary_kind)),
        });
        return;
    }

    match (primary, secondary) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, value) in left {
                let path = child_path(&path, key);
                match right.get(key) {
                    Some(other) => diff(path, value, other, out),
                    None => out.push(ContentDifference {
                        path,
                        kind: DifferenceKind::MissingInSecondary,
                        primary: Some(value.clone()),
                        secondary: None,
                    }),
                }
            }
            for (key, value) in right.iter().filter(|(key, _)| !left.contains_key(*key)) {
                out.push(ContentDifference {
                    path: child_path(&path, key),
                    kind: DifferenceKind::MissingInPrimary,
                    primary: None,
                    secondary: Some(value.clone()),
                });
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            for index in 0..left.len().max(right.len()) {
                let path = child_path(&path, &index.to_string());
                match (left.get(index), right.get(index)) {
                    (Some(a), Some(b)) => diff(path, a, b, out),
                    (Some(a), None) => out.push(ContentDifference {
                        path,
                        kind: DifferenceKind::MissingInSecondary,
                        primary: Some(a.clone()),
                        secondary: None,
                    }),
                    (None, Some(b)) => out.push(ContentDifference {
                        path,
                        kind: DifferenceKind::MissingInPrimary,
                        primary: None,
                        secondary: Some(b.clone()),
                    }),
                    (None, None) => {}
                }
            }
        }
        (Value::Number(a), Value::Number(b)) => {
            if !numbers_equal(a, b) {
                out.push(ContentDifference {
                    path,
                    kind: DifferenceKind::ValueMismatch,
                    primary: Some(Value::Number(a.clone())),
                    secondary: Some(Value::Number(b.clone())),
                });
            }
        }
        (a, b) if a != b => out.push(ContentDifference {
            path,
            kind: DifferenceKind::ValueMismatch,
            primary: Some(a.clone()),
            secondary: Some(b.clone()),
        }),
        _ => {}
    }
}
