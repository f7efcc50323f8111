//! Text normalization shared by the field index and the resolvers
//!
//! CRM exports mix accented Portuguese labels, snake_case keys and
//! dash-separated slugs for the same field. Everything that compares labels
//! goes through [`normalize_key`] so that `"Data da Reunião"`,
//! `"data da reuniao"` and `" DATA DA REUNIAO "` all meet on the same key.

use serde_json::Value;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lower-case, trim and strip diacritics (NFD decomposition minus combining marks).
pub fn normalize_key(raw: &str) -> String {
    raw.to_lowercase()
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Collapse `-`, `_` and `.` to spaces.
///
/// Applied on top of [`normalize_key`] to get the punctuation-insensitive
/// variant of a key.
pub fn fold_punctuation(normalized: &str) -> String {
    normalized
        .chars()
        .map(|c| match c {
            '-' | '_' | '.' => ' ',
            other => other,
        })
        .collect()
}

/// Length in characters (not bytes).
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Loose truthiness of a raw value.
///
/// `null`, `false`, `0`, and `""` are falsy; arrays and objects are truthy
/// even when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a raw value as display text.
///
/// Strings are returned verbatim, numbers in their shortest form, arrays
/// joined with commas (null members render empty) and objects as an opaque
/// marker.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    n.as_f64().map(|f| f.to_string()).unwrap_or_default()
}

/// Truthy string content of a value, if any.
///
/// Used for optional display fields where the export may send numbers or
/// empty strings in place of a missing value.
pub fn non_empty_text(value: Option<&Value>) -> Option<String> {
    value.filter(|v| is_truthy(v)).map(value_text)
}
