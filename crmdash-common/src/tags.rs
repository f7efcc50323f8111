//! Card tags and the tag-color registry
//!
//! Tags arrive either as arrays or as one comma-separated string, with a
//! parallel `tags_colors` list that may itself be a string such as
//! `"rgb(1,2,3),#ffffff"`. The registry maps tag names to the colors declared
//! in the payload's tag definitions; it is an explicit value owned by the
//! caller and passed into every normalization/aggregation call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::text::{is_truthy, normalize_key, value_text};

/// Accent color used when neither the card nor the registry has one.
pub const DEFAULT_TAG_COLOR: &str = "#C59D5F";

/// Tag text color assigned to reconstructed tags.
pub const DEFAULT_TAG_TEXT_COLOR: &str = "#fff";

/// One tag attached to a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(rename = "nameColor")]
    pub text_color: String,
    #[serde(rename = "bgColor")]
    pub background_color: Option<String>,
}

impl Tag {
    /// Tag known only by name (no color information).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text_color: DEFAULT_TAG_TEXT_COLOR.to_string(),
            background_color: None,
        }
    }
}

/// Tag definition as declared in a payload's `tags` list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDefinition {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_color: Option<String>,
    #[serde(default)]
    pub bg_color: Option<String>,
}

/// Normalized tag name → background color
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagColorRegistry {
    colors: BTreeMap<String, String>,
}

impl TagColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge payload tag definitions; later definitions overwrite earlier ones.
    pub fn absorb(&mut self, definitions: &[TagDefinition]) {
        for def in definitions {
            let (Some(name), Some(color)) = (&def.name, &def.bg_color) else {
                continue;
            };
            if name.is_empty() || color.is_empty() {
                continue;
            }
            self.colors.insert(normalize_key(name), color.clone());
        }
    }

    /// Register a single color by tag name.
    pub fn insert(&mut self, name: &str, color: &str) {
        self.colors.insert(normalize_key(name), color.to_string());
    }

    /// Color registered for `name` (compared normalized).
    pub fn color_for(&self, name: &str) -> Option<&str> {
        self.colors.get(&normalize_key(name)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Tag names from an array (strings or `{name}` objects) or a
/// comma-separated string. Empty names are dropped.
pub fn split_tag_names(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("name").filter(|v| is_truthy(v)).map(value_text),
                _ => None,
            })
            .filter(|name| !name.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Per-tag colors from an array or a color string.
pub fn tag_colors(value: &Value, tag_count: usize) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        Value::String(s) => split_tag_colors(s, tag_count),
        _ => Vec::new(),
    }
}

/// Split a color string into one color per tag.
///
/// With at most one tag the whole string is that tag's color. Otherwise the
/// string is split on commas that are not inside parentheses, so `rgb(a,b,c)`
/// values survive intact.
///
/// # Examples
///
/// ```
/// use crmdash_common::tags::split_tag_colors;
///
/// assert_eq!(split_tag_colors("rgb(1,2,3)", 1), vec!["rgb(1,2,3)"]);
/// assert_eq!(
///     split_tag_colors("rgb(1,2,3),#ffffff", 2),
///     vec!["rgb(1,2,3)", "#ffffff"]
/// );
/// ```
pub fn split_tag_colors(raw: &str, tag_count: usize) -> Vec<String> {
    let raw = raw.trim();
    if tag_count <= 1 {
        return vec![raw.to_string()];
    }

    let mut parts = Vec::new();
    let mut start = 0;
    for (pos, c) in raw.char_indices() {
        if c == ',' && !closes_before_opening(&raw[pos + 1..]) {
            parts.push(raw[start..pos].trim().to_string());
            start = pos + 1;
        }
    }
    parts.push(raw[start..].trim().to_string());
    parts
}

/// True when the next parenthesis in `rest` is a closing one.
fn closes_before_opening(rest: &str) -> bool {
    rest.chars()
        .find(|c| *c == '(' || *c == ')')
        .is_some_and(|c| c == ')')
}

/// A per-tag color is usable when it is more than one character and not a
/// stringified null.
pub fn is_usable_color(color: &str) -> bool {
    color.chars().count() > 1 && color != "null" && color != "undefined"
}
