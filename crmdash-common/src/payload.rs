//! Webhook payload shapes
//!
//! The automation layer in front of the CRM has delivered three envelopes
//! over time:
//! - a bare array of records
//! - `{ "data": [...], "steps": [...], "tags": [...] }`
//! - `{ "json": { "data": [...] } }` or `{ "json": [...] }`
//!
//! Anything else yields an empty payload.

use serde_json::{Map, Value};
use tracing::debug;

use crate::tags::TagDefinition;
use crate::text::{non_empty_text, value_text};
use crate::Result;

/// Pipeline step declared by the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStep {
    pub id: String,
    /// `title`, else `name`
    pub label: Option<String>,
}

/// Records, declared steps and tag definitions extracted from one response
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub cards: Vec<Map<String, Value>>,
    pub steps: Vec<RawStep>,
    pub tags: Vec<TagDefinition>,
}

impl Payload {
    /// Parse a response body.
    pub fn parse(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        let payload = match value {
            Value::Array(items) => Self {
                cards: objects(items),
                ..Self::default()
            },
            Value::Object(mut root) => match root.remove("data") {
                Some(Value::Array(items)) => Self {
                    cards: objects(items),
                    steps: root.get("steps").map(steps).unwrap_or_default(),
                    tags: root.get("tags").map(tag_definitions).unwrap_or_default(),
                },
                _ => match root.remove("json") {
                    Some(Value::Object(mut inner)) => match inner.remove("data") {
                        Some(Value::Array(items)) => Self {
                            cards: objects(items),
                            ..Self::default()
                        },
                        _ => Self::default(),
                    },
                    Some(Value::Array(items)) => Self {
                        cards: objects(items),
                        ..Self::default()
                    },
                    _ => Self::default(),
                },
            },
            _ => Self::default(),
        };

        debug!(
            cards = payload.cards.len(),
            steps = payload.steps.len(),
            tags = payload.tags.len(),
            "Payload unpacked"
        );
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn objects(items: Vec<Value>) -> Vec<Map<String, Value>> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

fn steps(value: &Value) -> Vec<RawStep> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| RawStep {
            id: item.get("id").map(value_text).unwrap_or_default(),
            label: non_empty_text(item.get("title")).or_else(|| non_empty_text(item.get("name"))),
        })
        .collect()
}

/// Tag definitions; malformed entries are skipped.
fn tag_definitions(value: &Value) -> Vec<TagDefinition> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array() {
        let payload = Payload::from_value(json!([{"card_id": 1}, "noise", {"card_id": 2}]));
        assert_eq!(payload.cards.len(), 2);
        assert!(payload.steps.is_empty());
    }

    #[test]
    fn test_data_envelope_with_steps_and_tags() {
        let payload = Payload::from_value(json!({
            "data": [{"card_id": 1}],
            "steps": [{"id": 10, "title": "Base de Leads"}, {"id": "s2", "name": "Follow-up"}, {"id": "s3"}],
            "tags": [{"id": 1, "name": "Criminal", "bgColor": "#f00"}, {"name": 5}]
        }));
        assert_eq!(payload.cards.len(), 1);
        assert_eq!(
            payload.steps,
            vec![
                RawStep { id: "10".into(), label: Some("Base de Leads".into()) },
                RawStep { id: "s2".into(), label: Some("Follow-up".into()) },
                RawStep { id: "s3".into(), label: None },
            ]
        );
        assert_eq!(payload.tags.len(), 1);
        assert_eq!(payload.tags[0].bg_color.as_deref(), Some("#f00"));
    }

    #[test]
    fn test_json_envelopes() {
        assert_eq!(Payload::from_value(json!({"json": {"data": [{"a": 1}]}})).cards.len(), 1);
        assert_eq!(Payload::from_value(json!({"json": [{"a": 1}, {"b": 2}]})).cards.len(), 2);
    }

    #[test]
    fn test_unknown_shapes_are_empty() {
        assert!(Payload::from_value(json!({"items": [{"a": 1}]})).is_empty());
        assert!(Payload::from_value(json!("text")).is_empty());
        assert!(Payload::from_value(json!({"data": "nope"})).is_empty());
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(Payload::parse("<html>").is_err());
        assert_eq!(Payload::parse("[]").unwrap().cards.len(), 0);
    }
}
