//! Raw webhook item → [`CardRecord`]
//!
//! Two input shapes are accepted:
//! - the flattened export (`card_id`, `card_title`, `tags`, `tags_colors`,
//!   `contact_*`, `utm_*`, `responsible_*`)
//! - an already-canonical record (own `id`, no `card_id`), which is read back
//!   field for field, so a serialized [`CardRecord`] re-normalizes to itself
//!
//! The source map is kept on the record for field indexing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aliases;
use crate::field_index::FieldIndex;
use crate::parsers::parse_money;
use crate::tags::{
    is_usable_color, split_tag_names, tag_colors, Tag, TagColorRegistry, DEFAULT_TAG_COLOR,
    DEFAULT_TAG_TEXT_COLOR,
};
use crate::text::{is_truthy, non_empty_text, value_text};
use crate::users::{ResponsibleUser, TeamDirectory, UNASSIGNED_NAME, UNKNOWN_USER_ID};

/// Display name for contacts with neither a name nor a card title
pub const UNTITLED: &str = "Untitled";

/// Contact attached to a card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    pub id: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub origin: Option<String>,
    /// UTM parameters (`source`, `medium`, `campaign`, `term`, `content`,
    /// `referralUrl`); absent parameters are omitted.
    pub utm: Map<String, Value>,
    pub custom_fields: Option<Value>,
}

/// Canonical CRM card
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub id: String,
    pub title: Option<String>,
    /// Primary monetary value as delivered (number or currency string)
    pub monetary_amount: Value,
    pub created_at: Value,
    pub updated_at: Value,
    pub step_id: Option<String>,
    pub step_name: Option<String>,
    pub position: Option<f64>,
    pub tags: Vec<Tag>,
    #[serde(rename = "fullContact")]
    pub contact: Option<Contact>,
    pub responsible_user: Option<ResponsibleUser>,
    pub responsible_user_id: Option<String>,
    #[serde(skip)]
    pub raw: Map<String, Value>,
}

impl CardRecord {
    /// Normalize one payload item. Non-object items yield an empty record.
    pub fn from_value(item: &Value, directory: &TeamDirectory, registry: &TagColorRegistry) -> Self {
        match item {
            Value::Object(map) => Self::from_map(map, directory, registry),
            _ => Self::default(),
        }
    }

    pub fn from_map(
        item: &Map<String, Value>,
        directory: &TeamDirectory,
        registry: &TagColorRegistry,
    ) -> Self {
        let is_canonical = item.get("id").is_some_and(is_truthy)
            && !item.get("card_id").is_some_and(is_truthy);
        if is_canonical {
            canonical_record(item)
        } else {
            flattened_record(item, directory, registry)
        }
    }

    /// Stage id, falling back to nothing when absent.
    pub fn stage_id(&self) -> &str {
        self.step_id.as_deref().unwrap_or("")
    }

    pub fn stage_name(&self) -> &str {
        self.step_name.as_deref().unwrap_or("")
    }

    pub fn responsible_name(&self) -> Option<&str> {
        self.responsible_user.as_ref().map(|u| u.name.as_str())
    }

    /// Deal amount: the primary monetary value, else the first amount-like
    /// field in `index`. Always finite and non-negative.
    pub fn amount(&self, index: &FieldIndex) -> f64 {
        let primary = parse_money(&self.monetary_amount);
        if primary > 0.0 {
            return primary;
        }
        index.lookup(aliases::AMOUNT).map(parse_money).unwrap_or(0.0)
    }

    /// Title for display: card title, else contact name, else [`UNTITLED`].
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.contact.as_ref().and_then(|c| c.name.clone()))
            .unwrap_or_else(|| UNTITLED.to_string())
    }
}

/// First truthy value among `keys`.
fn first_truthy<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| item.get(*k)).find(|v| is_truthy(v))
}

fn text_of(item: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    non_empty_text(first_truthy(item, keys))
}

fn raw_of(item: &Map<String, Value>, keys: &[&str]) -> Value {
    first_truthy(item, keys).cloned().unwrap_or(Value::Null)
}

fn position_of(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|p| p.is_finite())
}

fn canonical_record(item: &Map<String, Value>) -> CardRecord {
    let tags = match item.get("tags") {
        Some(Value::Array(items)) => items.iter().filter_map(canonical_tag).collect(),
        _ => Vec::new(),
    };

    let contact = item
        .get("fullContact")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<Contact>(v.clone()).ok());

    let responsible_user = item
        .get("responsibleUser")
        .filter(|v| v.is_object())
        .map(|v| ResponsibleUser {
            id: v.get("id").map(value_text).unwrap_or_default(),
            name: v.get("name").map(value_text).unwrap_or_default(),
        });

    CardRecord {
        id: item.get("id").map(value_text).unwrap_or_default(),
        title: text_of(item, &["title"]),
        monetary_amount: raw_of(item, &["monetaryAmount", "value"]),
        created_at: raw_of(item, &["createdAt"]),
        updated_at: raw_of(item, &["updatedAt"]),
        step_id: text_of(item, &["stepId", "stageId"]),
        step_name: text_of(item, &["stepName", "stageName"]),
        position: position_of(item.get("position")),
        tags,
        contact,
        responsible_user,
        responsible_user_id: text_of(item, &["responsibleUserId"]),
        raw: item.clone(),
    }
}

fn canonical_tag(value: &Value) -> Option<Tag> {
    match value {
        Value::String(name) if !name.is_empty() => Some(Tag::named(name.clone())),
        Value::Object(obj) => {
            let name = non_empty_text(obj.get("name"))?;
            Some(Tag {
                name,
                text_color: non_empty_text(obj.get("nameColor"))
                    .unwrap_or_else(|| DEFAULT_TAG_TEXT_COLOR.to_string()),
                background_color: non_empty_text(obj.get("bgColor")),
            })
        }
        _ => None,
    }
}

fn flattened_record(
    item: &Map<String, Value>,
    directory: &TeamDirectory,
    registry: &TagColorRegistry,
) -> CardRecord {
    let title = text_of(item, &["card_title"]);

    let mut utm = Map::new();
    for (target, source) in [
        ("source", "utm_source"),
        ("medium", "utm_medium"),
        ("campaign", "utm_campaign"),
        ("term", "utm_term"),
        ("content", "utm_content"),
        ("referralUrl", "ad_referral_url"),
    ] {
        if let Some(value) = item.get(source).filter(|v| !v.is_null()) {
            utm.insert(target.to_string(), value.clone());
        }
    }

    let contact = Contact {
        id: text_of(item, &["contact_id", "card_id"]),
        name: text_of(item, &["contact_name"])
            .or_else(|| title.clone())
            .or_else(|| Some(UNTITLED.to_string())),
        phone_number: text_of(item, &["contact_phone"]),
        email: text_of(item, &["contact_email"]),
        origin: text_of(item, &["lead_origin"]),
        utm,
        custom_fields: None,
    };

    let responsible_id = text_of(item, &["responsible_user_id", "responsibleUserId"]);
    let responsible_name = text_of(
        item,
        &["responsible_user_name", "responsible_name", "responsibleUserName"],
    )
    .or_else(|| {
        responsible_id
            .as_deref()
            .and_then(|id| directory.get(id))
            .map(|entry| entry.name.clone())
    });
    let responsible_user = if responsible_id.is_some() || responsible_name.is_some() {
        Some(ResponsibleUser {
            id: responsible_id
                .clone()
                .unwrap_or_else(|| UNKNOWN_USER_ID.to_string()),
            name: responsible_name.unwrap_or_else(|| UNASSIGNED_NAME.to_string()),
        })
    } else {
        None
    };

    CardRecord {
        id: item.get("card_id").map(value_text).unwrap_or_default(),
        title,
        monetary_amount: raw_of(item, &["monetary_amount", "monetaryAmount"]),
        created_at: raw_of(item, &["created_at", "createdAt"]),
        updated_at: raw_of(item, &["updated_at", "updatedAt"]),
        step_id: text_of(item, &["step_id", "stepId", "stageId"]),
        step_name: text_of(item, &["step_name", "stepName", "stageName"]),
        position: position_of(item.get("step_position").or_else(|| item.get("position"))),
        tags: rebuild_tags(item, registry),
        contact: Some(contact),
        responsible_user,
        responsible_user_id: responsible_id,
        raw: item.clone(),
    }
}

/// Pair tag names with their colors: per-tag color, then registry, then the
/// default accent.
fn rebuild_tags(item: &Map<String, Value>, registry: &TagColorRegistry) -> Vec<Tag> {
    let names = item.get("tags").map(split_tag_names).unwrap_or_default();
    if names.is_empty() {
        return Vec::new();
    }
    let colors = item
        .get("tags_colors")
        .filter(|v| is_truthy(v))
        .map(|v| tag_colors(v, names.len()))
        .unwrap_or_default();

    names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let color = colors
                .get(idx)
                .filter(|c| is_usable_color(c))
                .cloned()
                .or_else(|| registry.color_for(&name).map(str::to_string))
                .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
            Tag {
                name,
                text_color: DEFAULT_TAG_TEXT_COLOR.to_string(),
                background_color: Some(color),
            }
        })
        .collect()
}
