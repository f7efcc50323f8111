//! Normalized field index over one raw card
//!
//! Flattened exports put the same business field under many spellings
//! (`valor_da_entrada`, `Valor da Entrada`, `-valor-da-entrada`) and at
//! different depths (root, `customFields` as array or map, contact custom
//! fields, contact UTM map). [`FieldIndex`] flattens all of them into one
//! insertion-ordered map keyed by normalized name so that every lookup in the
//! aggregator goes through a single, ordered resolution contract.
//!
//! # Lookup contract
//!
//! For each alias, in the order given:
//! 1. exact hit on the normalized alias
//! 2. exact hit on the punctuation-folded alias
//! 3. if the alias is longer than 3 characters, the first key (insertion
//!    order) containing the punctuation-folded alias
//!
//! The index is rebuilt for every card and never cached.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::normalizer::{CardRecord, Contact};
use crate::text::{char_len, fold_punctuation, is_truthy, normalize_key, value_text};

/// Minimum alias length (exclusive) for substring matching.
const FUZZY_MIN_ALIAS_LEN: usize = 3;

/// Normalized key → raw value map for one card
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    entries: IndexMap<String, Value>,
}

impl FieldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index for a normalized card (its source map plus contact).
    pub fn for_card(card: &CardRecord) -> Self {
        Self::from_parts(&card.raw, card.contact.as_ref())
    }

    /// Build the index from a root map and an optional contact.
    pub fn from_parts(root: &Map<String, Value>, contact: Option<&Contact>) -> Self {
        let mut index = Self::new();

        for (key, value) in root {
            if !matches!(value, Value::Object(_) | Value::Array(_)) {
                index.insert(key, value);
            }
        }

        if let Some(fields) = root.get("customFields") {
            index.register_custom_fields(fields);
        }

        if let Some(contact) = contact {
            if let Some(fields) = &contact.custom_fields {
                index.register_custom_fields(fields);
            }
            for (key, value) in &contact.utm {
                index.insert(&format!("utm_{}", key), value);
            }
        }

        index
    }

    /// Register `key` under its normalized form and, when different, its
    /// punctuation-folded form. Empty keys and null values are ignored.
    pub fn insert(&mut self, key: &str, value: &Value) {
        if key.is_empty() || value.is_null() {
            return;
        }
        let normalized = normalize_key(key);
        let folded = fold_punctuation(&normalized);
        if folded != normalized {
            self.entries.insert(normalized, value.clone());
            self.entries.insert(folded, value.clone());
        } else {
            self.entries.insert(normalized, value.clone());
        }
    }

    /// Flatten a custom-field collection.
    ///
    /// Accepts an array of `{name|key|id, value|text}` entries or a direct
    /// key → value map. Nested objects inside a map are skipped; arrays are
    /// kept as leaves.
    pub fn register_custom_fields(&mut self, fields: &Value) {
        match fields {
            Value::Array(items) => {
                for item in items {
                    let key = ["name", "key", "id"]
                        .iter()
                        .filter_map(|k| item.get(k))
                        .find(|v| is_truthy(v))
                        .map(value_text)
                        .unwrap_or_default();
                    let value = item
                        .get("value")
                        .filter(|v| is_truthy(v))
                        .or_else(|| item.get("text"));
                    if let Some(value) = value {
                        self.insert(&key, value);
                    }
                }
            }
            Value::Object(map) => {
                for (key, value) in map {
                    if !value.is_object() {
                        self.insert(key, value);
                    }
                }
            }
            _ => {}
        }
    }

    /// Resolve the first alias that hits, following the lookup contract.
    pub fn lookup(&self, aliases: &[&str]) -> Option<&Value> {
        for alias in aliases {
            let normalized = normalize_key(alias);
            if let Some(value) = self.entries.get(&normalized) {
                return Some(value);
            }

            let folded = fold_punctuation(&normalized);
            if let Some(value) = self.entries.get(&folded) {
                return Some(value);
            }

            if char_len(alias) > FUZZY_MIN_ALIAS_LEN {
                if let Some(value) = self.find_containing(&folded) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Exact lookup on an already-normalized key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// First value (insertion order) whose key contains `fragment`.
    pub fn find_containing(&self, fragment: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key.contains(fragment))
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn test_root_scalars_registered_with_folded_variant() {
        let index = FieldIndex::from_parts(
            &root(json!({
                "Valor_da_Entrada": "R$ 500,00",
                "nested": {"x": 1},
                "list": [1, 2],
                "empty": null
            })),
            None,
        );

        assert_eq!(index.get("valor_da_entrada"), Some(&json!("R$ 500,00")));
        assert_eq!(index.get("valor da entrada"), Some(&json!("R$ 500,00")));
        assert!(index.get("nested").is_none());
        assert!(index.get("list").is_none());
        assert!(index.get("empty").is_none());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_custom_fields_array_and_map() {
        let index = FieldIndex::from_parts(
            &root(json!({
                "customFields": [
                    {"id": "f1", "name": "Data da Reunião", "value": "2024-03-10"},
                    {"id": "f2", "value": 0, "text": "fallback"},
                    {"key": "Sinal", "value": ["R$ 100"]},
                    {"id": "f3", "value": 0}
                ]
            })),
            None,
        );
        assert_eq!(index.get("data da reuniao"), Some(&json!("2024-03-10")));
        assert_eq!(index.get("f2"), Some(&json!("fallback")));
        assert_eq!(index.get("sinal"), Some(&json!(["R$ 100"])));
        assert!(index.get("f3").is_none());

        let index = FieldIndex::from_parts(
            &root(json!({
                "customFields": {"Honorários": "3.000,00", "skip": {"deep": true}, "tags": ["a"]}
            })),
            None,
        );
        assert_eq!(index.get("honorarios"), Some(&json!("3.000,00")));
        assert!(index.get("skip").is_none());
        assert_eq!(index.get("tags"), Some(&json!(["a"])));
    }

    #[test]
    fn test_contact_custom_fields_and_utm() {
        let mut contact = Contact::default();
        contact.custom_fields = Some(json!({"Origem do Lead": "Instagram"}));
        contact.utm.insert("source".into(), json!("google"));
        contact.utm.insert("campaign".into(), json!("Search Institucional"));

        let index = FieldIndex::from_parts(&Map::new(), Some(&contact));
        assert_eq!(index.get("origem do lead"), Some(&json!("Instagram")));
        assert_eq!(index.get("utm_source"), Some(&json!("google")));
        assert_eq!(index.get("utm source"), Some(&json!("google")));
        assert_eq!(index.get("utm campaign"), Some(&json!("Search Institucional")));
    }

    #[test]
    fn test_lookup_order_exact_then_folded_then_substring() {
        let index = FieldIndex::from_parts(
            &root(json!({
                "data do pagamento do cliente": "2024-01-02",
                "data-do-pagamento": "2024-01-01"
            })),
            None,
        );
        // Exact hit wins over the earlier substring candidate
        assert_eq!(index.lookup(&["data-do-pagamento"]), Some(&json!("2024-01-01")));
        // Folded alias hits the folded key
        assert_eq!(index.lookup(&["data_do_pagamento"]), Some(&json!("2024-01-01")));
        // Substring scan follows insertion order
        assert_eq!(index.lookup(&["pagamento"]), Some(&json!("2024-01-02")));
    }

    #[test]
    fn test_lookup_short_alias_never_substring_matches() {
        let index = FieldIndex::from_parts(&root(json!({"sdr responsavel": "Ana"})), None);
        assert_eq!(index.lookup(&["sdr"]), None);
        assert_eq!(index.lookup(&["responsavel"]), Some(&json!("Ana")));
    }

    #[test]
    fn test_lookup_respects_alias_priority() {
        let index = FieldIndex::from_parts(&root(json!({"preco": "10", "valor": "20"})), None);
        assert_eq!(index.lookup(&["valor", "preco"]), Some(&json!("20")));
        assert_eq!(index.lookup(&["missing", "preco"]), Some(&json!("10")));
        assert_eq!(index.lookup(&["missing"]), None);
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut index = FieldIndex::new();
        index.insert("first", &json!(1));
        index.insert("second", &json!(2));
        index.insert("FIRST", &json!(3));
        let keys: Vec<&str> = index.keys().collect();
        assert_eq!(keys, vec!["first", "second"]);
        assert_eq!(index.get("first"), Some(&json!(3)));
    }
}
