//! Traffic source, ad creative and ad URL extraction

use crate::aliases::{
    CAMPAIGN_FRAGMENTS, CAMPAIGN_KEYS, REFERRAL_URL_FRAGMENT, REFERRAL_URL_KEYS,
    TRAFFIC_SOURCE_KEYS,
};
use crate::field_index::FieldIndex;
use crate::text::{char_len, is_truthy, value_text};

/// Source reported for cards without any usable origin
pub const DEFAULT_TRAFFIC_SOURCE: &str = "Organic";

/// Where a lead came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdAttribution {
    /// Campaign / creative name
    pub name: Option<String>,
    pub source: String,
    /// Ad referral URL; only `http…` values are kept
    pub url: Option<String>,
}

impl AdAttribution {
    /// Extract attribution from a card's field index.
    ///
    /// Candidates are visited in priority order. The first usable candidate is
    /// taken; a later one replaces it only when it is strictly longer and does
    /// not mention `unknown`.
    pub fn from_index(index: &FieldIndex) -> Self {
        let mut source = DEFAULT_TRAFFIC_SOURCE.to_string();
        let mut source_is_default = true;
        for text in candidates(index, TRAFFIC_SOURCE_KEYS) {
            if text.to_lowercase() == "api" || text == "undefined" {
                continue;
            }
            if source_is_default || prefer(&text, &source) {
                source = text;
                source_is_default = false;
            }
        }

        let mut campaign = candidates(index, CAMPAIGN_KEYS);
        if campaign.is_empty() {
            campaign = CAMPAIGN_FRAGMENTS
                .iter()
                .filter_map(|fragment| index.find_containing(fragment))
                .filter(|v| is_truthy(v))
                .map(value_text)
                .collect();
        }
        let mut name: Option<String> = None;
        for text in campaign {
            if text == "undefined" {
                continue;
            }
            match &name {
                Some(current) if !prefer(&text, current) => {}
                _ => name = Some(text),
            }
        }

        let url = REFERRAL_URL_KEYS
            .iter()
            .filter_map(|key| index.get(key))
            .find(|v| is_truthy(v))
            .or_else(|| index.find_containing(REFERRAL_URL_FRAGMENT))
            .map(value_text)
            .filter(|u| u.starts_with("http"));

        Self { name, source, url }
    }
}

/// Truthy values under the exact `keys`, as text, in key order.
fn candidates(index: &FieldIndex, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| index.get(key))
        .filter(|v| is_truthy(v))
        .map(value_text)
        .collect()
}

fn prefer(candidate: &str, current: &str) -> bool {
    char_len(candidate) > char_len(current) && !candidate.to_lowercase().contains("unknown")
}
