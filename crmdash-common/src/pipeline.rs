//! Pipeline stage bucketing and canonical ordering
//!
//! Stage labels are free text in the CRM, so classification is layered:
//! exact stage id, then normalized label, then a new ad-hoc stage. The final
//! order follows a canonical stage list matched by substring in either
//! direction, so `"PROPOSAL SENT (v2)"` ranks with `"PROPOSAL SENT"`.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aliases::{PIPELINE_CONTRACT_DATE, PIPELINE_MEETING_DATE};
use crate::attribution::AdAttribution;
use crate::field_index::FieldIndex;
use crate::normalizer::CardRecord;
use crate::parsers::parse_date;
use crate::payload::RawStep;
use crate::snapshot::{CardSummary, DisplayTag, PipelineStage};
use crate::text::normalize_key;
use crate::users::UNASSIGNED_NAME;
use crate::window::WindowProbe;

/// Rank for stages matching no canonical entry
pub const UNRANKED: usize = 999;

/// Stage colors by creation index
pub const PIPELINE_PALETTE: &[&str] = &[
    "#0ea5e9", "#84cc16", "#eab308", "#fed7aa", "#8b5cf6", "#db2777", "#16a34a", "#ef4444",
    "#737373",
];

pub const CATCH_ALL_STAGE_ID: &str = "default";
pub const CATCH_ALL_STAGE_LABEL: &str = "General";
pub const CATCH_ALL_STAGE_COLOR: &str = "#404040";
pub const NEW_STAGE_LABEL: &str = "New Stage";

/// Cards shown with at most this many tags
const DISPLAY_TAG_LIMIT: usize = 3;
const DISPLAY_TAG_COLOR: &str = "#333";

/// Canonical stage name with its equivalent spellings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalStage {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CanonicalStage {
    fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Funnel order used by the source CRM, Portuguese label first.
pub fn default_canonical_stages() -> Vec<CanonicalStage> {
    vec![
        CanonicalStage::new("BASE (Entrada Inicial)", &["LEAD BASE"]),
        CanonicalStage::new("QUALIFICADO (Lead com potencial)", &["QUALIFIED (potential lead)"]),
        CanonicalStage::new(
            "DESQUALIFICADO (Lead sem potencial)",
            &["DISQUALIFIED (no potential)"],
        ),
        CanonicalStage::new("FOLLOW-UP (Em acompanhamento)", &["FOLLOW-UP"]),
        CanonicalStage::new("REUNIÃO AGENDADA", &["MEETING SCHEDULED"]),
        CanonicalStage::new("NO-SHOW (Não compareceu)", &["NO-SHOW"]),
        CanonicalStage::new("RECUPERAÇÃO (Nova tentativa)", &["RECOVERY"]),
        CanonicalStage::new("PROPOSTA ENVIADA", &["PROPOSAL SENT"]),
        CanonicalStage::new("DESISTIU DE SEGUIR", &["GAVE UP"]),
        CanonicalStage::new("CONTRATO ASSINADO", &["CONTRACT SIGNED"]),
        CanonicalStage::new("PAGAMENTO CONFIRMADO", &["PAYMENT CONFIRMED"]),
    ]
}

/// Index of the first canonical stage any of whose names contains, or is
/// contained in, `label` (both normalized). [`UNRANKED`] otherwise.
pub fn stage_rank(label: &str, canonical: &[CanonicalStage]) -> usize {
    let label = normalize_key(label);
    if label.is_empty() {
        return UNRANKED;
    }
    canonical
        .iter()
        .position(|stage| {
            stage.names().any(|name| {
                let name = normalize_key(name);
                !name.is_empty() && (name.contains(&label) || label.contains(&name))
            })
        })
        .unwrap_or(UNRANKED)
}

pub fn pipeline_color(index: usize) -> &'static str {
    PIPELINE_PALETTE[index % PIPELINE_PALETTE.len()]
}

/// Stage under construction: identity plus the indices of its cards
#[derive(Debug, Clone, PartialEq)]
pub struct StageBucket {
    pub id: String,
    pub label: String,
    pub color: String,
    pub rank: usize,
    pub members: Vec<usize>,
}

/// Insertion-ordered stage map
#[derive(Debug, Clone, Default)]
pub struct PipelineClassifier {
    stages: IndexMap<String, StageBucket>,
}

impl PipelineClassifier {
    /// Classifier pre-seeded with the payload's declared steps.
    pub fn with_steps(steps: &[RawStep]) -> Self {
        let mut classifier = Self::default();
        for (idx, step) in steps.iter().enumerate() {
            let label = step
                .label
                .clone()
                .unwrap_or_else(|| format!("Stage {}", idx + 1));
            classifier.insert(step.id.clone(), label, pipeline_color(idx).to_string());
        }
        classifier
    }

    fn insert(&mut self, id: String, label: String, color: String) {
        self.stages.insert(
            id.clone(),
            StageBucket {
                id,
                label,
                color,
                rank: UNRANKED,
                members: Vec::new(),
            },
        );
    }

    /// Assign card number `card_idx` to a stage, creating one if needed.
    pub fn classify(&mut self, card_idx: usize, card: &CardRecord) {
        let step_id = card.stage_id();
        let step_name = normalize_key(card.stage_name());

        let mut target = (!step_id.is_empty() && self.stages.contains_key(step_id))
            .then(|| step_id.to_string());

        if target.is_none() && !step_name.is_empty() {
            target = self
                .stages
                .values()
                .find(|stage| normalize_key(&stage.label) == step_name)
                .map(|stage| stage.id.clone());

            if target.is_none() {
                let id = if step_id.is_empty() {
                    format!("auto-{}", step_name)
                } else {
                    step_id.to_string()
                };
                let label = card
                    .step_name
                    .clone()
                    .unwrap_or_else(|| NEW_STAGE_LABEL.to_string());
                let color = pipeline_color(self.stages.len()).to_string();
                debug!(stage = %id, label = %label, "Created ad-hoc pipeline stage");
                self.insert(id.clone(), label, color);
                target = Some(id);
            }
        }

        let bucket = match target.and_then(|id| self.stages.get_index_of(&id)) {
            Some(pos) => self.stages.get_index_mut(pos).map(|(_, stage)| stage),
            None => {
                if self.stages.is_empty() {
                    self.insert(
                        CATCH_ALL_STAGE_ID.to_string(),
                        CATCH_ALL_STAGE_LABEL.to_string(),
                        CATCH_ALL_STAGE_COLOR.to_string(),
                    );
                }
                self.stages.get_index_mut(0).map(|(_, stage)| stage)
            }
        };
        if let Some(stage) = bucket {
            stage.members.push(card_idx);
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages ranked against `canonical`; ties keep insertion order.
    pub fn into_ordered(self, canonical: &[CanonicalStage]) -> Vec<StageBucket> {
        let mut stages: Vec<StageBucket> = self
            .stages
            .into_values()
            .map(|mut stage| {
                stage.rank = stage_rank(&stage.label, canonical);
                stage
            })
            .collect();
        stages.sort_by_key(|stage| stage.rank);
        stages
    }
}

/// Second pass: render each stage's cards that touch the window.
///
/// A card is listed when its creation, update, contract or meeting date
/// falls in the window. Cards sort by position, then by display date, most
/// recent first.
pub fn render_stages(
    buckets: Vec<StageBucket>,
    cards: &[CardRecord],
    probe: &mut WindowProbe,
    today: NaiveDate,
) -> Vec<PipelineStage> {
    buckets
        .into_iter()
        .map(|bucket| {
            let mut summaries: Vec<CardSummary> = bucket
                .members
                .iter()
                .filter_map(|idx| cards.get(*idx))
                .filter_map(|card| summarize(card, probe, today))
                .collect();

            summaries.sort_by(|a, b| {
                a.position
                    .total_cmp(&b.position)
                    .then_with(|| b.sort_date.cmp(&a.sort_date))
            });

            PipelineStage {
                id: bucket.id,
                label: bucket.label,
                rank: bucket.rank,
                color: bucket.color,
                count: summaries.len(),
                value: summaries.iter().map(|c| c.value).sum(),
                cards: summaries,
            }
        })
        .collect()
}

fn summarize(card: &CardRecord, probe: &mut WindowProbe, today: NaiveDate) -> Option<CardSummary> {
    let index = FieldIndex::for_card(card);
    let created = parse_date(&card.created_at);
    let updated = parse_date(&card.updated_at);
    let contract = index.lookup(PIPELINE_CONTRACT_DATE).and_then(parse_date);
    let meeting = index.lookup(PIPELINE_MEETING_DATE).and_then(parse_date);

    let hits = [created, updated, contract, meeting].map(|date| probe.check(date));
    if !hits.contains(&true) {
        return None;
    }

    let sort_date = contract.or(created).unwrap_or(today);
    let tags = card
        .tags
        .iter()
        .take(DISPLAY_TAG_LIMIT)
        .map(|tag| DisplayTag {
            name: tag.name.clone(),
            color: tag
                .background_color
                .clone()
                .unwrap_or_else(|| DISPLAY_TAG_COLOR.to_string()),
        })
        .collect();

    Some(CardSummary {
        id: card.id.clone(),
        title: card.display_title(),
        value: card.amount(&index),
        responsible_name: card
            .responsible_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNASSIGNED_NAME)
            .to_string(),
        date: sort_date.format("%d/%m/%Y").to_string(),
        tags,
        ad_name: AdAttribution::from_index(&index).name,
        position: card.position.unwrap_or(0.0),
        sort_date,
    })
}
