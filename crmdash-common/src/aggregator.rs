//! Dashboard metrics aggregation
//!
//! [`MetricsAggregator::aggregate`] is a pure function of its inputs: the
//! cards of one fetch, the declared steps, and the settings held by the
//! aggregator (window, directory, role overrides, tag colors, goals, `today`).
//! Every accumulator is built and discarded per call.
//!
//! Each card contributes independently per metric. A card created last year
//! but paid this month counts toward cash flow and not toward leads.

use chrono::NaiveDate;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::aliases::{
    self, stage_mentions, CONTRACT_SIGNED_STAGE, OPERATIONAL_TAGS, PAYMENT_CONFIRMED_STAGE,
    PROPOSAL_STAGE,
};
use crate::attribution::AdAttribution;
use crate::field_index::FieldIndex;
use crate::normalizer::CardRecord;
use crate::parsers::{parse_date, parse_money};
use crate::payload::RawStep;
use crate::pipeline::{render_stages, CanonicalStage, PipelineClassifier};
use crate::snapshot::{
    Charts, CreativeMetric, DailyLeadsPoint, DailyRevenuePoint, DashboardSnapshot, GoalSettings,
    Metrics, ServiceTagMetric, TeamActivity, TeamMember, TrafficSourceMetric,
};
use crate::tags::{TagColorRegistry, DEFAULT_TAG_COLOR, DEFAULT_TAG_TEXT_COLOR};
use crate::text::normalize_key;
use crate::timeseries::{fill_daily_series, DayMap};
use crate::users::{initials, ResponsibleUser, RoleOverrides, TeamDirectory, UNASSIGNED_NAME};
use crate::window::{DateRangePreset, DateWindow, WindowProbe};

/// Default per-member sales target
pub const DEFAULT_MEMBER_SALES_TARGET: f64 = 100_000.0;

/// Number of services reported
pub const SERVICE_LIMIT: usize = 10;

const TRAFFIC_DEFAULT_COLOR: &str = "#808080";
const GOOGLE_COLOR: &str = "#4285F4";
const INSTAGRAM_COLOR: &str = "#E1306C";

/// Days the monthly revenue target is spread over
const TARGET_DAYS: f64 = 30.0;

/// Aggregation settings for one call
#[derive(Debug, Clone, Copy)]
pub struct MetricsAggregator<'a> {
    pub window: DateWindow,
    pub preset: DateRangePreset,
    pub today: NaiveDate,
    pub goals: &'a GoalSettings,
    pub directory: &'a TeamDirectory,
    pub role_overrides: &'a RoleOverrides,
    pub registry: &'a TagColorRegistry,
    pub stages: &'a [CanonicalStage],
    pub member_sales_target: f64,
}

/// Dates and amounts read from one card
struct CardFacts {
    amount: f64,
    entry_value: f64,
    created: Option<NaiveDate>,
    updated: Option<NaiveDate>,
    meeting: Option<NaiveDate>,
    contract: Option<NaiveDate>,
    payment: Option<NaiveDate>,
    contract_stage: bool,
    payment_stage: bool,
    proposal_stage: bool,
}

impl CardFacts {
    fn read(card: &CardRecord, index: &FieldIndex) -> Self {
        let lookup_date = |keys: &[&str]| index.lookup(keys).and_then(parse_date);
        let stage = normalize_key(card.stage_name());
        let payment_stage = stage_mentions(&stage, PAYMENT_CONFIRMED_STAGE);
        Self {
            amount: card.amount(index),
            entry_value: index.lookup(aliases::ENTRY_VALUE).map(parse_money).unwrap_or(0.0),
            created: parse_date(&card.created_at),
            updated: parse_date(&card.updated_at),
            meeting: lookup_date(aliases::MEETING_DATE),
            contract: lookup_date(aliases::CONTRACT_DATE),
            payment: lookup_date(aliases::PAYMENT_DATE),
            contract_stage: stage_mentions(&stage, CONTRACT_SIGNED_STAGE) || payment_stage,
            payment_stage,
            proposal_stage: stage_mentions(&stage, PROPOSAL_STAGE),
        }
    }

    fn is_effective_win(&self) -> bool {
        self.contract_stage || self.payment.is_some()
    }

    /// Explicit signature date, else the last touch of a card sitting in a
    /// signed stage.
    fn effective_contract_date(&self) -> Option<NaiveDate> {
        self.contract.or_else(|| {
            if self.contract_stage {
                self.updated.or(self.created)
            } else {
                None
            }
        })
    }

    /// Deposit if one was recorded, else the full amount.
    fn cash_in(&self) -> f64 {
        if self.entry_value > 0.0 {
            self.entry_value
        } else {
            self.amount
        }
    }
}

/// Per-call accumulators
#[derive(Default)]
struct Accumulators {
    metrics: Metrics,
    revenue_days: DayMap,
    lead_days: DayMap,
    team: IndexMap<String, TeamMember>,
    services: IndexMap<String, ServiceTagMetric>,
    traffic: IndexMap<String, TrafficSourceMetric>,
    creatives: IndexMap<String, CreativeMetric>,
}

impl<'a> MetricsAggregator<'a> {
    /// Aggregate one fetch into a snapshot.
    pub fn aggregate(&self, cards: &[CardRecord], steps: &[RawStep]) -> DashboardSnapshot {
        let mut probe = WindowProbe::new(self.window);
        let mut acc = Accumulators::default();
        let mut classifier = PipelineClassifier::with_steps(steps);
        let mut listed: Vec<CardRecord> = Vec::with_capacity(cards.len());

        for card in cards {
            let mut card = card.clone();
            self.accumulate(&mut card, &mut probe, &mut acc);
            classifier.classify(listed.len(), &card);
            listed.push(card);
        }

        for member in acc.team.values_mut() {
            let activity = &mut member.activity;
            if activity.leads > 0 {
                activity.conversion_rate = percent(activity.contracts_signed, activity.leads);
            }
        }

        let buckets = classifier.into_ordered(self.stages);
        let pipeline = render_stages(buckets, &listed, &mut probe, self.today);
        let (chart_start, chart_end) = probe.chart_range(self.preset, self.today);
        let charts = self.build_charts(&mut acc, chart_start, chart_end);

        let mut creatives: Vec<CreativeMetric> = acc.creatives.into_values().collect();
        creatives.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

        info!(
            cards = cards.len(),
            stages = pipeline.len(),
            team = acc.team.len(),
            revenue = acc.metrics.total_revenue,
            contracts = acc.metrics.total_contracts,
            "Aggregated dashboard snapshot"
        );

        DashboardSnapshot {
            current_goals: self.goals.clone(),
            metrics: acc.metrics,
            charts,
            pipeline,
            team: acc.team.into_values().collect(),
            creatives,
        }
    }

    fn accumulate(&self, card: &mut CardRecord, probe: &mut WindowProbe, acc: &mut Accumulators) {
        let index = FieldIndex::for_card(card);
        let facts = CardFacts::read(card, &index);
        let effective_contract = facts.effective_contract_date();

        let created_in = probe.check(facts.created);
        let updated_in = probe.check(facts.updated);
        let meeting_in = probe.check(facts.meeting);
        let contract_in = probe.check(effective_contract);
        let payment_in = probe.check(facts.payment);

        // Team bucket
        let resolved = self.directory.resolve(card, &index);
        let has_name = card
            .responsible_name()
            .is_some_and(|name| !name.is_empty() && name != UNASSIGNED_NAME);
        if !has_name && resolved.name != UNASSIGNED_NAME {
            card.responsible_user = Some(ResponsibleUser {
                id: resolved.id.clone(),
                name: resolved.name.clone(),
            });
        }
        let member = acc.team.entry(resolved.id.clone()).or_insert_with(|| TeamMember {
            id: resolved.id.clone(),
            name: resolved.name.clone(),
            role: resolved.initial_role(self.role_overrides),
            sales: 0.0,
            target: self.member_sales_target,
            commission: 0.0,
            avatar_initial: initials(&resolved.name),
            activity: TeamActivity::default(),
        });

        // Leads
        if let (true, Some(created)) = (created_in, facts.created) {
            acc.lead_days.entry(created).or_default().value += 1.0;
            member.activity.leads += 1;
        }

        // Meetings
        if meeting_in {
            acc.metrics.total_meetings += 1;
            member.activity.meetings_held += 1;
        }

        // Contracts, revenue, commission
        if (facts.contract_stage || facts.contract.is_some()) && contract_in {
            acc.metrics.total_contracts += 1;
            member.activity.contracts_signed += 1;
            acc.metrics.total_revenue += facts.amount;
            member.sales += facts.amount;

            if facts.entry_value > 0.0 {
                let commission = facts.entry_value * member.role.commission_rate();
                member.commission += commission;
                acc.metrics.total_commission += commission;
            }
        }

        // Cash flow
        match facts.payment {
            Some(payment) if payment_in => {
                acc.metrics.total_cash_flow += facts.cash_in();
                if facts.amount > 0.0 {
                    acc.revenue_days
                        .entry(payment)
                        .or_default()
                        .add_sale(&card.display_title(), facts.amount);
                }
            }
            None if facts.payment_stage => {
                if probe.check(facts.updated.or(facts.created)) {
                    acc.metrics.total_cash_flow += facts.cash_in();
                }
            }
            _ => {}
        }

        // Open proposals
        if (created_in || updated_in) && facts.proposal_stage {
            acc.metrics.total_proposal_value += facts.amount;
            member.activity.proposals_sent += 1;
        }

        if created_in || contract_in || updated_in {
            self.accumulate_services(card, &facts, acc);
            self.accumulate_attribution(&index, &facts, created_in, acc);
        }
    }

    fn accumulate_services(&self, card: &CardRecord, facts: &CardFacts, acc: &mut Accumulators) {
        let mut seen: Vec<String> = Vec::new();
        for tag in &card.tags {
            let key = normalize_key(&tag.name);
            if key.is_empty() || seen.contains(&key) || is_operational_tag(&key) {
                continue;
            }
            seen.push(key);

            let mut color = tag
                .background_color
                .clone()
                .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
            if is_placeholder_color(&color) {
                if let Some(registered) = self.registry.color_for(&tag.name) {
                    if registered != DEFAULT_TAG_COLOR {
                        color = registered.to_string();
                    }
                }
            }

            // Within a card tags dedupe by normalized name; across cards each
            // spelling stays its own service
            let service = acc
                .services
                .entry(tag.name.clone())
                .or_insert_with(|| ServiceTagMetric {
                    name: tag.name.clone(),
                    volume: 0,
                    monetary_value: 0.0,
                    color: color.clone(),
                });
            if is_placeholder_color(&service.color) && color != DEFAULT_TAG_COLOR {
                service.color = color;
            }
            service.volume += 1;
            if facts.is_effective_win() {
                service.monetary_value += facts.amount;
            }
        }
    }

    fn accumulate_attribution(
        &self,
        index: &FieldIndex,
        facts: &CardFacts,
        created_in: bool,
        acc: &mut Accumulators,
    ) {
        let ad = AdAttribution::from_index(index);
        let win = facts.is_effective_win();

        let source_key = normalize_key(&ad.source);
        let traffic = acc
            .traffic
            .entry(source_key.clone())
            .or_insert_with(|| TrafficSourceMetric {
                name: ad.source.clone(),
                leads: 0,
                sales: 0,
                conversion_rate: 0,
                color: TRAFFIC_DEFAULT_COLOR.to_string(),
            });
        if source_key.contains("google") {
            traffic.color = GOOGLE_COLOR.to_string();
        } else if source_key.contains("insta") {
            traffic.color = INSTAGRAM_COLOR.to_string();
        }
        if created_in {
            traffic.leads += 1;
        }
        if win {
            traffic.sales += 1;
        }
        if traffic.leads > 0 {
            traffic.conversion_rate = percent(traffic.sales, traffic.leads);
        }

        if let Some(name) = ad.name {
            let creative = acc
                .creatives
                .entry(name.clone())
                .or_insert_with(|| CreativeMetric {
                    id: name.clone(),
                    name,
                    url: ad.url.clone(),
                    source: ad.source.clone(),
                    leads: 0,
                    sales: 0,
                    revenue: 0.0,
                });
            if created_in {
                creative.leads += 1;
            }
            if win {
                creative.sales += 1;
                creative.revenue += facts.amount;
            }
        }
    }

    fn build_charts(&self, acc: &mut Accumulators, start: NaiveDate, end: NaiveDate) -> Charts {
        let target = self.goals.revenue_target / TARGET_DAYS;
        let daily_revenue = fill_daily_series(&acc.revenue_days, start, end)
            .into_iter()
            .map(|point| DailyRevenuePoint {
                day: point.date.format("%d/%m").to_string(),
                full_date: point.date.format("%Y-%m-%d").to_string(),
                target,
                actual: point.value,
                sales_breakdown: point.breakdown,
            })
            .collect();
        let daily_leads = fill_daily_series(&acc.lead_days, start, end)
            .into_iter()
            .map(|point| DailyLeadsPoint {
                day: point.date.format("%d/%m").to_string(),
                count: point.value as u32,
            })
            .collect();

        let mut services: Vec<ServiceTagMetric> = std::mem::take(&mut acc.services).into_values().collect();
        services.sort_by(|a, b| b.volume.cmp(&a.volume));
        services.truncate(SERVICE_LIMIT);

        let mut traffic: Vec<TrafficSourceMetric> = std::mem::take(&mut acc.traffic).into_values().collect();
        traffic.sort_by(|a, b| b.leads.cmp(&a.leads));

        debug!(
            start = %start,
            end = %end,
            services = services.len(),
            traffic = traffic.len(),
            "Built chart series"
        );

        Charts {
            daily_revenue,
            daily_leads,
            services,
            traffic,
        }
    }
}

/// Tags that describe workflow rather than the contracted service.
///
/// Both sides are normalized, so accented stoplist entries such as
/// "indicação" or "reunião" also drop their unaccented spellings. Matching
/// the raw accented entries against a normalized tag would never hit them
/// and would report "Indicação" as a service.
fn is_operational_tag(normalized: &str) -> bool {
    OPERATIONAL_TAGS.iter().any(|tag| normalize_key(tag) == normalized)
}

fn is_placeholder_color(color: &str) -> bool {
    color == DEFAULT_TAG_COLOR || color == DEFAULT_TAG_TEXT_COLOR
}

fn percent(part: u32, whole: u32) -> u32 {
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{DirectoryEntry, TeamRole};
    use serde_json::{json, Value};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        goals: GoalSettings,
        directory: TeamDirectory,
        overrides: RoleOverrides,
        registry: TagColorRegistry,
        stages: Vec<CanonicalStage>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                goals: GoalSettings::default(),
                directory: TeamDirectory::new(vec![
                    DirectoryEntry { id: "u-sdr".into(), name: "Maria Eduarda".into(), role: TeamRole::Sdr },
                    DirectoryEntry { id: "u-closer".into(), name: "Nerik Lino".into(), role: TeamRole::Closer },
                ]),
                overrides: RoleOverrides::new(),
                registry: TagColorRegistry::new(),
                stages: crate::pipeline::default_canonical_stages(),
            }
        }

        fn aggregator(&self) -> MetricsAggregator<'_> {
            MetricsAggregator {
                window: DateWindow::new(ymd(2024, 3, 1), ymd(2024, 3, 31)),
                preset: DateRangePreset::Month,
                today: ymd(2024, 3, 31),
                goals: &self.goals,
                directory: &self.directory,
                role_overrides: &self.overrides,
                registry: &self.registry,
                stages: &self.stages,
                member_sales_target: DEFAULT_MEMBER_SALES_TARGET,
            }
        }

        fn run(&self, items: Value) -> DashboardSnapshot {
            let cards: Vec<CardRecord> = items
                .as_array()
                .unwrap()
                .iter()
                .map(|item| CardRecord::from_value(item, &self.directory, &self.registry))
                .collect();
            self.aggregator().aggregate(&cards, &[])
        }
    }

    #[test]
    fn test_signed_contract_counts_revenue_and_commission() {
        let snapshot = Fixture::new().run(json!([{
            "card_id": "1",
            "card_title": "Ana",
            "monetary_amount": "R$ 10.000,00",
            "created_at": "2024-03-02",
            "updated_at": "2024-03-05",
            "step_name": "Contrato Assinado",
            "responsible_user_id": "u-closer",
            "valor_da_entrada": "R$ 2.000,00"
        }]));

        assert_eq!(snapshot.metrics.total_contracts, 1);
        assert_eq!(snapshot.metrics.total_revenue, 10_000.0);
        assert!((snapshot.metrics.total_commission - 100.0).abs() < 1e-9);
        let member = &snapshot.team[0];
        assert_eq!(member.role, TeamRole::Closer);
        assert_eq!(member.activity.contracts_signed, 1);
        assert_eq!(member.activity.leads, 1);
        assert_eq!(member.activity.conversion_rate, 100);
        assert_eq!(member.avatar_initial, "NL");
    }

    #[test]
    fn test_contract_without_deposit_has_no_commission() {
        let snapshot = Fixture::new().run(json!([{
            "card_id": "1",
            "monetary_amount": 5000,
            "created_at": "2024-03-02",
            "step_name": "Contrato Assinado",
            "responsible_user_id": "u-sdr"
        }]));
        assert_eq!(snapshot.metrics.total_revenue, 5000.0);
        assert_eq!(snapshot.metrics.total_commission, 0.0);
    }

    #[test]
    fn test_payment_builds_cash_flow_and_revenue_day() {
        let snapshot = Fixture::new().run(json!([
            {
                "card_id": "1", "card_title": "Ana", "monetary_amount": 3000,
                "created_at": "2023-11-01", "data_do_pagamento": "2024-03-10",
                "entrada": "1.000,00"
            },
            {
                "card_id": "2", "card_title": "Bia", "monetary_amount": 800,
                "created_at": "2023-11-01", "updated_at": "2024-03-12",
                "step_name": "Pagamento Confirmado"
            }
        ]));

        assert_eq!(snapshot.metrics.total_cash_flow, 1800.0);
        let day = snapshot
            .charts
            .daily_revenue
            .iter()
            .find(|p| p.full_date == "2024-03-10")
            .unwrap();
        assert_eq!(day.actual, 3000.0);
        assert_eq!(day.day, "10/03");
        assert_eq!(day.sales_breakdown.len(), 1);
        assert_eq!(snapshot.charts.daily_revenue.len(), 31);
        assert!(snapshot.charts.daily_leads.iter().all(|p| p.count == 0));
    }

    #[test]
    fn test_proposals_and_meetings() {
        let snapshot = Fixture::new().run(json!([{
            "card_id": "1",
            "monetary_amount": 1200,
            "created_at": "2024-03-03",
            "step_name": "Em Negociação",
            "data_da_reuniao": "15/03/2024"
        }]));
        assert_eq!(snapshot.metrics.total_proposal_value, 1200.0);
        assert_eq!(snapshot.metrics.total_meetings, 1);
        let member = &snapshot.team[0];
        assert_eq!(member.id, "unassigned");
        assert_eq!(member.role, TeamRole::Salesperson);
        assert_eq!(member.activity.proposals_sent, 1);
        assert_eq!(member.activity.meetings_held, 1);
        assert_eq!(member.avatar_initial, "?");
    }

    #[test]
    fn test_services_skip_operational_tags_and_dedupe() {
        let mut fixture = Fixture::new();
        fixture.registry.insert("Divórcio", "#123456");
        let snapshot = fixture.run(json!([
            {
                "card_id": "1", "created_at": "2024-03-03", "monetary_amount": 100,
                "step_name": "Contrato Assinado",
                "tags": "Divórcio, divorcio, Quente, Indicação"
            },
            {"card_id": "2", "created_at": "2024-03-04", "tags": ["Inventário"]},
            {"card_id": "3", "created_at": "2024-03-04", "tags": ["DIVÓRCIO"]}
        ]));

        let services: Vec<(&str, u32)> = snapshot
            .charts
            .services
            .iter()
            .map(|s| (s.name.as_str(), s.volume))
            .collect();
        assert_eq!(services, vec![("Divórcio", 1), ("Inventário", 1), ("DIVÓRCIO", 1)]);

        let divorce = &snapshot.charts.services[0];
        assert_eq!(divorce.monetary_value, 100.0);
        assert_eq!(divorce.color, "#123456");
        assert_eq!(snapshot.charts.services[1].color, DEFAULT_TAG_COLOR);
        assert_eq!(snapshot.charts.services[2].color, "#123456");
    }

    #[test]
    fn test_services_split_by_spelling_across_cards() {
        let snapshot = Fixture::new().run(json!([
            {"card_id": "1", "created_at": "2024-03-03", "tags": ["Divórcio"]},
            {"card_id": "2", "created_at": "2024-03-04", "tags": ["DIVÓRCIO"]},
            {"card_id": "3", "created_at": "2024-03-05", "tags": ["Divórcio", "divórcio"]}
        ]));

        let services: Vec<(&str, u32)> = snapshot
            .charts
            .services
            .iter()
            .map(|s| (s.name.as_str(), s.volume))
            .collect();
        assert_eq!(services, vec![("Divórcio", 2), ("DIVÓRCIO", 1)]);
    }

    #[test]
    fn test_accented_operational_tags_are_skipped() {
        let snapshot = Fixture::new().run(json!([
            {"card_id": "1", "created_at": "2024-03-03", "tags": "Indicação, Reunião, Orgânico, Cível"}
        ]));
        let names: Vec<&str> = snapshot.charts.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Cível"]);
    }

    #[test]
    fn test_traffic_and_creatives() {
        let snapshot = Fixture::new().run(json!([
            {
                "card_id": "1", "created_at": "2024-03-03", "utm_source": "google",
                "utm_campaign": "Search Inventário", "monetary_amount": 900,
                "step_name": "Contrato Assinado"
            },
            {"card_id": "2", "created_at": "2024-03-04", "utm_source": "Google"},
            {"card_id": "3", "created_at": "2024-03-05", "lead_origin": "Instagram"},
            {"card_id": "4", "created_at": "2024-03-06", "utm_source": "instagram"},
            {"card_id": "5", "created_at": "2024-03-06", "utm_source": "INSTAGRAM"}
        ]));

        let traffic = &snapshot.charts.traffic;
        assert_eq!(traffic[0].name, "Instagram");
        assert_eq!(traffic[0].leads, 3);
        assert_eq!(traffic[0].color, INSTAGRAM_COLOR);
        assert_eq!(traffic[1].name, "google");
        assert_eq!(traffic[1].leads, 2);
        assert_eq!(traffic[1].sales, 1);
        assert_eq!(traffic[1].conversion_rate, 50);
        assert_eq!(traffic[1].color, GOOGLE_COLOR);

        assert_eq!(snapshot.creatives.len(), 1);
        let creative = &snapshot.creatives[0];
        assert_eq!(creative.name, "Search Inventário");
        assert_eq!(creative.source, "google");
        assert_eq!(creative.revenue, 900.0);
    }

    #[test]
    fn test_pipeline_uses_resolved_names() {
        let snapshot = Fixture::new().run(json!([{
            "card_id": "1",
            "created_at": "2024-03-03",
            "step_name": "Base",
            "customFields": [{"name": "Responsável", "value": "Maria Eduarda"}]
        }]));
        assert_eq!(snapshot.pipeline.len(), 1);
        assert_eq!(snapshot.pipeline[0].cards[0].responsible_name, "Maria Eduarda");
        assert_eq!(snapshot.team[0].id, "u-sdr");
        assert_eq!(snapshot.team[0].role, TeamRole::Sdr);
    }

    #[test]
    fn test_role_override_wins() {
        let mut fixture = Fixture::new();
        fixture.overrides.insert("u-sdr".into(), TeamRole::Closer);
        let snapshot = fixture.run(json!([{
            "card_id": "1", "created_at": "2024-03-03", "step_name": "Contrato Assinado",
            "responsible_user_id": "u-sdr", "monetary_amount": 1000, "sinal": 1000
        }]));
        assert_eq!(snapshot.team[0].role, TeamRole::Closer);
        assert!((snapshot.team[0].commission - 50.0).abs() < 1e-9);
    }
}
