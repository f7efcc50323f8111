//! Dashboard output value objects
//!
//! Everything here serializes as camelCase JSON; the aggregator builds a
//! fresh [`DashboardSnapshot`] on every call.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::timeseries::BreakdownEntry;
use crate::users::TeamRole;

/// User-entered goal targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalSettings {
    #[serde(alias = "revenue_target")]
    pub revenue_target: f64,
    #[serde(alias = "cash_flow_target")]
    pub cash_flow_target: f64,
    #[serde(alias = "contracts_target")]
    pub contracts_target: u32,
    /// Echoed back in the snapshot; no metric reads it.
    pub deadline: Option<NaiveDate>,
}

impl Default for GoalSettings {
    fn default() -> Self {
        Self {
            revenue_target: 200_000.0,
            cash_flow_target: 80_000.0,
            contracts_target: 25,
            deadline: None,
        }
    }
}

/// Headline totals for the window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_revenue: f64,
    pub total_contracts: u32,
    pub total_cash_flow: f64,
    pub total_meetings: u32,
    pub total_commission: f64,
    pub total_proposal_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenuePoint {
    /// `DD/MM`
    pub day: String,
    /// `YYYY-MM-DD`
    pub full_date: String,
    pub target: f64,
    pub actual: f64,
    pub sales_breakdown: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLeadsPoint {
    pub day: String,
    pub count: u32,
}

/// Service line derived from card tags
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTagMetric {
    pub name: String,
    pub volume: u32,
    pub monetary_value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSourceMetric {
    pub name: String,
    pub leads: u32,
    pub sales: u32,
    /// Rounded percentage of sales over leads
    pub conversion_rate: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeMetric {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub source: String,
    pub leads: u32,
    pub sales: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Charts {
    pub daily_revenue: Vec<DailyRevenuePoint>,
    pub daily_leads: Vec<DailyLeadsPoint>,
    pub services: Vec<ServiceTagMetric>,
    pub traffic: Vec<TrafficSourceMetric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamActivity {
    pub leads: u32,
    /// Not derivable from the export; always 0
    pub scheduled_meetings: u32,
    pub meetings_held: u32,
    pub proposals_sent: u32,
    pub contracts_signed: u32,
    pub conversion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: TeamRole,
    pub sales: f64,
    pub target: f64,
    pub commission: f64,
    pub avatar_initial: String,
    pub activity: TeamActivity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayTag {
    pub name: String,
    pub color: String,
}

/// Card as listed under a pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub id: String,
    pub title: String,
    pub value: f64,
    pub responsible_name: String,
    /// `DD/MM/YYYY`
    pub date: String,
    pub tags: Vec<DisplayTag>,
    pub ad_name: Option<String>,
    pub position: f64,
    #[serde(skip)]
    pub sort_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStage {
    pub id: String,
    pub label: String,
    /// Index in the canonical stage order; unmatched stages share the
    /// trailing sentinel rank
    pub rank: usize,
    pub color: String,
    pub count: usize,
    pub value: f64,
    pub cards: Vec<CardSummary>,
}

/// Everything the dashboard renders for one window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub current_goals: GoalSettings,
    pub metrics: Metrics,
    pub charts: Charts,
    pub pipeline: Vec<PipelineStage>,
    pub team: Vec<TeamMember>,
    pub creatives: Vec<CreativeMetric>,
}
