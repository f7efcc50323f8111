//! Refresh session
//!
//! Owns everything that must survive between refreshes: the tag color
//! registry, role overrides and the last good snapshot. A failed fetch never
//! replaces the snapshot already on screen.

use chrono::{DateTime, NaiveDate, Utc};
use crmdash_common::config::{TomlConfig, WindowConfig};
use crmdash_common::payload::Payload;
use crmdash_common::pipeline::CanonicalStage;
use crmdash_common::{
    CardRecord, DashboardSnapshot, GoalSettings, MetricsAggregator, RoleOverrides,
    TagColorRegistry, TeamDirectory, TeamRole,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{FetchError, WebhookClient};

/// Snapshot stamped with the time it was computed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedSnapshot {
    #[serde(flatten)]
    pub snapshot: DashboardSnapshot,
    pub last_updated: DateTime<Utc>,
}

pub struct SyncSession {
    client: WebhookClient,
    directory: TeamDirectory,
    stages: Vec<CanonicalStage>,
    goals: GoalSettings,
    window: WindowConfig,
    member_sales_target: f64,
    role_overrides: RoleOverrides,
    registry: TagColorRegistry,
    last_snapshot: Option<SyncedSnapshot>,
}

impl SyncSession {
    pub fn new(client: WebhookClient, config: &TomlConfig) -> Self {
        Self {
            client,
            directory: config.directory(),
            stages: config.canonical_stages(),
            goals: config.goals.clone(),
            window: config.window.clone(),
            member_sales_target: config.member_sales_target,
            role_overrides: config.roles.clone(),
            registry: TagColorRegistry::new(),
            last_snapshot: None,
        }
    }

    pub fn last_snapshot(&self) -> Option<&SyncedSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn role_overrides(&self) -> &RoleOverrides {
        &self.role_overrides
    }

    /// Pin a member's role for every later refresh.
    pub fn set_role(&mut self, member_id: impl Into<String>, role: TeamRole) {
        self.role_overrides.insert(member_id.into(), role);
    }

    pub fn set_window(&mut self, window: WindowConfig) {
        self.window = window;
    }

    /// Fetch the export and recompute the snapshot.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// returned to the caller.
    pub async fn refresh(&mut self, today: NaiveDate) -> Result<&SyncedSnapshot, FetchError> {
        let payload = match self.client.fetch().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    error = %e,
                    has_previous = self.last_snapshot.is_some(),
                    "Refresh failed, keeping previous snapshot"
                );
                return Err(e);
            }
        };

        let snapshot = self.compute(&payload, today);

        // Roles shown this cycle become the baseline for the next one
        for member in &snapshot.team {
            self.role_overrides.insert(member.id.clone(), member.role);
        }

        info!(
            contracts = snapshot.metrics.total_contracts,
            revenue = snapshot.metrics.total_revenue,
            stages = snapshot.pipeline.len(),
            team = snapshot.team.len(),
            "Snapshot refreshed"
        );

        Ok(&*self.last_snapshot.insert(SyncedSnapshot {
            snapshot,
            last_updated: Utc::now(),
        }))
    }

    fn compute(&mut self, payload: &Payload, today: NaiveDate) -> DashboardSnapshot {
        self.registry.absorb(&payload.tags);

        let cards: Vec<CardRecord> = payload
            .cards
            .iter()
            .map(|item| CardRecord::from_map(item, &self.directory, &self.registry))
            .collect();

        let window = self.window.resolve(today);
        debug!(
            start = %window.start,
            end = %window.end,
            preset = %self.window.preset,
            cards = cards.len(),
            registry = self.registry.len(),
            "Aggregating export"
        );

        MetricsAggregator {
            window,
            preset: self.window.preset,
            today,
            goals: &self.goals,
            directory: &self.directory,
            role_overrides: &self.role_overrides,
            registry: &self.registry,
            stages: &self.stages,
            member_sales_target: self.member_sales_target,
        }
        .aggregate(&cards, &payload.steps)
    }
}
