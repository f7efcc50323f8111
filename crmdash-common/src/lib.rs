//! # crmdash Common Library
//!
//! Turns a flattened Kanban CRM export into dashboard metrics:
//! - Payload unpacking and record normalization
//! - Normalized field indexing and locale-tolerant value parsing
//! - Responsible-user resolution, roles and commissions
//! - Pipeline stage classification and canonical ordering
//! - Window-scoped aggregation into a [`DashboardSnapshot`]
//! - Configuration loading

pub mod aggregator;
pub mod aliases;
pub mod attribution;
pub mod config;
pub mod error;
pub mod field_index;
pub mod normalizer;
pub mod parsers;
pub mod payload;
pub mod pipeline;
pub mod snapshot;
pub mod tags;
pub mod text;
pub mod timeseries;
pub mod users;
pub mod window;

pub use aggregator::MetricsAggregator;
pub use error::{Error, Result};
pub use normalizer::CardRecord;
pub use payload::Payload;
pub use snapshot::{DashboardSnapshot, GoalSettings};
pub use tags::TagColorRegistry;
pub use users::{RoleOverrides, TeamDirectory, TeamRole};
pub use window::{DateRangePreset, DateWindow};
