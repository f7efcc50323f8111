//! crmdash-sync: polls the CRM export webhook and keeps a dashboard
//! snapshot current.

pub mod client;
pub mod session;

pub use client::{FetchError, WebhookClient};
pub use session::{SyncSession, SyncedSnapshot};
