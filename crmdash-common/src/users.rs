//! Team directory, roles and responsible-user resolution
//!
//! Cards reference their owner inconsistently: a configured user id, an id
//! the directory does not know, only a name in a custom field, or nothing at
//! all. [`TeamDirectory::resolve`] turns all of these into one identity so
//! that activity and commission accumulate on a single team member.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aliases;
use crate::field_index::FieldIndex;
use crate::normalizer::CardRecord;
use crate::text::{is_truthy, normalize_key, value_text};
use crate::{Error, Result};

/// Placeholder id for a card whose responsible user has a name but no id
pub const UNKNOWN_USER_ID: &str = "unknown";

/// Bucket id for cards with no owner information at all
pub const UNASSIGNED_USER_ID: &str = "unassigned";

/// Placeholder display name for cards with no owner name
pub const UNASSIGNED_NAME: &str = "Unassigned";

/// Honorifics ignored when computing initials
const HONORIFICS: &[&str] = &["Dr.", "Dra.", "Sr.", "Sra."];

/// Sales role of a team member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum TeamRole {
    #[serde(rename = "SDR")]
    Sdr,
    Closer,
    #[serde(rename = "SDR/Closer")]
    SdrCloser,
    #[default]
    #[serde(alias = "Vendedor")]
    Salesperson,
}

impl TeamRole {
    /// Commission rate applied to the deposit of a signed contract
    pub fn commission_rate(self) -> f64 {
        match self {
            TeamRole::Sdr => 0.03,
            TeamRole::Closer => 0.05,
            TeamRole::SdrCloser => 0.08,
            TeamRole::Salesperson => 0.05,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeamRole::Sdr => "SDR",
            TeamRole::Closer => "Closer",
            TeamRole::SdrCloser => "SDR/Closer",
            TeamRole::Salesperson => "Salesperson",
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "sdr" => Ok(TeamRole::Sdr),
            "closer" => Ok(TeamRole::Closer),
            "sdr/closer" | "sdr-closer" => Ok(TeamRole::SdrCloser),
            "salesperson" | "vendedor" => Ok(TeamRole::Salesperson),
            _ => Err(Error::InvalidInput(format!("Unknown team role: {}", s))),
        }
    }
}

/// Caller-supplied role per member id; always wins over the computed role.
pub type RoleOverrides = BTreeMap<String, TeamRole>;

/// Responsible user as carried on a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsibleUser {
    pub id: String,
    pub name: String,
}

/// One configured team member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: TeamRole,
}

/// Outcome of owner resolution for one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub id: String,
    pub name: String,
    /// Role from the directory, when the user is configured
    pub configured_role: Option<TeamRole>,
}

impl ResolvedUser {
    /// Role for a member seen for the first time in a run.
    ///
    /// Override, then configured role, then [`TeamRole::Salesperson`].
    pub fn initial_role(&self, overrides: &RoleOverrides) -> TeamRole {
        overrides
            .get(&self.id)
            .copied()
            .or(self.configured_role)
            .unwrap_or_default()
    }
}

/// Known team members in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamDirectory {
    entries: Vec<DirectoryEntry>,
}

impl TeamDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// First entry whose normalized name equals, or is contained in, the
    /// normalized `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&DirectoryEntry> {
        let wanted = normalize_key(name);
        if wanted.is_empty() {
            return None;
        }
        self.entries.iter().find(|entry| {
            let configured = normalize_key(&entry.name);
            !configured.is_empty() && (configured == wanted || wanted.contains(&configured))
        })
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the owner of `card`.
    ///
    /// 1. explicit responsible-user id on the card
    /// 2. when missing (or the `unknown` placeholder), a name-like custom
    ///    field matched against configured names
    /// 3. an unconfigured id with a real name is matched by that name
    ///
    /// Cards with no owner at all land in the `unassigned` bucket.
    pub fn resolve(&self, card: &CardRecord, index: &FieldIndex) -> ResolvedUser {
        let mut user_id = card
            .responsible_user_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                card.responsible_user
                    .as_ref()
                    .map(|u| u.id.clone())
                    .filter(|id| !id.is_empty())
            });

        if user_id.as_deref().map_or(true, |id| id == UNKNOWN_USER_ID) {
            let named = index
                .lookup(aliases::RESPONSIBLE_NAME)
                .filter(|v| is_truthy(v))
                .and_then(|v| self.find_by_name(&value_text(v)));
            if let Some(found) = named {
                user_id = Some(found.id.clone());
            }
        }

        let mut id = user_id.unwrap_or_else(|| UNASSIGNED_USER_ID.to_string());
        let mut name = card
            .responsible_user
            .as_ref()
            .map(|u| u.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNASSIGNED_NAME.to_string());

        let mut entry = self.get(&id);
        if entry.is_none() && name != UNASSIGNED_NAME {
            if let Some(found) = self.find_by_name(&name) {
                id = found.id.clone();
                entry = Some(found);
            }
        }
        if let Some(found) = entry {
            name = found.name.clone();
        }

        ResolvedUser {
            id,
            name,
            configured_role: entry.map(|e| e.role),
        }
    }
}

/// Avatar initials for a display name.
///
/// Placeholder and generic "Consultor ..." names get `?`; honorifics are
/// skipped; a single word yields its first two letters.
pub fn initials(name: &str) -> String {
    if name.trim().is_empty() || name.starts_with("Consultor") || name == UNASSIGNED_NAME {
        return "?".to_string();
    }
    let parts: Vec<&str> = name.split_whitespace().collect();
    let clean: Vec<&str> = parts
        .iter()
        .copied()
        .filter(|p| !HONORIFICS.contains(p))
        .collect();

    let letters: String = match clean.as_slice() {
        [] => parts.first().map(|p| p.chars().take(2).collect()).unwrap_or_default(),
        [only] => only.chars().take(2).collect(),
        [first, .., last] => first.chars().take(1).chain(last.chars().take(1)).collect(),
    };
    if letters.is_empty() {
        "?".to_string()
    } else {
        letters.to_uppercase()
    }
}
