//! Capability model - the closed set of permission flags and the reserved administrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Permission flag gating one category of gateway operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create, edit and delete identities and their assignments.
    UserManagement,
    /// Historical backfill, refresh and purge of weather data.
    DataIngestion,
    /// Read 7-day forecasts.
    Forecasting,
    /// Launch training, sweeps and retraining.
    Training,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::UserManagement,
        Capability::DataIngestion,
        Capability::Forecasting,
        Capability::Training,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::UserManagement => "user_management",
            Capability::DataIngestion => "data_ingestion",
            Capability::Forecasting => "forecasting",
            Capability::Training => "training",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Permission '{}' doesn't exist", s))
    }
}

/// Process-wide, immutable view of the permission model. Built once at startup and
/// shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    capabilities: BTreeSet<Capability>,
    administrator_id: String,
}

impl PermissionCatalog {
    pub fn new(administrator_id: impl Into<String>) -> Self {
        Self {
            capabilities: Capability::ALL.into_iter().collect(),
            administrator_id: administrator_id.into(),
        }
    }

    /// Resolve a wire identifier to a catalog capability.
    pub fn lookup(&self, capability_id: &str) -> Option<Capability> {
        capability_id
            .parse::<Capability>()
            .ok()
            .filter(|c| self.capabilities.contains(c))
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }

    pub fn administrator_id(&self) -> &str {
        &self.administrator_id
    }

    pub fn is_administrator(&self, user_id: &str) -> bool {
        self.administrator_id == user_id
    }
}
