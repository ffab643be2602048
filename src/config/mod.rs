use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bundled sample used to bootstrap a fresh deployment.
const SAMPLE_CONFIG: &str = include_str!("forces.sample.json");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("malformed config file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("config declares no forces")]
    Empty,

    #[error("force '{force}': invalid database name '{database}'")]
    InvalidDatabaseName { force: String, database: String },

    #[error("force '{force}': patrol force '{other}' is not configured")]
    UnknownPatrolForce { force: String, other: String },

    #[error("force '{force}': minimum weekly minutes must be positive")]
    InvalidMinWeekMinutes { force: String },
}

/// Per-force business rules and database mapping. Immutable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceEntry {
    pub name: String,
    pub database: String,
    /// Trusted SQL expression deriving an officer's last promotion date.
    /// Interpolated into the officer detail query, never user-supplied.
    pub promotion_expression: String,
    /// Justification type id that marks an officer as inactive.
    pub inactivity_justification_type: i64,
    pub min_week_minutes: i64,
    pub max_non_working_days: i64,
    /// Forces this one may jointly patrol with. Broadcasts for patrol
    /// events fan out to these rooms as well.
    #[serde(default)]
    pub patrol_forces: Vec<String>,
}

/// Static per-deployment force table, loaded once at startup and passed
/// by reference into every component that needs force lookups.
#[derive(Debug, Clone)]
pub struct ForceConfig {
    forces: BTreeMap<String, ForceEntry>,
}

impl ForceConfig {
    /// Load from the given path. A missing file is created from the
    /// bundled sample first; malformed content is fatal to the caller.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("config file {} not found, creating from sample", path.display());
            std::fs::write(path, SAMPLE_CONFIG).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let forces: BTreeMap<String, ForceEntry> = serde_json::from_str(raw)?;
        let config = Self { forces };
        config.validate()?;
        Ok(config)
    }

    /// Build directly from entries. Used by tests to fabricate force tables.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, ForceEntry)>,
    ) -> Result<Self, ConfigError> {
        let config = Self { forces: entries.into_iter().collect() };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.forces.is_empty() {
            return Err(ConfigError::Empty);
        }
        for (id, entry) in &self.forces {
            if entry.database.is_empty()
                || !entry.database.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(ConfigError::InvalidDatabaseName {
                    force: id.clone(),
                    database: entry.database.clone(),
                });
            }
            if entry.min_week_minutes <= 0 {
                return Err(ConfigError::InvalidMinWeekMinutes { force: id.clone() });
            }
            for other in &entry.patrol_forces {
                if !self.forces.contains_key(other) {
                    return Err(ConfigError::UnknownPatrolForce {
                        force: id.clone(),
                        other: other.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn force(&self, id: &str) -> Option<&ForceEntry> {
        self.forces.get(id)
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.forces.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ForceEntry)> {
        self.forces.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }
}

/// Resolve the config file path from the environment.
pub fn config_path() -> String {
    std::env::var("FORCES_CONFIG_FILE").unwrap_or_else(|_| "forces.json".to_string())
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    pub fn entry(database: &str) -> ForceEntry {
        ForceEntry {
            name: database.to_uppercase(),
            database: database.to_string(),
            promotion_expression: "NULL".to_string(),
            inactivity_justification_type: 3,
            min_week_minutes: 120,
            max_non_working_days: 30,
            patrol_forces: vec![],
        }
    }

    /// Two-force table ("alfa", "bravo") with alfa patrol-compatible with bravo.
    pub fn two_forces() -> ForceConfig {
        let mut alfa = entry("force_alfa");
        alfa.patrol_forces = vec!["bravo".to_string()];
        ForceConfig::from_entries([
            ("alfa".to_string(), alfa),
            ("bravo".to_string(), entry("force_bravo")),
        ])
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses_and_validates() {
        let config = ForceConfig::from_json(SAMPLE_CONFIG).unwrap();
        assert!(config.is_known("psp"));
        assert!(config.is_known("gnr"));
        let psp = config.force("psp").unwrap();
        assert_eq!(psp.database, "force_psp");
        assert_eq!(psp.patrol_forces, vec!["gnr".to_string()]);
    }

    #[test]
    fn unknown_force_lookup_is_none() {
        let config = test_support::two_forces();
        assert!(config.force("zzz").is_none());
        assert!(!config.is_known("zzz"));
    }

    #[test]
    fn rejects_empty_force_table() {
        assert!(matches!(ForceConfig::from_json("{}"), Err(ConfigError::Empty)));
    }

    #[test]
    fn rejects_unknown_patrol_reference() {
        let mut alfa = test_support::entry("force_alfa");
        alfa.patrol_forces = vec!["missing".to_string()];
        let err = ForceConfig::from_entries([("alfa".to_string(), alfa)]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPatrolForce { .. }));
    }

    #[test]
    fn rejects_bad_database_name() {
        let mut alfa = test_support::entry("force_alfa");
        alfa.database = "force; DROP".to_string();
        let err = ForceConfig::from_entries([("alfa".to_string(), alfa)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDatabaseName { .. }));
    }
}
