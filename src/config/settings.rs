//! Application settings loaded from config.toml
//!
//! Every field has a default so the dashboard runs without a config file. The
//! reconciliation section names the edition channel whose products receive a
//! disambiguation suffix, and which collision rule triggers it.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://sales_dashboard.sqlite?mode=rwc";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Record store URL; `DATABASE_URL` takes precedence when set
    pub database_url: String,
    /// Export files processed by the binary at start-up
    pub import_paths: Vec<PathBuf>,
    /// Dictionary reconciliation behaviour
    pub reconciliation: ReconciliationSettings,
    /// Record store write behaviour
    pub persistence: PersistenceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            import_paths: Vec::new(),
            reconciliation: ReconciliationSettings::default(),
            persistence: PersistenceSettings::default(),
        }
    }
}

/// Which name collision makes an edition product take the suffix
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisambiguationRule {
    /// Same product sold under the same name through a non-edition channel
    #[default]
    CrossChannel,
    /// Any other product already carrying the same name
    AnyDuplicate,
}

/// Settings for merging exports into the product dictionary
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconciliationSettings {
    /// Channel label of the edition whose products get disambiguated
    pub edition_lever: String,
    /// Suffix appended to disambiguated product names
    pub edition_suffix: String,
    /// Collision rule
    pub rule: DisambiguationRule,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            edition_lever: "Microsoft Flight Simulator 2024".to_string(),
            edition_suffix: " (2024)".to_string(),
            rule: DisambiguationRule::CrossChannel,
        }
    }
}

/// Settings for writes against the record store
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Total attempts for an upsert or delete, including the first
    pub retry_attempts: u32,
    /// Delay before the second attempt; grows linearly afterwards
    pub retry_delay_ms: u64,
    /// Rows per upsert statement
    pub batch_size: usize,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 250,
            batch_size: 200,
        }
    }
}

impl Settings {
    /// Parses settings from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.reconciliation.edition_suffix.trim().is_empty() {
            return Err(Error::Config {
                message: "reconciliation.edition_suffix cannot be empty".to_string(),
            });
        }
        if self.persistence.retry_attempts == 0 {
            return Err(Error::Config {
                message: "persistence.retry_attempts must be at least 1".to_string(),
            });
        }
        if self.persistence.batch_size == 0 {
            return Err(Error::Config {
                message: "persistence.batch_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    debug!("Attempting to load settings from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    Settings::from_toml(&contents)
}

/// Loads settings from the default location (./config.toml), falling back to
/// defaults when the file does not exist.
pub fn load_default_settings() -> Result<Settings> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_settings(path)
    } else {
        info!("No config.toml found, using default settings.");
        Ok(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let toml_str = r#"
            database_url = "sqlite::memory:"
            import_paths = ["exports/april.csv"]

            [reconciliation]
            edition_lever = "Store 2025"
            edition_suffix = " (2025)"
            rule = "any_duplicate"

            [persistence]
            retry_attempts = 5
            retry_delay_ms = 10
            batch_size = 50
        "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.import_paths, vec![PathBuf::from("exports/april.csv")]);
        assert_eq!(settings.reconciliation.edition_lever, "Store 2025");
        assert_eq!(settings.reconciliation.edition_suffix, " (2025)");
        assert_eq!(
            settings.reconciliation.rule,
            DisambiguationRule::AnyDuplicate
        );
        assert_eq!(settings.persistence.retry_attempts, 5);
        assert_eq!(settings.persistence.batch_size, 50);
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.reconciliation.rule,
            DisambiguationRule::CrossChannel
        );
        assert_eq!(settings.reconciliation.edition_suffix, " (2024)");
        assert_eq!(
            settings.database_url,
            "sqlite://sales_dashboard.sqlite?mode=rwc"
        );
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let settings = Settings::from_toml("[persistence]\nretry_attempts = 1\n").unwrap();
        assert_eq!(settings.persistence.retry_attempts, 1);
        assert_eq!(settings.persistence.batch_size, 200);
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let result = Settings::from_toml("[persistence]\nretry_attempts = 0\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let result = Settings::from_toml("[reconciliation]\nrule = \"sometimes\"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database_url = \"sqlite::memory:\"\n").unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.database_url, "sqlite::memory:");

        let missing = load_settings(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(Error::Config { .. })));
    }
}
