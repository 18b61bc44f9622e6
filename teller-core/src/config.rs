//! Configuration management
//!
//! Settings live in `settings.json` inside the bank directory:
//! ```json
//! {
//!   "interest": { "rate": "0.2", "authorityName": "InterestOperator", "description": "Interest ..." },
//!   "database": { "filename": "teller.duckdb" },
//!   "hashing": { "memoryCost": 19456, "timeCost": 2, "parallelism": 1 }
//! }
//! ```
//! Keys this crate does not manage are kept intact on save.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use argon2::Params;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::services::InterestSettings;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_DB_FILENAME: &str = "teller.duckdb";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    interest: InterestSection,
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    hashing: HashingSection,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InterestSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authority_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory_cost: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_cost: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parallelism: Option<u32>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Argon2id cost parameters for newly issued credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingSettings {
    /// Memory in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            memory_cost: Params::DEFAULT_M_COST,
            time_cost: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashingSettings {
    pub fn params(&self) -> crate::domain::result::Result<Params> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| Error::Config(format!("invalid hashing parameters: {}", e)))
    }
}

/// Parse an interest rate. Rates are plain decimals such as `0.015`.
pub fn parse_rate(value: &str) -> crate::domain::result::Result<Decimal> {
    let rate = Decimal::from_str(value.trim())
        .map_err(|e| Error::Config(format!("invalid interest rate '{}': {}", value, e)))?;
    if rate < Decimal::ZERO {
        return Err(Error::Config(format!("interest rate must not be negative, got {}", rate)));
    }
    Ok(rate)
}

/// Teller configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub interest: InterestSettings,
    pub database_filename: String,
    pub hashing: HashingSettings,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interest: InterestSettings::default(),
            database_filename: DEFAULT_DB_FILENAME.to_string(),
            hashing: HashingSettings::default(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the bank directory
    ///
    /// Interest settings can be overridden with `TELLER_INTEREST_RATE` and
    /// `TELLER_INTEREST_AUTHORITY`.
    pub fn load(bank_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(bank_dir)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load settings.json without environment overrides
    pub fn load_file(bank_dir: &Path) -> Result<Self> {
        let raw = read_settings(&bank_dir.join(SETTINGS_FILE))?;

        let defaults = InterestSettings::default();
        let hashing_defaults = HashingSettings::default();
        let hashing = HashingSettings {
            memory_cost: raw.hashing.memory_cost.unwrap_or(hashing_defaults.memory_cost),
            time_cost: raw.hashing.time_cost.unwrap_or(hashing_defaults.time_cost),
            parallelism: raw.hashing.parallelism.unwrap_or(hashing_defaults.parallelism),
        };
        hashing
            .params()
            .context("Failed to read hashing settings from settings.json")?;
        let rate = match raw.interest.rate.as_deref() {
            Some(rate) => parse_rate(rate).context("Failed to read interest.rate from settings.json")?,
            None => defaults.rate,
        };

        Ok(Self {
            interest: InterestSettings {
                rate,
                authority_name: raw
                    .interest
                    .authority_name
                    .clone()
                    .unwrap_or(defaults.authority_name),
                description: raw
                    .interest
                    .description
                    .clone()
                    .unwrap_or(defaults.description),
            },
            database_filename: raw
                .database
                .filename
                .clone()
                .unwrap_or_else(|| DEFAULT_DB_FILENAME.to_string()),
            hashing,
            _raw_settings: raw,
        })
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(rate) = var("TELLER_INTEREST_RATE") {
            self.interest.rate = parse_rate(&rate).context("Invalid TELLER_INTEREST_RATE")?;
        }
        if let Some(name) = var("TELLER_INTEREST_AUTHORITY").filter(|n| !n.trim().is_empty()) {
            self.interest.authority_name = name;
        }
        Ok(())
    }

    /// Save config to the bank directory
    /// Preserves other settings this crate doesn't manage
    pub fn save(&self, bank_dir: &Path) -> Result<()> {
        let settings_path = bank_dir.join(SETTINGS_FILE);

        // Load existing settings to preserve fields we don't manage
        let mut settings = read_settings(&settings_path)?;

        settings.interest.rate = Some(self.interest.rate.to_string());
        settings.interest.authority_name = Some(self.interest.authority_name.clone());
        settings.interest.description = Some(self.interest.description.clone());
        settings.database.filename = Some(self.database_filename.clone());
        settings.hashing.memory_cost = Some(self.hashing.memory_cost);
        settings.hashing.time_cost = Some(self.hashing.time_cost);
        settings.hashing.parallelism = Some(self.hashing.parallelism);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }
}

/// Missing or malformed settings fall back to defaults
fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_file(dir.path()).unwrap();

        assert_eq!(config.interest, InterestSettings::default());
        assert_eq!(config.interest.rate, Decimal::new(2, 1));
        assert_eq!(config.database_filename, "teller.duckdb");
    }

    #[test]
    fn test_reads_settings_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"interest":{"rate":"0.015","authorityName":"treasury"},"database":{"filename":"bank.duckdb"}}"#,
        )
        .unwrap();

        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.interest.rate, Decimal::new(15, 3));
        assert_eq!(config.interest.authority_name, "treasury");
        assert_eq!(config.interest.description, "Interest ...");
        assert_eq!(config.database_filename, "bank.duckdb");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();

        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.interest, InterestSettings::default());
    }

    #[test]
    fn test_bad_rate_in_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"interest":{"rate":"lots"}}"#).unwrap();

        assert!(Config::load_file(dir.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|name| match name {
                "TELLER_INTEREST_RATE" => Some("0.05".to_string()),
                "TELLER_INTEREST_AUTHORITY" => Some("bot".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.interest.rate, Decimal::new(5, 2));
        assert_eq!(config.interest.authority_name, "bot");

        let mut untouched = Config::default();
        untouched.apply_overrides(no_env).unwrap();
        assert_eq!(untouched.interest, InterestSettings::default());
    }

    #[test]
    fn test_bad_rate_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|name| {
            (name == "TELLER_INTEREST_RATE").then(|| "-1".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"theme":"dark","interest":{"rate":"0.2","schedule":"monthly"}}"#,
        )
        .unwrap();

        let mut config = Config::load_file(dir.path()).unwrap();
        config.interest.rate = Decimal::new(1, 2);
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap())
                .unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["interest"]["schedule"], "monthly");
        assert_eq!(saved["interest"]["rate"], "0.01");

        let reloaded = Config::load_file(dir.path()).unwrap();
        assert_eq!(reloaded.interest.rate, Decimal::new(1, 2));
    }

    #[test]
    fn test_hashing_settings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"hashing":{"memoryCost":1024,"timeCost":1}}"#,
        )
        .unwrap();

        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.hashing.memory_cost, 1024);
        assert_eq!(config.hashing.time_cost, 1);
        assert_eq!(config.hashing.parallelism, Params::DEFAULT_P_COST);
        assert!(config.hashing.params().is_ok());

        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"hashing":{"timeCost":0}}"#).unwrap();
        assert!(Config::load_file(dir.path()).is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(" 0.2 ").unwrap(), Decimal::new(2, 1));
        assert!(matches!(parse_rate("abc"), Err(Error::Config(_))));
        assert!(matches!(parse_rate("-0.1"), Err(Error::Config(_))));
    }
}
