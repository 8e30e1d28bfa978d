//! Configuration for the RA core: validation profiles, CT log policy,
//! feature gates, rate-limit store settings, and storage backend selection.
//!
//! Follows the same `Config::from_file` / `apply_env_overrides` /
//! `expand_env_var` / `validate` shape used throughout this lineage, with
//! `RA_*` environment variables taking precedence over file values and
//! `${VAR}` interpolation inside string config values.

use crate::error::{RaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;

fn default_max_contacts() -> u32 {
    3
}

fn default_profile_name() -> String {
    "default".to_string()
}

fn default_pending_authz_lifetime_secs() -> u64 {
    7 * 24 * 3600
}

fn default_valid_authz_lifetime_secs() -> u64 {
    300 * 24 * 3600
}

fn default_order_lifetime_secs() -> u64 {
    7 * 24 * 3600
}

fn default_max_names() -> u32 {
    100
}

fn default_identifier_types() -> Vec<String> {
    vec!["dns".to_string()]
}

fn default_stagger_ms() -> u64 {
    200
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_sct_quorum() -> u32 {
    2
}

fn default_zombie_threshold() -> u32 {
    5
}

/// One named bundle of issuance parameters, selectable per order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationProfile {
    #[serde(default = "default_pending_authz_lifetime_secs")]
    pub pending_authz_lifetime_secs: u64,
    #[serde(default = "default_valid_authz_lifetime_secs")]
    pub valid_authz_lifetime_secs: u64,
    #[serde(default = "default_order_lifetime_secs")]
    pub order_lifetime_secs: u64,
    #[serde(default = "default_max_names")]
    pub max_names: u32,
    #[serde(default = "default_identifier_types")]
    pub identifier_types: Vec<String>,
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self {
            pending_authz_lifetime_secs: default_pending_authz_lifetime_secs(),
            valid_authz_lifetime_secs: default_valid_authz_lifetime_secs(),
            order_lifetime_secs: default_order_lifetime_secs(),
            max_names: default_max_names(),
            identifier_types: default_identifier_types(),
        }
    }
}

/// CT log submission policy for finalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CtLogsConfig {
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    #[serde(default)]
    pub log_list_file: Option<String>,
    #[serde(default)]
    pub sct_logs: Vec<String>,
    #[serde(default)]
    pub info_logs: Vec<String>,
    #[serde(default)]
    pub final_logs: Vec<String>,
    /// Number of distinct-operator SCTs required before finalization proceeds.
    #[serde(default = "default_sct_quorum")]
    pub sct_quorum: u32,
}

/// Process-wide, immutable-after-init feature gates (§9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureFlags {
    #[serde(default)]
    pub automatically_pause_zombie_clients: bool,
    #[serde(default)]
    pub no_pending_authz_reuse: bool,
    #[serde(default)]
    pub enforce_mpic: bool,
    #[serde(default)]
    pub unsplit_issuance: bool,
    /// Threshold of failed authorizations per (account, identifier) before
    /// auto-pause triggers.
    #[serde(default = "default_zombie_threshold")]
    pub zombie_threshold: u32,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            automatically_pause_zombie_clients: false,
            no_pending_authz_reuse: false,
            enforce_mpic: false,
            unsplit_issuance: false,
            zombie_threshold: default_zombie_threshold(),
        }
    }
}

/// Rate-limit cache connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LimiterRedisConfig {
    pub url: String,
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LimiterConfig {
    #[serde(default)]
    pub defaults_path: Option<String>,
    #[serde(default)]
    pub overrides_path: Option<String>,
    #[serde(default)]
    pub redis: Option<LimiterRedisConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageSettings {
    Memory,
    Redis { url: String },
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MetricsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub listen_addr: Option<String>,
}

/// Top-level RA configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_max_contacts")]
    pub max_contacts_per_registration: u32,
    #[serde(default = "default_profile_name")]
    pub default_profile_name: String,
    #[serde(default)]
    pub validation_profiles: HashMap<String, ValidationProfile>,
    #[serde(default)]
    pub ct_logs: CtLogsConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default = "default_storage_backend_settings")]
    pub storage: StorageSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub policy_file: Option<String>,
}

fn default_storage_backend_settings() -> StorageSettings {
    StorageSettings::Memory
}

impl Default for Config {
    fn default() -> Self {
        let mut validation_profiles = HashMap::new();
        validation_profiles.insert(default_profile_name(), ValidationProfile::default());
        Self {
            max_contacts_per_registration: default_max_contacts(),
            default_profile_name: default_profile_name(),
            validation_profiles,
            ct_logs: CtLogsConfig::default(),
            features: FeatureFlags::default(),
            limiter: LimiterConfig::default(),
            storage: StorageSettings::Memory,
            metrics: MetricsSettings::default(),
            policy_file: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RaError::internal(format!("failed to read config file: {e}")))?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| RaError::internal(format!("failed to parse config: {e}")))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `RA_*` environment variables on top of file-supplied values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("RA_DEFAULT_PROFILE_NAME") {
            self.default_profile_name = Self::expand_env_var(&v)?;
        }
        if let Ok(v) = env::var("RA_MAX_CONTACTS_PER_REGISTRATION")
            && let Ok(parsed) = v.parse()
        {
            self.max_contacts_per_registration = parsed;
        }
        if let Ok(v) = env::var("RA_STORAGE_BACKEND") {
            match v.as_str() {
                "memory" => self.storage = StorageSettings::Memory,
                "redis" => {
                    let url = env::var("RA_STORAGE_REDIS_URL").unwrap_or_default();
                    self.storage = StorageSettings::Redis { url };
                }
                other => {
                    return Err(RaError::internal(format!("unknown storage backend: {other}")));
                }
            }
        }
        if let Ok(v) = env::var("RA_ENFORCE_MPIC") {
            self.features.enforce_mpic = v == "true" || v == "1";
        }
        Ok(())
    }

    /// Expands `${VAR}` references inside a string value using the process
    /// environment.
    pub fn expand_env_var(value: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
        let mut result = value.to_string();
        for cap in re.captures_iter(value) {
            let var_name = &cap[1];
            let var_value = env::var(var_name)
                .map_err(|_| RaError::internal(format!("environment variable not set: {var_name}")))?;
            result = result.replace(&cap[0], &var_value);
        }
        Ok(result)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_contacts_per_registration == 0 {
            return Err(RaError::internal("maxContactsPerRegistration must be > 0"));
        }
        if !self.validation_profiles.contains_key(&self.default_profile_name) {
            return Err(RaError::internal(format!(
                "defaultProfileName '{}' is not a defined validation profile",
                self.default_profile_name
            )));
        }
        for (name, profile) in &self.validation_profiles {
            if profile.max_names == 0 {
                return Err(RaError::internal(format!(
                    "validation profile '{name}' has maxNames == 0"
                )));
            }
            if profile.identifier_types.is_empty() {
                return Err(RaError::internal(format!(
                    "validation profile '{name}' has no allowed identifier types"
                )));
            }
        }
        if self.ct_logs.sct_quorum == 0 {
            return Err(RaError::internal("ctLogs.sctQuorum must be > 0"));
        }
        match &self.storage {
            StorageSettings::Redis { url } if url.is_empty() => {
                return Err(RaError::internal("redis storage backend requires a url"));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn default_profile(&self) -> Result<&ValidationProfile> {
        self.validation_profiles
            .get(&self.default_profile_name)
            .ok_or_else(|| RaError::internal("default profile missing after validation"))
    }

    pub fn profile(&self, name: &str) -> Result<&ValidationProfile> {
        if name.is_empty() {
            return self.default_profile();
        }
        self.validation_profiles
            .get(name)
            .ok_or_else(|| RaError::invalid_profile(format!("unknown profile: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
        default_profile_name = "legacy"
        max_contacts_per_registration = 2

        [validation_profiles.legacy]
        max_names = 50
        identifier_types = ["dns"]

        [ct_logs]
        sct_quorum = 2

        [features]
        enforce_mpic = true
        "#
    }

    #[test]
    fn parses_minimal_document() {
        let config = Config::from_str(sample_toml()).unwrap();
        assert_eq!(config.default_profile_name, "legacy");
        assert!(config.features.enforce_mpic);
        assert_eq!(config.profile("legacy").unwrap().max_names, 50);
    }

    #[test]
    fn rejects_unknown_default_profile() {
        let bad = r#"
        default_profile_name = "missing"
        [validation_profiles.legacy]
        "#;
        assert!(Config::from_str(bad).is_err());
    }

    #[test]
    fn env_override_replaces_default_profile_name() {
        temp_env::with_var("RA_DEFAULT_PROFILE_NAME", Some("legacy"), || {
            let mut config = Config::from_str(sample_toml()).unwrap();
            config.apply_env_overrides().unwrap();
            assert_eq!(config.default_profile_name, "legacy");
        });
    }

    #[test]
    fn expand_env_var_substitutes_process_environment() {
        temp_env::with_var("SOME_SECRET", Some("s3cr3t"), || {
            let expanded = Config::expand_env_var("redis://${SOME_SECRET}@localhost").unwrap();
            assert_eq!(expanded, "redis://s3cr3t@localhost");
        });
    }

    #[test]
    fn redis_backend_without_url_fails_validation() {
        let config = Config {
            storage: StorageSettings::Redis { url: String::new() },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
