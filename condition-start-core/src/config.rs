//! Correlation configuration.
//!
//! Read from the environment by hosts, or deserialized from their own config
//! files.

use serde::{Deserialize, Serialize};

pub const ENV_AUTHORIZATION_ENABLED: &str = "CONDITION_START_AUTHORIZATION_ENABLED";
pub const ENV_TENANT_CHECK_ENABLED: &str = "CONDITION_START_TENANT_CHECK_ENABLED";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' (expected true/false)")]
    InvalidBool { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// When false every match is allowed.
    pub authorization_enabled: bool,
    /// When true, tenant membership is checked alongside grants.
    pub tenant_check_enabled: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            authorization_enabled: true,
            tenant_check_enabled: true,
        }
    }
}

impl CorrelationConfig {
    /// Defaults overridden by `CONDITION_START_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            authorization_enabled: read_bool(
                &lookup,
                ENV_AUTHORIZATION_ENABLED,
                defaults.authorization_enabled,
            )?,
            tenant_check_enabled: read_bool(
                &lookup,
                ENV_TENANT_CHECK_ENABLED,
                defaults.tenant_check_enabled,
            )?,
        })
    }
}

fn read_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = CorrelationConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, CorrelationConfig::default());
        assert!(cfg.authorization_enabled);
        assert!(cfg.tenant_check_enabled);
    }

    #[test]
    fn env_overrides() {
        let cfg = CorrelationConfig::from_lookup(lookup(&[
            (ENV_AUTHORIZATION_ENABLED, "false"),
            (ENV_TENANT_CHECK_ENABLED, " OFF "),
        ]))
        .unwrap();
        assert!(!cfg.authorization_enabled);
        assert!(!cfg.tenant_check_enabled);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = CorrelationConfig::from_lookup(lookup(&[(ENV_AUTHORIZATION_ENABLED, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_AUTHORIZATION_ENABLED));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: CorrelationConfig =
            serde_json::from_str(r#"{"tenant_check_enabled": false}"#).unwrap();
        assert!(cfg.authorization_enabled);
        assert!(!cfg.tenant_check_enabled);
    }
}
