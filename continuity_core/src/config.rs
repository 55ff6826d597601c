//! Engine configuration.
//!
//! Everything is passed explicitly into the components that need it; there is
//! no process-wide configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collab::DEFAULT_LOCK_TTL_SECS;
use crate::continuity::Lexicon;
use crate::error::ConfigError;

/// Tunables for locking and aggregation.
///
/// ```toml
/// lock_ttl_secs = 300
/// visual_history_limit = 5
///
/// [lexicon]
/// weather = ["rain", "snow", "hail"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long an edit lock blocks other users.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Panel visuals kept per location.
    #[serde(default = "default_visual_history_limit")]
    pub visual_history_limit: usize,

    /// Art notes kept per location.
    #[serde(default = "default_atmosphere_history_limit")]
    pub atmosphere_history_limit: usize,

    /// Story events listed in a scene section.
    #[serde(default = "default_recent_events_limit")]
    pub recent_events_limit: usize,

    /// Keyword tables; any table left out keeps its built-in value.
    #[serde(default)]
    pub lexicon: Lexicon,
}

fn default_lock_ttl_secs() -> u64 {
    DEFAULT_LOCK_TTL_SECS as u64
}
fn default_visual_history_limit() -> usize {
    5
}
fn default_atmosphere_history_limit() -> usize {
    3
}
fn default_recent_events_limit() -> usize {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: default_lock_ttl_secs(),
            visual_history_limit: default_visual_history_limit(),
            atmosphere_history_limit: default_atmosphere_history_limit(),
            recent_events_limit: default_recent_events_limit(),
            lexicon: Lexicon::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_ttl_secs == 0 {
            return Err(ConfigError::Invalid("lock_ttl_secs must be positive".into()));
        }
        if i64::try_from(self.lock_ttl_secs).is_err() {
            return Err(ConfigError::Invalid("lock_ttl_secs is too large".into()));
        }
        if self.visual_history_limit == 0 {
            return Err(ConfigError::Invalid(
                "visual_history_limit must be at least 1".into(),
            ));
        }
        if self.atmosphere_history_limit == 0 {
            return Err(ConfigError::Invalid(
                "atmosphere_history_limit must be at least 1".into(),
            ));
        }
        self.lexicon.validate().map_err(ConfigError::Invalid)
    }

    pub fn lock_ttl(&self) -> chrono::Duration {
        let secs = i64::try_from(self.lock_ttl_secs).unwrap_or(DEFAULT_LOCK_TTL_SECS);
        chrono::Duration::seconds(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.lock_ttl(), chrono::Duration::minutes(5));
        assert_eq!(config.visual_history_limit, 5);
        assert_eq!(config.atmosphere_history_limit, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            lock_ttl_secs = 60

            [lexicon]
            weather = ["hail"]
            "#,
        )
        .unwrap();

        assert_eq!(config.lock_ttl(), chrono::Duration::seconds(60));
        assert_eq!(config.visual_history_limit, 5);
        assert_eq!(config.lexicon.weather, vec!["hail".to_string()]);
        assert_eq!(config.lexicon.emotions, Lexicon::default().emotions);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        let err = EngineConfig::from_toml_str("lock_ttl_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("visual_history_limit = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("lock_ttl_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/continuity.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
