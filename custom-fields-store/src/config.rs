//! Store configuration loaded with Figment
//!
//! Sources in precedence order (later override earlier):
//! 1. Defaults
//! 2. An optional configuration file (TOML, YAML or JSON by extension)
//! 3. Environment variables prefixed `CUSTOM_FIELDS_`

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Result, StoreError};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CUSTOM_FIELDS_";

/// Configuration for [`CustomFields`](crate::CustomFields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file. `None` opens an in-memory database.
    pub database_path: Option<PathBuf>,
    /// Locale used when a read passes no locale, and as the translation
    /// fallback.
    pub default_locale: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            default_locale: "en".to_string(),
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by the environment.
    pub fn load() -> Result<Self> {
        Self::extract(Self::base_figment())
    }

    /// Defaults overridden by `path`, then by the environment.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        trace!(path = %path.display(), "loading custom fields configuration file");

        let file = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Figment::from(Toml::file(path)),
            Some("yaml") | Some("yml") => Figment::from(Yaml::file(path)),
            Some("json") => Figment::from(Json::file(path)),
            _ => {
                return Err(StoreError::InvalidConfig {
                    key: "path".to_string(),
                    message: format!("unsupported configuration format: {}", path.display()),
                })
            }
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(StoreConfig::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX));
        Self::extract(figment)
    }

    /// Point at a database file.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Reject values that load but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.default_locale.trim().is_empty() {
            return Err(StoreError::InvalidConfig {
                key: "default_locale".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn base_figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(StoreConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: StoreConfig = figment.extract()?;
        config.validate()?;
        debug!(
            database = ?config.database_path,
            default_locale = %config.default_locale,
            "loaded custom fields configuration"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn clear_env() {
        std::env::remove_var("CUSTOM_FIELDS_DEFAULT_LOCALE");
        std::env::remove_var("CUSTOM_FIELDS_DATABASE_PATH");
    }

    #[test]
    #[serial]
    fn defaults_without_sources() {
        clear_env();
        let config = StoreConfig::load().unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.default_locale, "en");
        assert!(config.database_path.is_none());
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        clear_env();
        std::env::set_var("CUSTOM_FIELDS_DEFAULT_LOCALE", "ar");
        std::env::set_var("CUSTOM_FIELDS_DATABASE_PATH", "/tmp/fields.db");

        let config = StoreConfig::load().unwrap();
        clear_env();

        assert_eq!(config.default_locale, "ar");
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/fields.db")));
    }

    #[test]
    #[serial]
    fn file_values_then_environment() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fields.toml");
        fs::write(&path, "default_locale = \"fr\"\ndatabase_path = \"data.db\"\n").unwrap();

        let config = StoreConfig::load_from_file(&path).unwrap();
        assert_eq!(config.default_locale, "fr");
        assert_eq!(config.database_path, Some(PathBuf::from("data.db")));

        std::env::set_var("CUSTOM_FIELDS_DEFAULT_LOCALE", "de");
        let config = StoreConfig::load_from_file(&path).unwrap();
        clear_env();
        assert_eq!(config.default_locale, "de");
    }

    #[test]
    #[serial]
    fn yaml_file_is_read() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fields.yaml");
        fs::write(&path, "default_locale: ar\n").unwrap();

        let config = StoreConfig::load_from_file(&path).unwrap();
        assert_eq!(config.default_locale, "ar");
        assert!(config.database_path.is_none());
    }

    #[test]
    #[serial]
    fn empty_locale_rejected() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fields.json");
        fs::write(&path, r#"{"default_locale": "  "}"#).unwrap();

        let err = StoreConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig { ref key, .. } if key == "default_locale"));
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = StoreConfig::load_from_file("fields.ini").unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig { .. }));
    }
}
