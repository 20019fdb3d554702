//! Runtime configuration for MoodLog clients.
//!
//! A JSON file provides the base values; `MOODLOG_*` environment variables
//! override them. Blank values count as unset everywhere.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::FirestoreConfig;
use crate::util::normalize_text_option;
use crate::Result;

pub const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_DB_PATH: &str = "MOODLOG_DB_PATH";
pub const ENV_USER_ID: &str = "MOODLOG_USER_ID";
pub const ENV_FIRESTORE_PROJECT_ID: &str = "MOODLOG_FIRESTORE_PROJECT_ID";
pub const ENV_FIRESTORE_DATABASE: &str = "MOODLOG_FIRESTORE_DATABASE";
pub const ENV_FIRESTORE_BASE_URL: &str = "MOODLOG_FIRESTORE_BASE_URL";
pub const ENV_FIRESTORE_ID_TOKEN: &str = "MOODLOG_FIRESTORE_ID_TOKEN";
pub const ENV_FIRESTORE_API_KEY: &str = "MOODLOG_FIRESTORE_API_KEY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "MOODLOG_REQUEST_TIMEOUT_SECS";

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MoodLogConfig {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub firestore_project_id: Option<String>,
    #[serde(default)]
    pub firestore_database: Option<String>,
    #[serde(default)]
    pub firestore_base_url: Option<String>,
    #[serde(default)]
    pub firestore_id_token: Option<String>,
    #[serde(default)]
    pub firestore_api_key: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl MoodLogConfig {
    /// Load the config file. A missing file yields defaults; an unreadable or
    /// unparsable file is logged and also yields defaults.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(config) => config,
                Err(error) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), error);
                    Self::default()
                }
            },
            Err(error) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), error);
                Self::default()
            }
        };
        config.normalized()
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.clone().normalized())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; set values replace file values.
    #[must_use]
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(path) = read(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(user_id) = read(ENV_USER_ID) {
            self.user_id = Some(user_id);
        }
        if let Some(project_id) = read(ENV_FIRESTORE_PROJECT_ID) {
            self.firestore_project_id = Some(project_id);
        }
        if let Some(database) = read(ENV_FIRESTORE_DATABASE) {
            self.firestore_database = Some(database);
        }
        if let Some(base_url) = read(ENV_FIRESTORE_BASE_URL) {
            self.firestore_base_url = Some(base_url);
        }
        if let Some(token) = read(ENV_FIRESTORE_ID_TOKEN) {
            self.firestore_id_token = Some(token);
        }
        if let Some(key) = read(ENV_FIRESTORE_API_KEY) {
            self.firestore_api_key = Some(key);
        }
        if let Some(raw) = read(ENV_REQUEST_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = Some(secs),
                _ => tracing::warn!("Ignoring invalid {ENV_REQUEST_TIMEOUT_SECS} value '{raw}'"),
            }
        }
        self
    }

    /// Firestore settings, or `None` when no project id is configured.
    pub fn firestore_config(&self) -> Option<FirestoreConfig> {
        let project_id = normalize_text_option(self.firestore_project_id.clone())?;
        let mut config = FirestoreConfig::new(project_id);

        if let Some(database) = normalize_text_option(self.firestore_database.clone()) {
            config.database = database;
        }
        if let Some(base_url) = normalize_text_option(self.firestore_base_url.clone()) {
            config.base_url = base_url;
        }
        config.id_token = normalize_text_option(self.firestore_id_token.clone());
        config.api_key = normalize_text_option(self.firestore_api_key.clone());
        if let Some(secs) = self.request_timeout_secs.filter(|secs| *secs > 0) {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        Some(config)
    }

    fn normalized(self) -> Self {
        Self {
            db_path: self.db_path.filter(|path| !path.as_os_str().is_empty()),
            user_id: normalize_text_option(self.user_id),
            firestore_project_id: normalize_text_option(self.firestore_project_id),
            firestore_database: normalize_text_option(self.firestore_database),
            firestore_base_url: normalize_text_option(self.firestore_base_url),
            firestore_id_token: normalize_text_option(self.firestore_id_token),
            firestore_api_key: normalize_text_option(self.firestore_api_key),
            request_timeout_secs: self.request_timeout_secs.filter(|secs| *secs > 0),
        }
    }
}

impl fmt::Debug for MoodLogConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MoodLogConfig")
            .field("db_path", &self.db_path)
            .field("user_id", &self.user_id)
            .field("firestore_project_id", &self.firestore_project_id)
            .field("firestore_database", &self.firestore_database)
            .field("firestore_base_url", &self.firestore_base_url)
            .field(
                "firestore_id_token",
                &self.firestore_id_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "firestore_api_key",
                &self.firestore_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
