//! Service settings and configuration types.
//!
//! Settings are read from `settings.json` in the platform config directory
//! (for example `~/.config/event-intake/settings.json`) when present, then
//! overridden by environment variables. Secrets are normally supplied only
//! through the environment.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::workflow::RetryPolicy;

/// Errors that can occur while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid site URL {value:?}: {source}")]
    InvalidSiteUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown time zone {0:?}")]
    InvalidTimeZone(String),
}

/// Top-level service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Public web application.
    pub site: SiteSettings,
    /// Transactional mail provider.
    pub mail: MailSettings,
    /// Text-generation provider.
    pub ai: AiSettings,
    /// Inbound webhook verification.
    pub webhook: WebhookSettings,
    /// Local database.
    pub storage: StorageSettings,
    /// Intake workflow behavior.
    pub intake: IntakeSettings,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind, e.g. `0.0.0.0:3000`.
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Public site configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Base URL of the web application that hosts the edit pages.
    pub url: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
        }
    }
}

/// Mail provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    /// API base URL.
    pub api_base_url: String,
    /// API key. Usually provided via `RESEND_API_KEY`.
    pub api_key: String,
    /// Branded sender used for every confirmation.
    pub from_address: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            api_base_url: crate::providers::email::RESEND_API_BASE.to_string(),
            api_key: String::new(),
            from_address: "Veranstaltungen <veranstaltungen@example.org>".to_string(),
        }
    }
}

/// Text-generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// API key. Usually provided via `AI_GATEWAY_API_KEY`.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: crate::providers::ai::AI_GATEWAY_BASE_URL.to_string(),
            api_key: String::new(),
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.0,
        }
    }
}

/// Webhook verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    /// Signing secret (`whsec_...`).
    pub secret: String,
    /// Accepted clock skew for signed timestamps, in seconds.
    pub tolerance_secs: i64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            tolerance_secs: 300,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let database_path = project_dirs()
            .map(|dirs| dirs.data_dir().join("event-intake.db"))
            .unwrap_or_else(|| PathBuf::from("event-intake.db"));
        Self { database_path }
    }
}

/// Intake workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeSettings {
    /// IANA time zone used to interpret and display local times.
    pub time_zone: String,
    /// Per-step retry policies.
    pub policies: IntakePolicies,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            time_zone: "Europe/Berlin".to_string(),
            policies: IntakePolicies::default(),
        }
    }
}

/// Retry policies for the steps of the intake workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakePolicies {
    pub fetch: RetryPolicy,
    pub create_registration: RetryPolicy,
    pub extract: RetryPolicy,
    pub send: RetryPolicy,
}

impl Default for IntakePolicies {
    fn default() -> Self {
        Self {
            fetch: RetryPolicy::exponential(3, 1_000, 2),
            create_registration: RetryPolicy::none(),
            extract: RetryPolicy::exponential(2, 2_000, 2),
            send: RetryPolicy::exponential(3, 2_000, 2),
        }
    }
}

impl IntakePolicies {
    /// Same attempt counts with every backoff removed.
    pub fn without_backoff(self) -> Self {
        Self {
            fetch: self.fetch.without_backoff(),
            create_registration: self.create_registration.without_backoff(),
            extract: self.extract.without_backoff(),
            send: self.send.without_backoff(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "event-intake", "event-intake")
}

impl Settings {
    /// Default location of the settings file, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads settings from the default file (if present) and the process
    /// environment.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Loads settings from a JSON file. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded settings file");
        Ok(settings)
    }

    /// Applies environment overrides using `lookup` to read variables.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("SITE_URL") {
            self.site.url = value;
        }
        if let Some(value) = get("RESEND_API_KEY") {
            self.mail.api_key = value;
        }
        if let Some(value) = get("AI_GATEWAY_API_KEY") {
            self.ai.api_key = value;
        }
        if let Some(value) = get("RESEND_WEBHOOK_SECRET") {
            self.webhook.secret = value;
        }
        if let Some(value) = get("DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(value);
        }
        if let Some(value) = get("BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = get("AI_MODEL") {
            self.ai.model = value;
        }
    }

    /// Checks that every required value is present and well-formed.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut missing = Vec::new();
        if self.mail.api_key.trim().is_empty() {
            missing.push("RESEND_API_KEY");
        }
        if self.ai.api_key.trim().is_empty() {
            missing.push("AI_GATEWAY_API_KEY");
        }
        if self.webhook.secret.trim().is_empty() {
            missing.push("RESEND_WEBHOOK_SECRET");
        }
        if !missing.is_empty() {
            return Err(SettingsError::Missing(missing));
        }

        self.site_url()?;
        self.time_zone()?;
        Ok(())
    }

    /// Parsed public site URL.
    pub fn site_url(&self) -> Result<Url, SettingsError> {
        Url::parse(&self.site.url).map_err(|source| SettingsError::InvalidSiteUrl {
            value: self.site.url.clone(),
            source,
        })
    }

    /// Parsed intake time zone.
    pub fn time_zone(&self) -> Result<Tz, SettingsError> {
        self.intake
            .time_zone
            .parse::<Tz>()
            .map_err(|_| SettingsError::InvalidTimeZone(self.intake.time_zone.clone()))
    }
}
