//! Configuration and settings management.
//!
//! This module provides service settings types and loading.
//! Settings come from an optional JSON file and the environment.

mod settings;

pub use settings::{
    AiSettings, IntakePolicies, IntakeSettings, MailSettings, ServerSettings, Settings,
    SettingsError, SiteSettings, StorageSettings, WebhookSettings,
};
