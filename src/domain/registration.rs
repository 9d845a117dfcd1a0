//! Event registration domain types.
//!
//! A registration is the draft event created for every inbound email. It is
//! filled by AI extraction, may be edited through its access link, and is
//! finally promoted into a real event.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::extraction::{local_midnight, ExtractedEvent};
use super::{AccessId, EventId, InboundEmailId, RegistrationId};

/// Draft event candidate derived from one inbound email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistration {
    /// Local identifier.
    pub id: RegistrationId,
    /// Public token used in the edit link.
    pub access_id: AccessId,
    /// Email this registration was created for.
    pub email_id: InboundEmailId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub label: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    /// Whether the confirmation email has been delivered.
    pub response_sent: bool,
    /// Finalized event, once promoted.
    pub event_id: Option<EventId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRegistration {
    /// Creates an empty registration with a fresh access identifier.
    pub fn empty(email_id: InboundEmailId) -> Self {
        let now = Utc::now();
        Self {
            id: RegistrationId::generate(),
            access_id: AccessId::generate(),
            email_id,
            title: None,
            description: None,
            location: None,
            label: None,
            start: None,
            end: None,
            all_day: None,
            response_sent: false,
            event_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the registration was promoted and is therefore read-only.
    pub fn is_promoted(&self) -> bool {
        self.event_id.is_some()
    }

    /// Overwrites every extractable field with the values of `event`.
    ///
    /// Fields absent from the extraction end up unset.
    pub fn merge_extraction(&mut self, event: &ExtractedEvent) {
        self.title = Some(event.title.clone());
        self.description = event.description.clone();
        self.location = event.location.clone();
        self.label = event.label.clone();
        self.start = Some(event.start);
        self.end = Some(event.end);
        self.all_day = event.all_day;
        self.updated_at = Utc::now();
    }

    /// Applies a partial update. Fields left `None` in the patch are untouched.
    pub fn apply_patch(&mut self, patch: &RegistrationPatch, tz: Tz) {
        if let Some(title) = &patch.title {
            self.title = Some(title.clone());
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        if let Some(label) = &patch.label {
            self.label = Some(label.clone());
        }
        if let Some(start) = patch.start {
            self.start = Some(start);
        }
        if let Some(end) = patch.end {
            self.end = Some(end);
        }
        if let Some(all_day) = patch.all_day {
            self.all_day = Some(all_day);
        }
        if self.all_day == Some(true) {
            self.start = self.start.map(|start| local_midnight(start, tz));
            self.end = self.end.map(|end| local_midnight(end, tz));
        }
        self.updated_at = Utc::now();
    }

    /// Returns the required fields that are absent or blank, in display order.
    pub fn missing_fields(&self) -> Vec<FieldKey> {
        FieldKey::REQUIRED
            .into_iter()
            .filter(|key| !self.has_field(*key))
            .collect()
    }

    /// Whether a required field carries a usable value.
    pub fn has_field(&self, key: FieldKey) -> bool {
        fn filled(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        match key {
            FieldKey::Title => filled(&self.title),
            FieldKey::Description => filled(&self.description),
            FieldKey::Location => filled(&self.location),
            FieldKey::Start => self.start.is_some(),
            FieldKey::End => self.end.is_some(),
        }
    }
}

/// The fields a complete registration must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKey {
    Title,
    Description,
    Location,
    Start,
    End,
}

impl FieldKey {
    /// All required fields, in the order they are shown to users.
    pub const REQUIRED: [FieldKey; 5] = [
        FieldKey::Title,
        FieldKey::Description,
        FieldKey::Location,
        FieldKey::Start,
        FieldKey::End,
    ];

    /// German label shown in confirmation emails.
    pub fn label(self) -> &'static str {
        match self {
            FieldKey::Title => "Titel",
            FieldKey::Description => "Beschreibung",
            FieldKey::Location => "Ort",
            FieldKey::Start => "Startdatum",
            FieldKey::End => "Enddatum",
        }
    }
}

/// Partial update of the user-editable registration fields.
///
/// Unknown keys are rejected during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistrationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

impl RegistrationPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
