//! Selection of the confirmation email for a processed registration.

use serde::{Deserialize, Serialize};

use crate::domain::{EventRegistration, FieldKey};

/// Failure reason used when the email carried no text to extract from.
pub const NO_TEXT_REASON: &str = "Email has no text content to process";

/// Failure reason used when extraction exhausted its attempts.
pub fn extraction_failed_reason(attempts: u32) -> String {
    format!("Failed to extract event details after {attempts} attempts")
}

/// Which confirmation the sender of an email receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome {
    /// Nothing could be extracted; the user has to enter the event manually.
    Failed { reason: String },
    /// An event was extracted but required fields are absent.
    MissingData { missing: Vec<FieldKey> },
    /// Every required field is present.
    Success,
}

impl Outcome {
    /// Subject line of the confirmation email.
    pub fn subject(&self) -> &'static str {
        match self {
            Outcome::Failed { .. } => "Veranstaltung - Manuelle Eingabe erforderlich",
            Outcome::MissingData { .. } => "Veranstaltung - Fehlende Details",
            Outcome::Success => "Veranstaltung bestätigt",
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Failed { .. } => "failed",
            Outcome::MissingData { .. } => "missing-data",
            Outcome::Success => "success",
        }
    }
}

/// Picks the confirmation for a registration.
///
/// A failed extraction always wins over whatever fields the registration holds.
pub fn classify(extraction: Result<(), String>, registration: &EventRegistration) -> Outcome {
    if let Err(reason) = extraction {
        return Outcome::Failed { reason };
    }

    let missing = registration.missing_fields();
    if missing.is_empty() {
        Outcome::Success
    } else {
        Outcome::MissingData { missing }
    }
}
