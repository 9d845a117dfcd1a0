//! Inbound email domain types.
//!
//! Represents a raw email received by the intake mailbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EmailId, InboundEmailId, MessageId, RegistrationId};

/// An email received by the intake mailbox.
///
/// Created once by the fetch-and-save step. Only `processed` and
/// `registration_id` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEmail {
    /// Local identifier of this record.
    pub id: InboundEmailId,
    /// Identifier assigned by the mail provider.
    pub email_id: EmailId,
    /// Sender address, as delivered by the provider.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Message-ID header, if the provider exposed one.
    pub message_id: Option<MessageId>,
    /// When the record was stored.
    pub received_at: DateTime<Utc>,
    /// Whether a registration has been created for this email.
    pub processed: bool,
    /// Registration created for this email.
    pub registration_id: Option<RegistrationId>,
}

impl InboundEmail {
    /// Returns the plain text body if it has any non-whitespace content.
    pub fn text_content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Returns the bare address of the sender.
    ///
    /// Accepts both `"Name <addr@example.com>"` and a plain address.
    pub fn sender_address(&self) -> &str {
        let value = self.from.trim();
        if let (Some(start), Some(end)) = (value.find('<'), value.rfind('>')) {
            if start < end {
                return value[start + 1..end].trim();
            }
        }
        value
    }
}
