//! Delivery of confirmation emails.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::classification::Outcome;
use super::renderer::{ConfirmationRenderer, EventSummary};
use crate::domain::RegistrationId;
use crate::providers::email::{MailProvider, OutgoingEmail, ProviderError};
use crate::storage::queries::{emails, registrations};
use crate::storage::{Database, DatabaseError};

/// Errors that can occur while sending a confirmation.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("registration not found: {0}")]
    RegistrationNotFound(RegistrationId),

    #[error("email for registration {0} not found")]
    EmailNotFound(RegistrationId),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Result of a send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Delivery {
    /// The provider accepted the message.
    Sent { message_id: String },
    /// A confirmation had been delivered before; nothing was sent.
    AlreadySent,
}

/// Renders and sends the confirmation for a registration.
#[derive(Clone)]
pub struct MailSender {
    db: Database,
    provider: Arc<dyn MailProvider>,
    renderer: ConfirmationRenderer,
    tz: Tz,
}

impl MailSender {
    pub fn new(
        db: Database,
        provider: Arc<dyn MailProvider>,
        renderer: ConfirmationRenderer,
        tz: Tz,
    ) -> Self {
        Self {
            db,
            provider,
            renderer,
            tz,
        }
    }

    /// Sends the confirmation for `outcome` to the sender of the original email.
    ///
    /// `responseSent` is set only after the provider accepted the message, and
    /// a registration that already has it set is never mailed again. A failure
    /// to record the flag after acceptance is logged, not returned.
    pub async fn send_confirmation(
        &self,
        registration_id: &RegistrationId,
        outcome: &Outcome,
    ) -> Result<Delivery, SendError> {
        let registration = registrations::get_by_id(&self.db, registration_id)
            .await?
            .ok_or_else(|| SendError::RegistrationNotFound(registration_id.clone()))?;

        if registration.response_sent {
            warn!(registration_id = %registration.id, "confirmation already sent, skipping");
            return Ok(Delivery::AlreadySent);
        }

        let email = emails::get_by_id(&self.db, &registration.email_id)
            .await?
            .ok_or_else(|| SendError::EmailNotFound(registration_id.clone()))?;

        let summary = EventSummary::from_registration(&registration, self.tz);
        let rendered = self
            .renderer
            .render(outcome, &summary, &registration.access_id);

        let outgoing = OutgoingEmail {
            to: vec![email.sender_address().to_string()],
            subject: rendered.subject,
            html: rendered.html,
            text: Some(rendered.text),
            in_reply_to: email.message_id.clone(),
        };

        let receipt = self.provider.send(&outgoing).await?;

        // Accepted: the step must not fail from here on, or it is resent.
        if let Err(e) = registrations::mark_response_sent(&self.db, &registration.id).await {
            error!(
                registration_id = %registration.id,
                provider_id = %receipt.id,
                error = %e,
                "confirmation sent but responseSent could not be recorded"
            );
        }

        info!(
            registration_id = %registration.id,
            outcome = outcome.kind(),
            provider_id = %receipt.id,
            "confirmation sent"
        );
        Ok(Delivery::Sent {
            message_id: receipt.id,
        })
    }
}
