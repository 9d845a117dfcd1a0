//! Mail provider trait definition.
//!
//! This module defines the [`MailProvider`] trait which abstracts over the
//! transactional mail service: retrieving an email the service received and
//! sending a message on behalf of the branded sender.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{EmailId, MessageId};

/// Result type alias for mail provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during mail provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or the API key was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP response.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The response could not be decoded.
    #[error("internal error: {0}")]
    Internal(String),
}

/// An email as retrieved from the provider's receiving endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedEmail {
    /// Provider identifier of the email.
    pub email_id: EmailId,
    /// Sender, possibly in `Name <addr>` form.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Value of the `Message-ID` header.
    pub message_id: Option<MessageId>,
}

/// An email to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Email subject.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain text alternative.
    pub text: Option<String>,
    /// Message-ID of the email being replied to.
    pub in_reply_to: Option<MessageId>,
}

/// Acknowledgement returned by the provider for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider identifier of the sent message.
    pub id: String,
}

/// Trait for transactional mail providers.
///
/// Implementations must be `Send + Sync` so one instance can be shared by all
/// concurrently running intake workflows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Retrieves an email the provider received.
    ///
    /// Any non-success response is an error.
    async fn fetch_received(&self, email_id: &EmailId) -> Result<ReceivedEmail>;

    /// Sends an email from the configured sender address.
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt>;
}
