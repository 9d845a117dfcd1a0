//! Resend API provider implementation.
//!
//! Uses the REST API with bearer-token authentication:
//! - `GET /emails/receiving/{id}` to retrieve an inbound email
//! - `POST /emails` to send

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    MailProvider, OutgoingEmail, ProviderError, ReceivedEmail, Result, SendReceipt,
};
use crate::domain::{EmailId, MessageId};

/// Default Resend API base URL.
pub const RESEND_API_BASE: &str = "https://api.resend.com";

/// Received email as returned by the receiving endpoint.
#[derive(Debug, Deserialize)]
struct ResendReceivedEmail {
    from: String,
    #[serde(default)]
    to: Vec<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    headers: HashMap<String, serde_json::Value>,
}

/// Send request body.
#[derive(Debug, Serialize)]
struct ResendSendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<&'static str, String>,
}

#[derive(Debug, Deserialize)]
struct ResendSendResponse {
    id: String,
}

/// Mail provider backed by the Resend API.
pub struct ResendProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl ResendProvider {
    /// Creates a provider for the public Resend API.
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self::with_base_url(RESEND_API_BASE, api_key, from)
    }

    /// Creates a provider for a custom API base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }

    /// Overrides the HTTP client (useful for custom timeouts).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The branded sender address.
    pub fn from_address(&self) -> &str {
        &self.from
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| ProviderError::Internal(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    fn build_send_request<'a>(&'a self, email: &'a OutgoingEmail) -> ResendSendRequest<'a> {
        let mut headers = HashMap::new();
        if let Some(ref message_id) = email.in_reply_to {
            headers.insert("In-Reply-To", message_id.to_string());
            headers.insert("References", message_id.to_string());
        }

        ResendSendRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: email.text.as_deref(),
            headers,
        }
    }

    /// Handles API error responses.
    async fn handle_error(&self, response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();

        error_for_status(status, retry_after, body)
    }
}

fn error_for_status(status: u16, retry_after_secs: Option<u64>, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Authentication(format!("unauthorized ({}): {}", status, body)),
        404 => ProviderError::NotFound(body),
        429 => ProviderError::RateLimited { retry_after_secs },
        _ => ProviderError::Api { status, body },
    }
}

impl ResendReceivedEmail {
    fn into_received(self, email_id: &EmailId) -> ReceivedEmail {
        let header_message_id = self
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("message-id"))
            .and_then(|(_, value)| value.as_str())
            .map(str::to_string);

        ReceivedEmail {
            email_id: email_id.clone(),
            from: self.from,
            to: self.to,
            subject: self.subject.unwrap_or_default(),
            text: self.text,
            html: self.html,
            message_id: header_message_id
                .or(self.message_id)
                .filter(|id| !id.trim().is_empty())
                .map(MessageId::from),
        }
    }
}

#[async_trait]
impl MailProvider for ResendProvider {
    async fn fetch_received(&self, email_id: &EmailId) -> Result<ReceivedEmail> {
        let url = format!("{}/emails/receiving/{}", self.base_url, email_id);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }

        let email: ResendReceivedEmail = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))?;

        debug!(%email_id, "fetched received email");
        Ok(email.into_received(email_id))
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt> {
        let url = format!("{}/emails", self.base_url);
        let body = self.build_send_request(email);

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }

        let sent: ResendSendResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))?;

        Ok(SendReceipt { id: sent.id })
    }
}
