//! Event extraction from free-form email text.
//!
//! Wraps a single completion call. Retrying is left to the caller so that the
//! number of attempts stays visible to the workflow.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::debug;

use super::traits::{CompletionRequest, LlmError, LlmProvider, Message};
use crate::domain::time::format_long;
use crate::domain::{ExtractedEvent, ExtractionResult, TimestampError};

/// Errors produced while extracting an event.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no text to extract from")]
    EmptyInput,

    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model output does not match the event schema: {0}")]
    Schema(String),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

/// Upper bound on the model's answer; one event object fits easily.
const MAX_OUTPUT_TOKENS: usize = 1024;

/// Turns email text into a structured event candidate.
#[derive(Clone)]
pub struct EventExtractor {
    provider: Arc<dyn LlmProvider>,
    tz: Tz,
    temperature: f32,
}

impl EventExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, tz: Tz) -> Self {
        Self {
            provider,
            tz,
            temperature: 0.0,
        }
    }

    /// Overrides the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Extracts an event from `text`, interpreting relative dates against now.
    pub async fn extract(&self, text: &str) -> Result<ExtractedEvent, ExtractionError> {
        self.extract_at(text, Utc::now()).await
    }

    /// Extracts an event from `text`, interpreting relative dates against `now`.
    pub async fn extract_at(
        &self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<ExtractedEvent, ExtractionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let request = self.build_request(text, now);
        let response = self.provider.complete(&request).await?;
        debug!(tokens = response.tokens_used.total_tokens, "extraction completed");

        let result = parse_output(&response.text)?;
        Ok(result.into_event(self.tz)?)
    }

    fn build_request(&self, text: &str, now: DateTime<Utc>) -> CompletionRequest {
        CompletionRequest::new(vec![Message::user(text)])
            .with_system_prompt(system_prompt(&format_long(now, self.tz), self.tz))
            .with_temperature(self.temperature)
            .with_max_tokens(MAX_OUTPUT_TOKENS)
            .with_json_output()
    }
}

fn system_prompt(now: &str, tz: Tz) -> String {
    format!(
        "You extract a single school event from an email.\n\
         The current date and time is {now} ({tz}).\n\
         All times mentioned in the email are local times in the {tz} time zone.\n\
         If the email mentions only a time without a date, assume today, or the next \
         future occurrence of that time if it has already passed.\n\
         Answer with one JSON object and nothing else, using these keys:\n\
         - \"title\": string, required\n\
         - \"start\": ISO-8601 date-time including the UTC offset, required\n\
         - \"end\": ISO-8601 date-time including the UTC offset, required\n\
         - \"description\": string or null\n\
         - \"location\": string or null\n\
         - \"allDay\": boolean or null\n\
         - \"label\": string or null"
    )
}

/// Parses the model output into an [`ExtractionResult`].
///
/// Tolerates a surrounding Markdown code fence.
fn parse_output(raw: &str) -> Result<ExtractionResult, ExtractionError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let result: ExtractionResult =
        serde_json::from_str(body).map_err(|e| ExtractionError::Schema(e.to_string()))?;

    if result.title.trim().is_empty() {
        return Err(ExtractionError::Schema("title is empty".to_string()));
    }

    Ok(result)
}
