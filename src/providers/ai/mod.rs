//! AI/LLM provider implementations.
//!
//! This module provides the text-generation interface used for event
//! extraction, one OpenAI-compatible HTTP implementation, and the
//! [`EventExtractor`] built on top of it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use event_intake::providers::ai::{EventExtractor, OpenAiCompatibleProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAiCompatibleProvider::gateway("key", "openai/gpt-4o-mini");
//! let extractor = EventExtractor::new(Arc::new(provider), chrono_tz::Europe::Berlin);
//!
//! let event = extractor.extract("Elternabend am 14. Januar, 18 Uhr, Aula").await?;
//! println!("{} at {}", event.title, event.start);
//! # Ok(())
//! # }
//! ```

mod extractor;
mod openai;
mod traits;

pub use extractor::{EventExtractor, ExtractionError};
pub use openai::{OpenAiCompatibleProvider, AI_GATEWAY_BASE_URL};
pub use traits::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, LlmResult,
    Message, Role, TokenUsage,
};

#[cfg(test)]
pub use traits::MockLlmProvider;
