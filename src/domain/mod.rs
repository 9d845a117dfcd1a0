//! Domain layer types for the event intake service.
//!
//! This module contains the core domain types used throughout the service:
//! inbound emails, event registrations, and AI extraction results.

mod email;
mod extraction;
mod registration;
pub mod time;
mod types;

pub use email::InboundEmail;
pub use extraction::{ExtractedEvent, ExtractionResult, TimestampError};
pub use registration::{EventRegistration, FieldKey, RegistrationPatch};
pub use types::{AccessId, EmailId, EventId, InboundEmailId, MessageId, RegistrationId};
