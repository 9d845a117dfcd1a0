//! Business services layer.
//!
//! This module contains the services that implement the intake rules,
//! coordinating between providers, storage, the workflow engine and domain
//! types.
//!
//! # Architecture
//!
//! ```text
//! HTTP surface (webhook, access-link API)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Workflow engine, Providers, Storage
//! ```
//!
//! # Services Overview
//!
//! - [`IntakeWorkflow`]: drives one received email to a confirmation reply
//! - [`classify`]: picks the confirmation template for a registration
//! - [`ConfirmationRenderer`]: renders the three confirmation templates
//! - [`MailSender`]: sends a confirmation at most once per registration
//! - [`RegistrationService`]: access-link reads, edits and promotion
//! - [`LoggingCompletionHook`]: reports finished runs

mod classification;
mod completion;
mod intake;
mod mail_sender;
mod registration_service;
mod renderer;

pub use classification::{classify, extraction_failed_reason, Outcome, NO_TEXT_REASON};
pub use completion::LoggingCompletionHook;
pub use intake::{IntakeInput, IntakeWorkflow};
pub use mail_sender::{Delivery, MailSender, SendError};
pub use registration_service::{RegistrationError, RegistrationResult, RegistrationService};
pub use renderer::{ConfirmationRenderer, EventSummary, RenderedEmail};
