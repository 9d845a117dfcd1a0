//! event-intake - Turns emails into event registrations
//!
//! This crate provides the core functionality for the email intake service:
//! fetching received emails, AI extraction of event details, durable
//! multi-step workflow execution, confirmation emails, and the HTTP surface
//! that ties them together.

pub mod config;
pub mod domain;
pub mod providers;
pub mod server;
pub mod services;
pub mod storage;
pub mod workflow;

pub use config::Settings;
pub use services::{IntakeInput, IntakeWorkflow};
pub use workflow::WorkflowManager;
