//! Mail and AI provider implementations.
//!
//! This module contains provider traits and implementations for external services:
//!
//! - [`email`] - Transactional mail provider (Resend)
//! - [`ai`] - Text-generation provider (OpenAI-compatible gateway) and event extraction

pub mod ai;
pub mod email;
