//! Database storage.
//!
//! This module provides the storage layer for the intake service:
//!
//! - SQLite database for inbound emails, registrations and the workflow journal
//! - Async-safe database operations via tokio::task::spawn_blocking

mod database;
pub mod queries;
mod schema;

pub use database::{Database, DatabaseError, Result};
