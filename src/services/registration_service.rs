//! Registration service for access-link edits and promotion.
//!
//! Provides a service layer for registration operations including:
//! - Lookup by the public access identifier
//! - Partial edits while the registration is still a draft
//! - Promotion into a finalized event

use chrono_tz::Tz;
use thiserror::Error;
use tracing::info;

use crate::domain::{AccessId, EventId, EventRegistration, RegistrationId, RegistrationPatch};
use crate::storage::queries::registrations;
use crate::storage::{Database, DatabaseError};

/// Errors that can occur during registration operations.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// No registration for the given identifier.
    #[error("registration not found: {0}")]
    NotFound(String),

    /// The registration was promoted and can no longer be edited.
    #[error("registration {0} has already been accepted")]
    Promoted(RegistrationId),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Reads and edits registrations.
#[derive(Debug, Clone)]
pub struct RegistrationService {
    db: Database,
    tz: Tz,
}

impl RegistrationService {
    pub fn new(db: Database, tz: Tz) -> Self {
        Self { db, tz }
    }

    /// Gets a registration by its access identifier.
    pub async fn get_by_access_id(&self, access_id: &AccessId) -> RegistrationResult<EventRegistration> {
        registrations::get_by_access_id(&self.db, access_id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound(access_id.to_string()))
    }

    /// Applies a partial edit through the access link.
    pub async fn update(
        &self,
        access_id: &AccessId,
        patch: &RegistrationPatch,
    ) -> RegistrationResult<EventRegistration> {
        let mut registration = self.get_by_access_id(access_id).await?;
        if registration.is_promoted() {
            return Err(RegistrationError::Promoted(registration.id));
        }
        if patch.is_empty() {
            return Ok(registration);
        }

        registration.apply_patch(patch, self.tz);
        if !registrations::update_fields(&self.db, &registration).await? {
            return Err(RegistrationError::Promoted(registration.id));
        }

        info!(registration_id = %registration.id, "registration updated");
        Ok(registration)
    }

    /// Links a registration to its finalized event. After this the
    /// registration is read-only.
    pub async fn promote(
        &self,
        registration_id: &RegistrationId,
        event_id: &EventId,
    ) -> RegistrationResult<EventRegistration> {
        let mut registration = registrations::get_by_id(&self.db, registration_id)
            .await?
            .ok_or_else(|| RegistrationError::NotFound(registration_id.to_string()))?;

        if !registrations::set_event(&self.db, registration_id, event_id).await? {
            return Err(RegistrationError::Promoted(registration.id));
        }

        info!(registration_id = %registration.id, event_id = %event_id, "registration promoted");
        registration.event_id = Some(event_id.clone());
        Ok(registration)
    }
}
