//! Event registration operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{AccessId, EventId, EventRegistration, InboundEmailId, RegistrationId};
use crate::storage::database::{Database, DatabaseError, Result};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, access_id, email_id, title, description, location, label,
        start_at, end_at, all_day, response_sent, event_id, created_at, updated_at
    FROM event_registrations
"#;

/// Inserts an empty registration for `email_id` and links the email to it.
///
/// Both writes happen in one transaction. Fails if the email already has a
/// registration.
pub async fn create_for_email(
    db: &Database,
    email_id: &InboundEmailId,
) -> Result<EventRegistration> {
    let registration = EventRegistration::empty(email_id.clone());
    let stored = registration.clone();

    db.transaction(move |tx| {
        tx.execute(
            r#"
            INSERT INTO event_registrations (
                id, access_id, email_id, response_sent, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?5)
            "#,
            params![
                stored.id.0,
                stored.access_id.0,
                stored.email_id.0,
                stored.created_at.to_rfc3339(),
                stored.updated_at.to_rfc3339(),
            ],
        )?;

        let updated = tx.execute(
            "UPDATE inbound_emails SET processed = 1, registration_id = ?1 WHERE id = ?2",
            params![stored.id.0, stored.email_id.0],
        )?;
        if updated == 0 {
            return Err(DatabaseError::NotFound(format!(
                "inbound email {}",
                stored.email_id
            )));
        }

        Ok(())
    })
    .await?;

    Ok(registration)
}

/// Retrieves a registration by its local ID.
pub async fn get_by_id(db: &Database, id: &RegistrationId) -> Result<Option<EventRegistration>> {
    let id = id.clone();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let result = conn
            .query_row(&sql, [&id.0], row_to_registration)
            .optional()?;
        Ok(result)
    })
    .await
}

/// Retrieves a registration by its public access identifier.
pub async fn get_by_access_id(
    db: &Database,
    access_id: &AccessId,
) -> Result<Option<EventRegistration>> {
    let access_id = access_id.clone();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_COLUMNS} WHERE access_id = ?1");
        let result = conn
            .query_row(&sql, [&access_id.0], row_to_registration)
            .optional()?;
        Ok(result)
    })
    .await
}

/// Retrieves the registration created for an inbound email.
pub async fn get_by_email(
    db: &Database,
    email_id: &InboundEmailId,
) -> Result<Option<EventRegistration>> {
    let email_id = email_id.clone();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_COLUMNS} WHERE email_id = ?1");
        let result = conn
            .query_row(&sql, [&email_id.0], row_to_registration)
            .optional()?;
        Ok(result)
    })
    .await
}

/// Writes the editable fields of a registration back to the database.
///
/// Returns `false` if the registration is unknown or was promoted meanwhile.
pub async fn update_fields(db: &Database, registration: &EventRegistration) -> Result<bool> {
    let reg = registration.clone();

    db.with_conn(move |conn| {
        let updated = conn.execute(
            r#"
            UPDATE event_registrations SET
                title = ?1, description = ?2, location = ?3, label = ?4,
                start_at = ?5, end_at = ?6, all_day = ?7, updated_at = ?8
            WHERE id = ?9 AND event_id IS NULL
            "#,
            params![
                reg.title,
                reg.description,
                reg.location,
                reg.label,
                reg.start.map(|dt| dt.to_rfc3339()),
                reg.end.map(|dt| dt.to_rfc3339()),
                reg.all_day.map(|b| b as i32),
                reg.updated_at.to_rfc3339(),
                reg.id.0,
            ],
        )?;
        Ok(updated == 1)
    })
    .await
}

/// Marks the confirmation email for a registration as delivered.
pub async fn mark_response_sent(db: &Database, id: &RegistrationId) -> Result<()> {
    let id = id.clone();

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE event_registrations SET response_sent = 1, updated_at = ?1 WHERE id = ?2",
            params![now, id.0],
        )?;
        if updated == 0 {
            return Err(DatabaseError::NotFound(format!("registration {}", id)));
        }
        Ok(())
    })
    .await
}

/// Links a registration to a finalized event.
///
/// Returns `false` if the registration was already promoted.
pub async fn set_event(db: &Database, id: &RegistrationId, event_id: &EventId) -> Result<bool> {
    let id = id.clone();
    let event_id = event_id.clone();

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            r#"
            UPDATE event_registrations SET event_id = ?1, updated_at = ?2
            WHERE id = ?3 AND event_id IS NULL
            "#,
            params![event_id.0, now, id.0],
        )?;
        Ok(updated == 1)
    })
    .await
}

fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_registration(row: &Row<'_>) -> std::result::Result<EventRegistration, rusqlite::Error> {
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;
    let all_day: Option<i32> = row.get(9)?;
    let event_id: Option<String> = row.get(11)?;

    Ok(EventRegistration {
        id: RegistrationId(row.get(0)?),
        access_id: AccessId(row.get(1)?),
        email_id: InboundEmailId(row.get(2)?),
        title: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        label: row.get(6)?,
        start: parse_time(row.get(7)?),
        end: parse_time(row.get(8)?),
        all_day: all_day.map(|v| v != 0),
        response_sent: row.get::<_, i32>(10)? != 0,
        event_id: event_id.map(EventId),
        created_at: parse_time(Some(created_at)).unwrap_or_else(Utc::now),
        updated_at: parse_time(Some(updated_at)).unwrap_or_else(Utc::now),
    })
}
