//! Inbound email operations.
//!
//! Provides database operations for inbound email records.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{EmailId, InboundEmail, InboundEmailId, MessageId, RegistrationId};
use crate::storage::database::{Database, Result};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, email_id, from_address, to_addresses, subject,
        body_text, body_html, message_id, received_at, processed, registration_id
    FROM inbound_emails
"#;

/// Inserts a new inbound email.
pub async fn insert(db: &Database, email: &InboundEmail) -> Result<()> {
    let email = email.clone();

    db.with_conn(move |conn| {
        let to_json = serde_json::to_string(&email.to)?;

        conn.execute(
            r#"
            INSERT INTO inbound_emails (
                id, email_id, from_address, to_addresses, subject,
                body_text, body_html, message_id, received_at, processed, registration_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                email.id.0,
                email.email_id.0,
                email.from,
                to_json,
                email.subject,
                email.text,
                email.html,
                email.message_id.as_ref().map(|m| &m.0),
                email.received_at.to_rfc3339(),
                email.processed as i32,
                email.registration_id.as_ref().map(|r| &r.0),
            ],
        )?;

        Ok(())
    })
    .await
}

/// Retrieves an inbound email by its local ID.
pub async fn get_by_id(db: &Database, id: &InboundEmailId) -> Result<Option<InboundEmail>> {
    let id = id.clone();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row([&id.0], row_to_email).optional()?;
        Ok(result)
    })
    .await
}

/// Retrieves every stored copy of a provider message, oldest first.
///
/// Re-delivered webhooks are not de-duplicated, so more than one copy can exist.
pub async fn get_by_email_id(db: &Database, email_id: &EmailId) -> Result<Vec<InboundEmail>> {
    let email_id = email_id.clone();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_COLUMNS} WHERE email_id = ?1 ORDER BY received_at ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([&email_id.0], row_to_email)?;
        let emails: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(emails?)
    })
    .await
}

fn row_to_email(row: &Row<'_>) -> std::result::Result<InboundEmail, rusqlite::Error> {
    let to_json: String = row.get(3)?;
    let received_str: String = row.get(8)?;
    let message_id: Option<String> = row.get(7)?;
    let registration_id: Option<String> = row.get(10)?;

    let to: Vec<String> = serde_json::from_str(&to_json).unwrap_or_default();
    let received_at = DateTime::parse_from_rfc3339(&received_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(InboundEmail {
        id: InboundEmailId(row.get(0)?),
        email_id: EmailId(row.get(1)?),
        from: row.get(2)?,
        to,
        subject: row.get(4)?,
        text: row.get(5)?,
        html: row.get(6)?,
        message_id: message_id.map(MessageId),
        received_at,
        processed: row.get::<_, i32>(9)? != 0,
        registration_id: registration_id.map(RegistrationId),
    })
}
