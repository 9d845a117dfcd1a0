//! SQL schema definitions as const strings.
//!
//! Contains the complete SQLite schema for the intake service.

/// SQL to create the inbound emails table.
pub const CREATE_INBOUND_EMAILS: &str = r#"
CREATE TABLE IF NOT EXISTS inbound_emails (
    id TEXT PRIMARY KEY,
    email_id TEXT NOT NULL,
    from_address TEXT NOT NULL,
    to_addresses TEXT NOT NULL,
    subject TEXT NOT NULL,
    body_text TEXT,
    body_html TEXT,
    message_id TEXT,
    received_at TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    registration_id TEXT
)
"#;

/// SQL to create inbound email indexes.
pub const CREATE_INBOUND_EMAIL_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_inbound_emails_email_id ON inbound_emails(email_id);
CREATE INDEX IF NOT EXISTS idx_inbound_emails_received ON inbound_emails(received_at DESC)
"#;

/// SQL to create the event registrations table.
///
/// `email_id` is unique: exactly one registration per inbound email.
pub const CREATE_EVENT_REGISTRATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS event_registrations (
    id TEXT PRIMARY KEY,
    access_id TEXT NOT NULL UNIQUE,
    email_id TEXT NOT NULL UNIQUE REFERENCES inbound_emails(id),
    title TEXT,
    description TEXT,
    location TEXT,
    label TEXT,
    start_at TEXT,
    end_at TEXT,
    all_day INTEGER,
    response_sent INTEGER NOT NULL DEFAULT 0,
    event_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create the workflow runs table.
pub const CREATE_WORKFLOW_RUNS: &str = r#"
CREATE TABLE IF NOT EXISTS workflow_runs (
    id TEXT PRIMARY KEY,
    workflow TEXT NOT NULL,
    correlation_id TEXT NOT NULL,
    input_json TEXT NOT NULL,
    status TEXT NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create workflow run indexes.
pub const CREATE_WORKFLOW_RUN_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_workflow_runs_status ON workflow_runs(workflow, status);
CREATE INDEX IF NOT EXISTS idx_workflow_runs_correlation ON workflow_runs(correlation_id)
"#;

/// SQL to create the workflow step journal.
pub const CREATE_WORKFLOW_STEPS: &str = r#"
CREATE TABLE IF NOT EXISTS workflow_steps (
    run_id TEXT NOT NULL REFERENCES workflow_runs(id),
    step_name TEXT NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    output_json TEXT,
    error TEXT,
    finished_at TEXT NOT NULL,
    PRIMARY KEY (run_id, step_name)
)
"#;

/// Returns all migrations in order.
pub fn all_migrations() -> Vec<&'static str> {
    vec![
        CREATE_INBOUND_EMAILS,
        CREATE_INBOUND_EMAIL_INDEXES,
        CREATE_EVENT_REGISTRATIONS,
        CREATE_WORKFLOW_RUNS,
        CREATE_WORKFLOW_RUN_INDEXES,
        CREATE_WORKFLOW_STEPS,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_migrations_returns_statements() {
        let migrations = all_migrations();
        assert_eq!(migrations.len(), 6);
    }

    #[test]
    fn registrations_are_one_per_email() {
        assert!(CREATE_EVENT_REGISTRATIONS.contains("email_id TEXT NOT NULL UNIQUE"));
        assert!(CREATE_EVENT_REGISTRATIONS.contains("access_id TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn steps_are_keyed_by_run_and_name() {
        assert!(CREATE_WORKFLOW_STEPS.contains("PRIMARY KEY (run_id, step_name)"));
    }

    #[test]
    fn indexes_use_if_not_exists() {
        assert!(CREATE_INBOUND_EMAIL_INDEXES.contains("IF NOT EXISTS"));
        assert!(CREATE_WORKFLOW_RUN_INDEXES.contains("IF NOT EXISTS"));
    }
}
