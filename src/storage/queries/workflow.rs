//! Workflow run and step journal operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::storage::database::{Database, DatabaseError, Result};
use crate::workflow::{RunId, RunRecord, RunStatus, StepRecord, StepStatus};

const SELECT_RUN: &str = r#"
    SELECT id, workflow, correlation_id, input_json, status, error, created_at, updated_at
    FROM workflow_runs
"#;

/// Inserts a new run.
pub async fn insert_run(db: &Database, run: &RunRecord) -> Result<()> {
    let run = run.clone();

    db.with_conn(move |conn| {
        conn.execute(
            r#"
            INSERT INTO workflow_runs (
                id, workflow, correlation_id, input_json, status, error, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                run.id.0,
                run.workflow,
                run.correlation_id,
                run.input_json,
                run.status.as_str(),
                run.error,
                run.created_at.to_rfc3339(),
                run.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })
    .await
}

/// Retrieves a run by ID.
pub async fn get_run(db: &Database, run_id: &RunId) -> Result<Option<RunRecord>> {
    let run_id = run_id.clone();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_RUN} WHERE id = ?1");
        let result = conn.query_row(&sql, [&run_id.0], row_to_run).optional()?;
        Ok(result)
    })
    .await
}

/// Lists runs of a workflow that never reached a terminal status.
pub async fn list_running(db: &Database, workflow: &str) -> Result<Vec<RunRecord>> {
    let workflow = workflow.to_string();

    db.with_conn(move |conn| {
        let sql = format!("{SELECT_RUN} WHERE workflow = ?1 AND status = ?2 ORDER BY created_at");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![workflow, RunStatus::Running.as_str()], row_to_run)?;
        let runs: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(runs?)
    })
    .await
}

/// Records the terminal status of a run.
pub async fn finish_run(
    db: &Database,
    run_id: &RunId,
    status: RunStatus,
    error: Option<&str>,
) -> Result<()> {
    let run_id = run_id.clone();
    let error = error.map(str::to_string);

    db.with_conn(move |conn| {
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE workflow_runs SET status = ?1, error = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), error, now, run_id.0],
        )?;
        if updated == 0 {
            return Err(DatabaseError::NotFound(format!("workflow run {}", run_id)));
        }
        Ok(())
    })
    .await
}

/// Retrieves the journaled result of a step, if it already finished.
pub async fn get_step(db: &Database, run_id: &RunId, step_name: &str) -> Result<Option<StepRecord>> {
    let run_id = run_id.clone();
    let step_name = step_name.to_string();

    db.with_conn(move |conn| {
        let result = conn
            .query_row(
                r#"
                SELECT run_id, step_name, status, attempts, output_json, error, finished_at
                FROM workflow_steps
                WHERE run_id = ?1 AND step_name = ?2
                "#,
                params![run_id.0, step_name],
                row_to_step,
            )
            .optional()?;
        Ok(result)
    })
    .await
}

/// Lists the finished steps of a run in completion order.
pub async fn list_steps(db: &Database, run_id: &RunId) -> Result<Vec<StepRecord>> {
    let run_id = run_id.clone();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, step_name, status, attempts, output_json, error, finished_at
            FROM workflow_steps
            WHERE run_id = ?1
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map([&run_id.0], row_to_step)?;
        let steps: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(steps?)
    })
    .await
}

/// Journals the terminal result of a step.
pub async fn record_step(db: &Database, step: &StepRecord) -> Result<()> {
    let step = step.clone();

    db.with_conn(move |conn| {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO workflow_steps (
                run_id, step_name, status, attempts, output_json, error, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                step.run_id.0,
                step.step_name,
                step.status.as_str(),
                step.attempts,
                step.output_json,
                step.error,
                step.finished_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })
    .await
}

fn parse_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn row_to_run(row: &Row<'_>) -> std::result::Result<RunRecord, rusqlite::Error> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(RunRecord {
        id: RunId(row.get(0)?),
        workflow: row.get(1)?,
        correlation_id: row.get(2)?,
        input_json: row.get(3)?,
        status: status.parse().map_err(|e| conversion_error(4, e))?,
        error: row.get(5)?,
        created_at: parse_time(&created_at),
        updated_at: parse_time(&updated_at),
    })
}

fn row_to_step(row: &Row<'_>) -> std::result::Result<StepRecord, rusqlite::Error> {
    let status: String = row.get(2)?;
    let finished_at: String = row.get(6)?;

    Ok(StepRecord {
        run_id: RunId(row.get(0)?),
        step_name: row.get(1)?,
        status: status.parse().map_err(|e| conversion_error(2, e))?,
        attempts: row.get(3)?,
        output_json: row.get(4)?,
        error: row.get(5)?,
        finished_at: parse_time(&finished_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(id: &str) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            id: RunId::from(id),
            workflow: "email-intake".to_string(),
            correlation_id: "remote-1".to_string(),
            input_json: r#"{"email_id":"remote-1"}"#.to_string(),
            status: RunStatus::Running,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_step(run_id: &str, name: &str, status: StepStatus) -> StepRecord {
        StepRecord {
            run_id: RunId::from(run_id),
            step_name: name.to_string(),
            status,
            attempts: 2,
            output_json: Some("\"ok\"".to_string()),
            error: None,
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_finish_run() {
        let db = Database::open_in_memory().await.unwrap();
        insert_run(&db, &make_run("run-1")).await.unwrap();

        finish_run(&db, &RunId::from("run-1"), RunStatus::Failed, Some("boom"))
            .await
            .unwrap();

        let run = get_run(&db, &RunId::from("run-1")).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn list_running_skips_finished_runs() {
        let db = Database::open_in_memory().await.unwrap();
        insert_run(&db, &make_run("run-1")).await.unwrap();
        insert_run(&db, &make_run("run-2")).await.unwrap();
        finish_run(&db, &RunId::from("run-1"), RunStatus::Succeeded, None)
            .await
            .unwrap();

        let running = list_running(&db, "email-intake").await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, RunId::from("run-2"));

        assert!(list_running(&db, "other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finish_unknown_run_fails() {
        let db = Database::open_in_memory().await.unwrap();
        let result = finish_run(&db, &RunId::from("nope"), RunStatus::Succeeded, None).await;
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn steps_are_journaled_in_order() {
        let db = Database::open_in_memory().await.unwrap();
        insert_run(&db, &make_run("run-1")).await.unwrap();

        record_step(&db, &make_step("run-1", "fetch", StepStatus::Completed))
            .await
            .unwrap();
        record_step(&db, &make_step("run-1", "extract", StepStatus::Failed))
            .await
            .unwrap();

        let step = get_step(&db, &RunId::from("run-1"), "fetch")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.attempts, 2);

        let names: Vec<_> = list_steps(&db, &RunId::from("run-1"))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.step_name)
            .collect();
        assert_eq!(names, vec!["fetch", "extract"]);

        assert!(get_step(&db, &RunId::from("run-1"), "send")
            .await
            .unwrap()
            .is_none());
    }
}
