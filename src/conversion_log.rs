//! Persistent conversion log.
//!
//! Every [`ConversionResult`] produced by a run is appended to the
//! `conversion_log` table with the run id and record kind, so results
//! outlive the process and can be listed with `cmig log`.

use anyhow::Result;
use serde::Serialize;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use content_migrator_core::models::RecordKind;
use content_migrator_core::results::ConversionResult;

use crate::config::Config;
use crate::db;

/// One persisted result.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub run_id: String,
    pub kind: String,
    pub source_record_id: String,
    pub success: bool,
    pub new_content_id: Option<String>,
    pub content_document_id: Option<String>,
    pub message: String,
    pub created_at: i64,
}

/// Append a chunk's results in one transaction.
pub async fn append_results(
    pool: &SqlitePool,
    run_id: &str,
    kind: RecordKind,
    results: &[ConversionResult],
) -> Result<()> {
    append_results_at(pool, run_id, kind, results, chrono::Utc::now().timestamp()).await
}

/// Append a chunk's results stamped with `created_at` (unix seconds).
pub async fn append_results_at(
    pool: &SqlitePool,
    run_id: &str,
    kind: RecordKind,
    results: &[ConversionResult],
    created_at: i64,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    for result in results {
        sqlx::query(
            r#"
            INSERT INTO conversion_log (run_id, kind, source_record_id, success, new_content_id,
                                        content_document_id, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(kind.as_str())
        .bind(&result.source_record_id)
        .bind(result.success)
        .bind(&result.new_content_id)
        .bind(&result.content_document_id)
        .bind(&result.message)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Read log entries, newest run first, sorted by source id within a run.
/// A run's age is the time of its latest chunk.
pub async fn fetch_entries(
    pool: &SqlitePool,
    run_id: Option<&str>,
    failed_only: bool,
) -> Result<Vec<LogEntry>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT run_id, kind, source_record_id, success, new_content_id, content_document_id, \
         message, created_at FROM conversion_log l WHERE 1 = 1",
    );
    if let Some(run_id) = run_id {
        qb.push(" AND run_id = ").push_bind(run_id.to_string());
    }
    if failed_only {
        qb.push(" AND success = 0");
    }
    qb.push(
        " ORDER BY (SELECT MAX(l2.created_at) FROM conversion_log l2 WHERE l2.run_id = l.run_id) DESC, \
         run_id, source_record_id",
    );

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| LogEntry {
            run_id: row.get("run_id"),
            kind: row.get("kind"),
            source_record_id: row.get("source_record_id"),
            success: row.get("success"),
            new_content_id: row.get("new_content_id"),
            content_document_id: row.get("content_document_id"),
            message: row.get("message"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// CLI entry point for `cmig log`.
pub async fn run_log(config: &Config, run_id: Option<&str>, failed_only: bool, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let entries = fetch_entries(&pool, run_id, failed_only).await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No conversion results recorded.");
        return Ok(());
    }

    for entry in &entries {
        let status = if entry.success { "ok  " } else { "FAIL" };
        println!(
            "{} {:<10} {:<20} {}",
            status,
            entry.kind,
            entry.source_record_id,
            entry.new_content_id.as_deref().unwrap_or("-")
        );
        if !entry.message.is_empty() {
            println!("     {}", entry.message);
        }
    }
    let failed = entries.iter().filter(|e| !e.success).count();
    println!();
    println!("{} results, {} failed", entries.len(), failed);
    Ok(())
}
