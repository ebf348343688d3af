//! Database schema migrations (idempotent).
//!
//! Creates the legacy-record tables the job reads from, the content and
//! share-link tables it writes to, and the conversion log. Running
//! `cmig init` repeatedly is safe.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Running identity recorded as the creator of converted content.
pub const DEFAULT_RUNNING_USER: &str = "cmig";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entity_types (
        name TEXT PRIMARY KEY,
        sharing_enabled INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT,
        is_active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        parent_id TEXT,
        parent_type TEXT,
        incoming INTEGER NOT NULL DEFAULT 0,
        has_attachment INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        parent_id TEXT NOT NULL,
        parent_type TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL DEFAULT '',
        is_private INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attachments (
        id TEXT PRIMARY KEY,
        parent_id TEXT NOT NULL,
        parent_type TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        body BLOB NOT NULL,
        content_type TEXT,
        description TEXT,
        is_private INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_documents (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        latest_published_version_id TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_versions (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        title TEXT NOT NULL,
        path_on_client TEXT NOT NULL,
        content_type TEXT NOT NULL,
        description TEXT,
        version_data BLOB NOT NULL,
        checksum TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        original_record_id TEXT NOT NULL,
        original_parent_id TEXT NOT NULL,
        original_owner_id TEXT NOT NULL,
        FOREIGN KEY (document_id) REFERENCES content_documents(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS share_links (
        id TEXT PRIMARY KEY,
        linked_entity_id TEXT NOT NULL,
        content_document_id TEXT NOT NULL,
        share_type TEXT NOT NULL,
        visibility TEXT NOT NULL,
        UNIQUE(linked_entity_id, content_document_id),
        FOREIGN KEY (content_document_id) REFERENCES content_documents(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversion_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        source_record_id TEXT NOT NULL,
        success INTEGER NOT NULL,
        new_content_id TEXT,
        content_document_id TEXT,
        message TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notes_parent ON notes(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_parent ON attachments(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_versions_document ON content_versions(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_versions_original ON content_versions(original_record_id)",
    "CREATE INDEX IF NOT EXISTS idx_log_run ON conversion_log(run_id)",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES ('running_user', ?)")
        .bind(DEFAULT_RUNNING_USER)
        .execute(pool)
        .await?;

    tracing::debug!(statements = SCHEMA.len(), "schema applied");
    Ok(())
}
