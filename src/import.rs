//! Legacy data import.
//!
//! Loads entity types, users, email messages, notes, and attachments from
//! a JSON file into the legacy tables, so a conversion run has something
//! to read. Attachment bodies are base64-encoded in the file.
//!
//! ```json
//! {
//!   "running_user": "admin",
//!   "entity_types": [{ "name": "Account", "sharing_enabled": true }],
//!   "users": [{ "id": "u1", "name": "Ann", "is_active": true }],
//!   "messages": [{ "id": "m1", "parent_id": "c1", "parent_type": "Case",
//!                  "incoming": true, "has_attachment": true }],
//!   "notes": [{ "id": "n1", "parent_id": "a1", "parent_type": "Account",
//!               "owner_id": "u1", "title": "Call", "body": "Hi", "is_private": false }],
//!   "attachments": [{ "id": "f1", "parent_id": "m1", "parent_type": "EmailMessage",
//!                     "owner_id": "u1", "name": "a.txt", "body_base64": "aGk=" }]
//! }
//! ```

use anyhow::{Context, Result};
use base64::Engine;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::migrate;

#[derive(Debug, Deserialize, Default)]
pub struct LegacyDataset {
    #[serde(default)]
    pub running_user: Option<String>,
    #[serde(default)]
    pub entity_types: Vec<EntityTypeRow>,
    #[serde(default)]
    pub users: Vec<UserRow>,
    #[serde(default)]
    pub messages: Vec<MessageRow>,
    #[serde(default)]
    pub notes: Vec<NoteRow>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRow>,
}

#[derive(Debug, Deserialize)]
pub struct EntityTypeRow {
    pub name: String,
    #[serde(default)]
    pub sharing_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserRow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct MessageRow {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_type: Option<String>,
    #[serde(default)]
    pub incoming: bool,
    #[serde(default)]
    pub has_attachment: bool,
}

#[derive(Debug, Deserialize)]
pub struct NoteRow {
    pub id: String,
    pub parent_id: String,
    pub parent_type: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentRow {
    pub id: String,
    pub parent_id: String,
    pub parent_type: String,
    pub owner_id: String,
    pub name: String,
    pub body_base64: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// Row counts written by an import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub entity_types: usize,
    pub users: usize,
    pub messages: usize,
    pub notes: usize,
    pub attachments: usize,
}

pub fn read_dataset(path: &Path) -> Result<LegacyDataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse import file: {}", path.display()))
}

/// CLI entry point for `cmig import`.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let dataset = read_dataset(path)?;
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let summary = import_dataset(&pool, &dataset).await?;
    pool.close().await;

    println!("import {}", path.display());
    println!("  entity types: {}", summary.entity_types);
    println!("  users:        {}", summary.users);
    println!("  messages:     {}", summary.messages);
    println!("  notes:        {}", summary.notes);
    println!("  attachments:  {}", summary.attachments);
    println!("ok");
    Ok(())
}

/// Write a dataset in one transaction. Existing rows with the same id are
/// replaced.
pub async fn import_dataset(pool: &SqlitePool, dataset: &LegacyDataset) -> Result<ImportSummary> {
    let mut tx = pool.begin().await?;

    if let Some(user) = &dataset.running_user {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('running_user', ?)")
            .bind(user)
            .execute(&mut *tx)
            .await?;
    }

    for t in &dataset.entity_types {
        sqlx::query("INSERT OR REPLACE INTO entity_types (name, sharing_enabled) VALUES (?, ?)")
            .bind(&t.name)
            .bind(t.sharing_enabled)
            .execute(&mut *tx)
            .await?;
    }

    for u in &dataset.users {
        sqlx::query("INSERT OR REPLACE INTO users (id, name, is_active) VALUES (?, ?, ?)")
            .bind(&u.id)
            .bind(&u.name)
            .bind(u.is_active)
            .execute(&mut *tx)
            .await?;
    }

    for m in &dataset.messages {
        sqlx::query(
            "INSERT OR REPLACE INTO messages (id, parent_id, parent_type, incoming, has_attachment) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&m.id)
        .bind(&m.parent_id)
        .bind(&m.parent_type)
        .bind(m.incoming)
        .bind(m.has_attachment)
        .execute(&mut *tx)
        .await?;
    }

    for n in &dataset.notes {
        sqlx::query(
            "INSERT OR REPLACE INTO notes (id, parent_id, parent_type, owner_id, title, body, is_private) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&n.id)
        .bind(&n.parent_id)
        .bind(&n.parent_type)
        .bind(&n.owner_id)
        .bind(&n.title)
        .bind(&n.body)
        .bind(n.is_private)
        .execute(&mut *tx)
        .await?;
    }

    for a in &dataset.attachments {
        let body = base64::engine::general_purpose::STANDARD
            .decode(a.body_base64.trim())
            .with_context(|| format!("Attachment {} has an invalid base64 body", a.id))?;
        sqlx::query(
            "INSERT OR REPLACE INTO attachments (id, parent_id, parent_type, owner_id, name, body, \
             content_type, description, is_private) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&a.id)
        .bind(&a.parent_id)
        .bind(&a.parent_type)
        .bind(&a.owner_id)
        .bind(&a.name)
        .bind(&body)
        .bind(&a.content_type)
        .bind(&a.description)
        .bind(a.is_private)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let summary = ImportSummary {
        entity_types: dataset.entity_types.len(),
        users: dataset.users.len(),
        messages: dataset.messages.len(),
        notes: dataset.notes.len(),
        attachments: dataset.attachments.len(),
    };
    tracing::info!(
        notes = summary.notes,
        attachments = summary.attachments,
        "legacy data imported"
    );
    Ok(summary)
}
