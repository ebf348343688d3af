//! SQLite-backed [`Store`] implementation.
//!
//! Every bulk operation of the [`Store`] trait runs in its own
//! transaction: either all rows of the call are written or none are.
//! Nothing spans two calls, so a failure in a later phase leaves the
//! earlier phases' writes in place.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use content_migrator_core::capability::SharingCapabilities;
use content_migrator_core::models::{
    EntityRef, MessageRecord, NewContent, OwnerUpdate, Provenance, RecordBody, RecordKind,
    ShareLink, ShareType, SourceRecord, StoredContent, Visibility,
};
use content_migrator_core::options::ParentScope;
use content_migrator_core::store::{payload_checksum, Store};

use crate::migrate::DEFAULT_RUNNING_USER;

/// SQLite implementation of the [`Store`] trait.
///
/// Content is created owned by `running_user`, the identity recorded in
/// the `settings` table.
pub struct SqliteStore {
    pool: SqlitePool,
    running_user: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, running_user: impl Into<String>) -> Self {
        Self {
            pool,
            running_user: running_user.into(),
        }
    }

    /// Wrap a pool, reading the running identity from `settings`.
    pub async fn open(pool: SqlitePool) -> Result<Self> {
        let running_user: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'running_user'")
                .fetch_optional(&pool)
                .await?;
        Ok(Self::new(
            pool,
            running_user.unwrap_or_else(|| DEFAULT_RUNNING_USER.to_string()),
        ))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn running_user(&self) -> &str {
        &self.running_user
    }

    /// Content created from a source record, found through its provenance.
    pub async fn content_for_record(&self, source_record_id: &str) -> Result<Option<StoredContent>> {
        let row = sqlx::query(&format!(
            "{} WHERE v.original_record_id = ?",
            CONTENT_SELECT
        ))
        .bind(source_record_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(stored_content_from_row))
    }

    pub async fn share_links_for_document(&self, document_id: &str) -> Result<Vec<ShareLink>> {
        let rows = sqlx::query(
            "SELECT linked_entity_id, content_document_id, share_type, visibility \
             FROM share_links WHERE content_document_id = ? ORDER BY linked_entity_id",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ShareLink {
                    linked_entity_id: row.get("linked_entity_id"),
                    content_document_id: row.get("content_document_id"),
                    share_type: parse_share_type(row.get("share_type"))?,
                    visibility: parse_visibility(row.get("visibility"))?,
                })
            })
            .collect()
    }

    pub async fn source_exists(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE id = ?",
            source_table(kind)
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

const CONTENT_SELECT: &str = r#"
    SELECT v.id, v.document_id, d.latest_published_version_id, v.title, d.owner_id,
           v.checksum, v.original_record_id, v.original_parent_id, v.original_owner_id
    FROM content_versions v
    JOIN content_documents d ON d.id = v.document_id
"#;

fn source_table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Note => "notes",
        RecordKind::Attachment => "attachments",
    }
}

/// Append the working-set predicate: owner active, parent in scope.
fn push_working_set(qb: &mut QueryBuilder<Sqlite>, kind: RecordKind, scope: &ParentScope) {
    qb.push(format!(
        " FROM {} r JOIN users u ON u.id = r.owner_id WHERE u.is_active = 1",
        source_table(kind)
    ));
    if let ParentScope::Only(ids) = scope {
        qb.push(" AND r.parent_id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");
    }
}

fn stored_content_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredContent {
    StoredContent {
        version_id: row.get("id"),
        document_id: row.get("document_id"),
        latest_published_version_id: row.get("latest_published_version_id"),
        title: row.get("title"),
        owner_id: row.get("owner_id"),
        checksum: row.get("checksum"),
        provenance: Provenance {
            original_record_id: row.get("original_record_id"),
            original_parent_id: row.get("original_parent_id"),
            original_owner_id: row.get("original_owner_id"),
        },
    }
}

fn parse_share_type(s: &str) -> Result<ShareType> {
    Ok(match s {
        "viewer" => ShareType::Viewer,
        "inferred" => ShareType::Inferred,
        "collaborator" => ShareType::Collaborator,
        other => bail!("unknown share type in database: '{}'", other),
    })
}

fn parse_visibility(s: &str) -> Result<Visibility> {
    Ok(match s {
        "all_users" => Visibility::AllUsers,
        "internal_users" => Visibility::InternalUsers,
        other => bail!("unknown visibility in database: '{}'", other),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn sharing_capabilities(&self) -> Result<SharingCapabilities> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM entity_types WHERE sharing_enabled = 1")
                .fetch_all(&self.pool)
                .await?;
        Ok(SharingCapabilities::new(names))
    }

    async fn count_source_records(&self, kind: RecordKind, scope: &ParentScope) -> Result<usize> {
        if scope.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*)");
        push_working_set(&mut qb, kind, scope);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as usize)
    }

    async fn query_source_ids(
        &self,
        kind: RecordKind,
        scope: &ParentScope,
    ) -> Result<Vec<String>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT r.id");
        push_working_set(&mut qb, kind, scope);
        qb.push(" ORDER BY r.parent_id, r.id");
        let ids: Vec<String> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(ids)
    }

    async fn get_source_records(
        &self,
        kind: RecordKind,
        ids: &[String],
    ) -> Result<Vec<SourceRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let columns = match kind {
            RecordKind::Note => {
                "r.id, r.parent_id, r.parent_type, r.owner_id, r.title, r.body, \
                 NULL AS content_type, NULL AS description, r.is_private"
            }
            RecordKind::Attachment => {
                "r.id, r.parent_id, r.parent_type, r.owner_id, r.name AS title, r.body, \
                 r.content_type, r.description, r.is_private"
            }
        };

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM {} r WHERE r.id IN (",
            columns,
            source_table(kind)
        ));
        {
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");
        }
        qb.push(" ORDER BY r.parent_id, r.id");

        let rows = qb.build().fetch_all(&self.pool).await?;

        let records = rows
            .iter()
            .map(|row| {
                let body = match kind {
                    RecordKind::Note => RecordBody::Text(row.get("body")),
                    RecordKind::Attachment => RecordBody::Binary {
                        data: row.get("body"),
                        content_type: row.get("content_type"),
                    },
                };
                SourceRecord {
                    id: row.get("id"),
                    parent: EntityRef::new(
                        row.get::<String, _>("parent_id"),
                        row.get::<String, _>("parent_type"),
                    ),
                    owner_id: row.get("owner_id"),
                    title: row.get("title"),
                    body,
                    description: row.get("description"),
                    is_private: row.get("is_private"),
                }
            })
            .collect();

        Ok(records)
    }

    async fn get_messages(&self, ids: &[String]) -> Result<Vec<MessageRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, parent_id, parent_type, incoming, has_attachment FROM messages WHERE id IN (",
        );
        {
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");
        }

        let rows = qb.build().fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let parent_id: Option<String> = row.get("parent_id");
                let parent_type: Option<String> = row.get("parent_type");
                MessageRecord {
                    id: row.get("id"),
                    parent: parent_id.map(|id| EntityRef::new(id, parent_type.unwrap_or_default())),
                    incoming: row.get("incoming"),
                    has_attachment: row.get("has_attachment"),
                }
            })
            .collect())
    }

    async fn insert_contents(&self, contents: &[NewContent]) -> Result<Vec<String>> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(contents.len());

        for content in contents {
            let version_id = Uuid::new_v4().to_string();
            let document_id = Uuid::new_v4().to_string();

            sqlx::query(
                r#"
                INSERT INTO content_documents (id, title, owner_id, latest_published_version_id, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&document_id)
            .bind(&content.title)
            .bind(&self.running_user)
            .bind(&version_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO content_versions (id, document_id, title, path_on_client, content_type,
                                              description, version_data, checksum, created_by, created_at,
                                              original_record_id, original_parent_id, original_owner_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&version_id)
            .bind(&document_id)
            .bind(&content.title)
            .bind(&content.path_on_client)
            .bind(&content.content_type)
            .bind(&content.description)
            .bind(&content.payload)
            .bind(payload_checksum(&content.payload))
            .bind(&self.running_user)
            .bind(now)
            .bind(&content.provenance.original_record_id)
            .bind(&content.provenance.original_parent_id)
            .bind(&content.provenance.original_owner_id)
            .execute(&mut *tx)
            .await?;

            ids.push(version_id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn get_contents(&self, version_ids: &[String]) -> Result<Vec<StoredContent>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(CONTENT_SELECT);
        qb.push(" WHERE v.id IN (");
        {
            let mut separated = qb.separated(", ");
            for id in version_ids {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(stored_content_from_row).collect())
    }

    async fn update_content_owners(&self, updates: &[OwnerUpdate]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for update in updates {
            let result = sqlx::query("UPDATE content_documents SET owner_id = ? WHERE id = ?")
                .bind(&update.owner_id)
                .bind(&update.document_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() != 1 {
                bail!("content document not found: {}", update.document_id);
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_share_links(&self, links: &[ShareLink]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for link in links {
            sqlx::query(
                r#"
                INSERT INTO share_links (id, linked_entity_id, content_document_id, share_type, visibility)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&link.linked_entity_id)
            .bind(&link.content_document_id)
            .bind(link.share_type.as_str())
            .bind(link.visibility.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_source_records(&self, kind: RecordKind, ids: &[String]) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", source_table(kind));
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
