//! Core data models used throughout Content Migrator.
//!
//! These types represent the legacy records read from the store, the
//! per-record conversion requests derived from them, and the content
//! items and share links that the pipeline writes back.

use serde::{Deserialize, Serialize};

/// Entity type of an inbound email message. Attachments parented by such a
/// message may be routed to the message's own parent.
pub const MESSAGE_ENTITY_TYPE: &str = "EmailMessage";

/// The two kinds of legacy record that can be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Note,
    Attachment,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Note => "note",
            RecordKind::Attachment => "attachment",
        }
    }

    /// Plural label used in CLI output and progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Note => "notes",
            RecordKind::Attachment => "attachments",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" | "notes" => Ok(RecordKind::Note),
            "attachment" | "attachments" => Ok(RecordKind::Attachment),
            other => anyhow::bail!("Unknown record kind: '{}'. Must be note or attachment.", other),
        }
    }
}

/// Reference to an entity together with its type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub entity_type: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// Payload of a legacy record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBody {
    /// Plain text of a note.
    Text(String),
    /// Raw bytes of an attachment and its declared content type.
    Binary {
        data: Vec<u8>,
        content_type: Option<String>,
    },
}

/// A legacy note or attachment. Read once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
    pub parent: EntityRef,
    pub owner_id: String,
    /// Note title or attachment file name.
    pub title: String,
    pub body: RecordBody,
    pub description: Option<String>,
    pub is_private: bool,
}

impl SourceRecord {
    pub fn kind(&self) -> RecordKind {
        match self.body {
            RecordBody::Text(_) => RecordKind::Note,
            RecordBody::Binary { .. } => RecordKind::Attachment,
        }
    }
}

/// An email message as seen by the routing resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub parent: Option<EntityRef>,
    pub incoming: bool,
    pub has_attachment: bool,
}

/// One source record paired with the entity its new content should be
/// shared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub record: SourceRecord,
    pub share_target: EntityRef,
}

impl ConversionRequest {
    /// Request that shares with the record's own parent.
    pub fn to_parent(record: SourceRecord) -> Self {
        let share_target = record.parent.clone();
        Self {
            record,
            share_target,
        }
    }
}

/// Permanent back-references from a content item to its source record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub original_record_id: String,
    pub original_parent_id: String,
    pub original_owner_id: String,
}

impl Provenance {
    pub fn of(record: &SourceRecord) -> Self {
        Self {
            original_record_id: record.id.clone(),
            original_parent_id: record.parent.id.clone(),
            original_owner_id: record.owner_id.clone(),
        }
    }
}

/// A content version to be created. Owner is not part of the creation
/// contract; it is set afterwards with an [`OwnerUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContent {
    pub title: String,
    pub path_on_client: String,
    pub content_type: String,
    pub payload: Vec<u8>,
    pub description: Option<String>,
    pub provenance: Provenance,
}

/// A created content version as returned by a requery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub version_id: String,
    pub document_id: String,
    pub latest_published_version_id: String,
    pub title: String,
    pub owner_id: String,
    pub checksum: String,
    pub provenance: Provenance,
}

/// Ownership reassignment for a content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerUpdate {
    pub document_id: String,
    pub owner_id: String,
}

/// Permission granted by a share link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareType {
    /// Read-only access.
    #[default]
    Viewer,
    /// Access inherited from the linked entity.
    Inferred,
    /// Read and edit access.
    Collaborator,
}

impl ShareType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareType::Viewer => "viewer",
            ShareType::Inferred => "inferred",
            ShareType::Collaborator => "collaborator",
        }
    }
}

/// Which users may see a share link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    AllUsers,
    InternalUsers,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::AllUsers => "all_users",
            Visibility::InternalUsers => "internal_users",
        }
    }
}

/// Visibility grant joining a content document to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub linked_entity_id: String,
    pub content_document_id: String,
    pub share_type: ShareType,
    pub visibility: Visibility,
}
