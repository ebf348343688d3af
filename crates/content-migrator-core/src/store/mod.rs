//! Storage abstraction for Content Migrator.
//!
//! The [`Store`] trait defines every persistent operation the conversion
//! pipeline and the batch driver need, enabling pluggable backends
//! (SQLite, in-memory).
//!
//! All writes are bulk operations: one call per phase, never one call per
//! record. A failing call fails as a whole and the error propagates to the
//! caller unchanged.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::capability::SharingCapabilities;
use crate::models::{
    MessageRecord, NewContent, OwnerUpdate, RecordKind, ShareLink, SourceRecord, StoredContent,
};
use crate::options::ParentScope;

/// Abstract storage backend for Content Migrator.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`sharing_capabilities`](Store::sharing_capabilities) | Entity types that support share links |
/// | [`count_source_records`](Store::count_source_records) | Size of the legacy working set |
/// | [`query_source_ids`](Store::query_source_ids) | Ids of the legacy working set |
/// | [`get_source_records`](Store::get_source_records) | Load one chunk of legacy records |
/// | [`get_messages`](Store::get_messages) | Look up email messages for routing |
/// | [`insert_contents`](Store::insert_contents) | Bulk-create content versions |
/// | [`get_contents`](Store::get_contents) | Requery created content versions |
/// | [`update_content_owners`](Store::update_content_owners) | Bulk-reassign content owners |
/// | [`insert_share_links`](Store::insert_share_links) | Bulk-create share links |
/// | [`delete_source_records`](Store::delete_source_records) | Bulk-delete legacy records |
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the sharing capability of every known entity type.
    async fn sharing_capabilities(&self) -> Result<SharingCapabilities>;

    /// Count the working set: records of one kind whose parent is in
    /// `scope` and whose owner is an active user.
    async fn count_source_records(&self, kind: RecordKind, scope: &ParentScope) -> Result<usize>;

    /// Ids of the working set, ordered by parent id then record id. Bodies
    /// are not loaded.
    async fn query_source_ids(&self, kind: RecordKind, scope: &ParentScope)
        -> Result<Vec<String>>;

    /// Load full records of one kind by id, ordered by parent id then
    /// record id. Ids no longer present are omitted.
    async fn get_source_records(
        &self,
        kind: RecordKind,
        ids: &[String],
    ) -> Result<Vec<SourceRecord>>;

    /// Fetch email messages by id. Unknown ids are omitted.
    async fn get_messages(&self, ids: &[String]) -> Result<Vec<MessageRecord>>;

    /// Create content versions, owned by the store's running identity.
    ///
    /// Returns one generated version id per input row, in input order.
    async fn insert_contents(&self, contents: &[NewContent]) -> Result<Vec<String>>;

    /// Requery content versions by version id. Result order is unspecified.
    async fn get_contents(&self, version_ids: &[String]) -> Result<Vec<StoredContent>>;

    /// Reassign the owner of content documents.
    async fn update_content_owners(&self, updates: &[OwnerUpdate]) -> Result<()>;

    /// Create share links.
    async fn insert_share_links(&self, links: &[ShareLink]) -> Result<()>;

    /// Delete legacy records of one kind by id.
    async fn delete_source_records(&self, kind: RecordKind, ids: &[String]) -> Result<()>;
}

/// Hex-encoded SHA-256 of a content payload.
pub fn payload_checksum(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_hex() {
        let a = payload_checksum(b"hello");
        assert_eq!(a.len(), 64);
        assert_eq!(a, payload_checksum(b"hello"));
        assert_ne!(a, payload_checksum(b"hello!"));
    }
}
