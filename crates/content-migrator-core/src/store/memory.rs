//! In-memory [`Store`] implementation for testing and WASM targets.
//!
//! Uses `HashMap` behind `std::sync::RwLock` for thread safety. Requeries
//! return rows in hash order, never in insertion order, so callers cannot
//! rely on positional pairing.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::capability::SharingCapabilities;
use crate::models::{
    EntityRef, MessageRecord, NewContent, OwnerUpdate, RecordKind, ShareLink, SourceRecord,
    StoredContent,
};
use crate::options::ParentScope;

use super::{payload_checksum, Store};

/// Identity that owns content created by the in-memory store.
pub const DEFAULT_RUNNING_USER: &str = "job-runner";

/// Store operations that a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    QuerySources,
    GetSources,
    GetMessages,
    InsertContents,
    GetContents,
    UpdateOwners,
    InsertShareLinks,
    DeleteSources,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    content: NewContent,
    document_id: String,
    owner_id: String,
    checksum: String,
}

#[derive(Default)]
struct State {
    entity_types: HashMap<String, bool>,
    users: HashMap<String, bool>,
    messages: HashMap<String, MessageRecord>,
    sources: HashMap<(RecordKind, String), SourceRecord>,
    versions: HashMap<String, StoredVersion>,
    share_links: Vec<ShareLink>,
    failing: HashSet<StoreOperation>,
}

/// In-memory store for tests and WASM environments.
pub struct InMemoryStore {
    running_user: String,
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_running_user(DEFAULT_RUNNING_USER)
    }

    pub fn with_running_user(user: impl Into<String>) -> Self {
        Self {
            running_user: user.into(),
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn check(&self, op: StoreOperation) -> Result<()> {
        if self.read()?.failing.contains(&op) {
            bail!("injected store failure: {:?}", op);
        }
        Ok(())
    }

    pub fn running_user(&self) -> &str {
        &self.running_user
    }

    pub fn add_entity_type(&self, name: &str, sharing_enabled: bool) -> Result<()> {
        self.write()?
            .entity_types
            .insert(name.to_string(), sharing_enabled);
        Ok(())
    }

    pub fn add_user(&self, id: &str, is_active: bool) -> Result<()> {
        self.write()?.users.insert(id.to_string(), is_active);
        Ok(())
    }

    pub fn add_message(&self, message: MessageRecord) -> Result<()> {
        self.write()?
            .messages
            .insert(message.id.clone(), message);
        Ok(())
    }

    pub fn add_source_record(&self, record: SourceRecord) -> Result<()> {
        self.write()?
            .sources
            .insert((record.kind(), record.id.clone()), record);
        Ok(())
    }

    /// Make every later call of `op` fail.
    pub fn inject_failure(&self, op: StoreOperation) -> Result<()> {
        self.write()?.failing.insert(op);
        Ok(())
    }

    pub fn source_exists(&self, kind: RecordKind, id: &str) -> Result<bool> {
        Ok(self.read()?.sources.contains_key(&(kind, id.to_string())))
    }

    pub fn content_count(&self) -> Result<usize> {
        Ok(self.read()?.versions.len())
    }

    /// Content created from the given source record, looked up through its
    /// provenance.
    pub fn content_for_record(&self, source_record_id: &str) -> Result<Option<StoredContent>> {
        let state = self.read()?;
        Ok(state
            .versions
            .iter()
            .find(|(_, v)| v.content.provenance.original_record_id == source_record_id)
            .map(|(id, v)| to_stored(id, v)))
    }

    /// Payload bytes of a content version.
    pub fn payload(&self, version_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read()?
            .versions
            .get(version_id)
            .map(|v| v.content.payload.clone()))
    }

    pub fn share_links(&self) -> Result<Vec<ShareLink>> {
        Ok(self.read()?.share_links.clone())
    }

    pub fn share_links_for_document(&self, document_id: &str) -> Result<Vec<ShareLink>> {
        Ok(self
            .read()?
            .share_links
            .iter()
            .filter(|l| l.content_document_id == document_id)
            .cloned()
            .collect())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_stored(version_id: &str, v: &StoredVersion) -> StoredContent {
    StoredContent {
        version_id: version_id.to_string(),
        document_id: v.document_id.clone(),
        latest_published_version_id: version_id.to_string(),
        title: v.content.title.clone(),
        owner_id: v.owner_id.clone(),
        checksum: v.checksum.clone(),
        provenance: v.content.provenance.clone(),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn sharing_capabilities(&self) -> Result<SharingCapabilities> {
        let state = self.read()?;
        Ok(SharingCapabilities::new(
            state
                .entity_types
                .iter()
                .filter(|(_, enabled)| **enabled)
                .map(|(name, _)| name.clone()),
        ))
    }

    async fn count_source_records(&self, kind: RecordKind, scope: &ParentScope) -> Result<usize> {
        Ok(self.query_source_ids(kind, scope).await?.len())
    }

    async fn query_source_ids(
        &self,
        kind: RecordKind,
        scope: &ParentScope,
    ) -> Result<Vec<String>> {
        self.check(StoreOperation::QuerySources)?;
        let state = self.read()?;
        let mut records: Vec<&SourceRecord> = state
            .sources
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, r)| r)
            .filter(|r| scope.contains(&r.parent.id))
            .filter(|r| state.users.get(&r.owner_id).copied().unwrap_or(false))
            .collect();
        records.sort_by(|a, b| a.parent.id.cmp(&b.parent.id).then(a.id.cmp(&b.id)));
        Ok(records.into_iter().map(|r| r.id.clone()).collect())
    }

    async fn get_source_records(
        &self,
        kind: RecordKind,
        ids: &[String],
    ) -> Result<Vec<SourceRecord>> {
        self.check(StoreOperation::GetSources)?;
        let state = self.read()?;
        let mut records: Vec<SourceRecord> = ids
            .iter()
            .filter_map(|id| state.sources.get(&(kind, id.clone())).cloned())
            .collect();
        records.sort_by(|a, b| a.parent.id.cmp(&b.parent.id).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn get_messages(&self, ids: &[String]) -> Result<Vec<MessageRecord>> {
        self.check(StoreOperation::GetMessages)?;
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.messages.get(id).cloned())
            .collect())
    }

    async fn insert_contents(&self, contents: &[NewContent]) -> Result<Vec<String>> {
        self.check(StoreOperation::InsertContents)?;
        let mut state = self.write()?;
        let mut ids = Vec::with_capacity(contents.len());
        for content in contents {
            let version_id = Uuid::new_v4().to_string();
            state.versions.insert(
                version_id.clone(),
                StoredVersion {
                    content: content.clone(),
                    document_id: Uuid::new_v4().to_string(),
                    owner_id: self.running_user.clone(),
                    checksum: payload_checksum(&content.payload),
                },
            );
            ids.push(version_id);
        }
        Ok(ids)
    }

    async fn get_contents(&self, version_ids: &[String]) -> Result<Vec<StoredContent>> {
        self.check(StoreOperation::GetContents)?;
        let wanted: HashSet<&str> = version_ids.iter().map(String::as_str).collect();
        let state = self.read()?;
        Ok(state
            .versions
            .iter()
            .filter(|(id, _)| wanted.contains(id.as_str()))
            .map(|(id, v)| to_stored(id, v))
            .collect())
    }

    async fn update_content_owners(&self, updates: &[OwnerUpdate]) -> Result<()> {
        self.check(StoreOperation::UpdateOwners)?;
        let mut state = self.write()?;
        for update in updates {
            if !state
                .versions
                .values()
                .any(|v| v.document_id == update.document_id)
            {
                bail!("content document not found: {}", update.document_id);
            }
        }
        for update in updates {
            for v in state.versions.values_mut() {
                if v.document_id == update.document_id {
                    v.owner_id = update.owner_id.clone();
                }
            }
        }
        Ok(())
    }

    async fn insert_share_links(&self, links: &[ShareLink]) -> Result<()> {
        self.check(StoreOperation::InsertShareLinks)?;
        self.write()?.share_links.extend_from_slice(links);
        Ok(())
    }

    async fn delete_source_records(&self, kind: RecordKind, ids: &[String]) -> Result<()> {
        self.check(StoreOperation::DeleteSources)?;
        let mut state = self.write()?;
        for id in ids {
            state.sources.remove(&(kind, id.clone()));
        }
        Ok(())
    }
}

/// Build an [`EntityRef`] for an email message, used when seeding tests.
pub fn message_ref(id: &str) -> EntityRef {
    EntityRef::new(id, crate::models::MESSAGE_ENTITY_TYPE)
}
