//! Conversion pipeline orchestration.
//!
//! One invocation converts one chunk of source records of a single kind:
//!
//! ```text
//! resolve targets → filter → materialize → requery → restore owner/links → cleanup
//! ```
//!
//! Phases run strictly in that order, each as one bulk store call.
//! Business-rule outcomes land in the returned results; a store error
//! aborts the invocation and is returned as-is, leaving whatever earlier
//! phases already wrote.

use std::collections::HashSet;

use anyhow::Result;

use crate::capability::CapabilityLookup;
use crate::cleanup::delete_converted_sources;
use crate::filter::filter_eligible;
use crate::materialize::materialize;
use crate::models::{RecordKind, SourceRecord};
use crate::options::ConversionOptions;
use crate::restore::restore_ownership_and_links;
use crate::results::{ConversionResult, ResultLog};
use crate::routing::resolve_requests;
use crate::store::Store;

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct ChunkReport {
    /// One result per input record, sorted by source record id.
    pub results: Vec<ConversionResult>,
    pub converted: usize,
    /// Records turned away by the eligibility filter.
    pub rejected: usize,
    pub share_links: usize,
    pub deleted: usize,
}

/// Converts chunks of one record kind.
pub struct ConversionPipeline<'a> {
    store: &'a dyn Store,
    capabilities: &'a dyn CapabilityLookup,
    kind: RecordKind,
    options: &'a ConversionOptions,
}

impl<'a> ConversionPipeline<'a> {
    pub fn new(
        store: &'a dyn Store,
        capabilities: &'a dyn CapabilityLookup,
        kind: RecordKind,
        options: &'a ConversionOptions,
    ) -> Self {
        Self {
            store,
            capabilities,
            kind,
            options,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Convert one chunk of records.
    pub async fn convert(&self, records: Vec<SourceRecord>) -> Result<ChunkReport> {
        let mut log = ResultLog::new();
        let input = records.len();

        let mut seen = HashSet::with_capacity(input);
        let mut accepted = Vec::with_capacity(input);
        for record in records {
            if !seen.insert(record.id.clone()) {
                log.record_duplicate(&record.id);
            } else if record.kind() != self.kind {
                log.record(ConversionResult::failed(
                    record.id.clone(),
                    format!(
                        "Not converted: record is a {} but this pipeline converts {}.",
                        record.kind(),
                        self.kind.label()
                    ),
                ));
            } else {
                accepted.push(record);
            }
        }

        let requests = resolve_requests(self.store, accepted, self.options).await?;
        let before_filter = log.len();
        let eligible = filter_eligible(requests, self.capabilities, self.options, &mut log);
        let rejected = log.len() - before_filter;

        let created = materialize(self.store, eligible, &mut log).await?;
        let restored = restore_ownership_and_links(
            self.store,
            &created,
            self.capabilities,
            self.options,
            &mut log,
        )
        .await?;
        let deleted = delete_converted_sources(
            self.store,
            self.kind,
            &restored.contents,
            self.options.delete_source_upon_conversion,
        )
        .await?;

        let report = ChunkReport {
            converted: log.succeeded(),
            rejected,
            share_links: restored.share_links,
            deleted,
            results: log.into_results(),
        };

        tracing::info!(
            kind = %self.kind,
            records = input,
            converted = report.converted,
            rejected = report.rejected,
            links = report.share_links,
            deleted = report.deleted,
            "chunk converted"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::SharingCapabilities;
    use crate::models::{
        EntityRef, MessageRecord, NewContent, OwnerUpdate, RecordBody, ShareLink, StoredContent,
    };
    use crate::restore::PRIVATE_LINK_SKIPPED;
    use crate::store::memory::{message_ref, InMemoryStore, StoreOperation};

    fn note(id: &str, parent: EntityRef, is_private: bool) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            parent,
            owner_id: "owner-1".to_string(),
            title: format!("Note {}", id),
            body: RecordBody::Text("Line one\nit's line two".to_string()),
            description: None,
            is_private,
        }
    }

    fn attachment(id: &str, parent: EntityRef, is_private: bool) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            parent,
            owner_id: "owner-2".to_string(),
            title: format!("{}.bin", id),
            body: RecordBody::Binary {
                data: vec![1, 2, 3, 4],
                content_type: Some("application/x-test".to_string()),
            },
            description: Some("attached".to_string()),
            is_private,
        }
    }

    fn seeded_store(records: &[SourceRecord]) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_entity_type("Account", true).unwrap();
        store.add_entity_type("Case", true).unwrap();
        store.add_entity_type("Widget", false).unwrap();
        store.add_entity_type("EmailMessage", false).unwrap();
        store.add_user("owner-1", true).unwrap();
        store.add_user("owner-2", true).unwrap();
        for r in records {
            store.add_source_record(r.clone()).unwrap();
        }
        store
    }

    async fn convert(
        store: &InMemoryStore,
        kind: RecordKind,
        records: Vec<SourceRecord>,
        options: &ConversionOptions,
    ) -> Result<ChunkReport> {
        let caps: SharingCapabilities = store.sharing_capabilities().await.unwrap();
        ConversionPipeline::new(store, &caps, kind, options)
            .convert(records)
            .await
    }

    #[tokio::test]
    async fn attachment_on_capable_parent_default_options() {
        let record = attachment("a1", EntityRef::new("acc-1", "Account"), false);
        let store = seeded_store(&[record.clone()]);
        let report = convert(
            &store,
            RecordKind::Attachment,
            vec![record],
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert!(result.success);
        assert!(result.new_content_id.is_some());
        assert!(result.message.is_empty());

        let stored = store.content_for_record("a1").unwrap().unwrap();
        assert_eq!(stored.owner_id, "owner-2");
        assert_ne!(stored.owner_id, store.running_user());
        let links = store.share_links().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].linked_entity_id, "acc-1");
        assert_eq!(links[0].content_document_id, stored.document_id);
        assert!(store.source_exists(RecordKind::Attachment, "a1").unwrap());
        assert_eq!(
            store.payload(&stored.version_id).unwrap().unwrap(),
            vec![1, 2, 3, 4]
        );
    }

    #[tokio::test]
    async fn private_note_without_share_private() {
        let record = note("n1", EntityRef::new("acc-1", "Account"), true);
        let store = seeded_store(&[record.clone()]);
        let report = convert(
            &store,
            RecordKind::Note,
            vec![record],
            &ConversionOptions::default(),
        )
        .await
        .unwrap();
        let result = &report.results[0];
        assert!(result.success);
        assert!(result.new_content_id.is_some());
        assert!(result.message.contains("private"));
        assert_eq!(result.message, PRIVATE_LINK_SKIPPED);
        assert!(store.share_links().unwrap().is_empty());
    }

    #[tokio::test]
    async fn private_note_with_share_private() {
        let record = note("n1", EntityRef::new("acc-1", "Account"), true);
        let store = seeded_store(&[record.clone()]);
        let options = ConversionOptions {
            share_private: true,
            ..Default::default()
        };
        convert(&store, RecordKind::Note, vec![record], &options)
            .await
            .unwrap();
        assert_eq!(store.share_links().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn incapable_parent_rejected_without_override() {
        let record = note("n1", EntityRef::new("w-1", "Widget"), false);
        let store = seeded_store(&[record.clone()]);
        let options = ConversionOptions {
            delete_source_upon_conversion: true,
            ..Default::default()
        };
        let report = convert(&store, RecordKind::Note, vec![record], &options)
            .await
            .unwrap();
        let result = &report.results[0];
        assert!(!result.success);
        assert!(result.new_content_id.is_none());
        assert!(result.message.contains("Widget"));
        assert_eq!(store.content_count().unwrap(), 0);
        assert!(store.source_exists(RecordKind::Note, "n1").unwrap());
        assert_eq!(report.rejected, 1);
    }

    #[tokio::test]
    async fn incapable_parent_converted_with_override() {
        let record = note("n1", EntityRef::new("w-1", "Widget"), false);
        let store = seeded_store(&[record.clone()]);
        let options = ConversionOptions {
            convert_if_sharing_capability_disabled: true,
            delete_source_upon_conversion: true,
            ..Default::default()
        };
        let report = convert(&store, RecordKind::Note, vec![record], &options)
            .await
            .unwrap();
        let result = &report.results[0];
        assert!(result.success);
        assert!(result.new_content_id.is_some());
        assert!(result.message.contains("does not support sharing"));
        assert!(store.share_links().unwrap().is_empty());
        assert!(!store.source_exists(RecordKind::Note, "n1").unwrap());
    }

    #[tokio::test]
    async fn delete_removes_only_converted_records() {
        let ok = note("n1", EntityRef::new("acc-1", "Account"), false);
        let private = note("n2", EntityRef::new("acc-1", "Account"), true);
        let rejected = note("n3", EntityRef::new("w-1", "Widget"), false);
        let store = seeded_store(&[ok.clone(), private.clone(), rejected.clone()]);
        let options = ConversionOptions {
            delete_source_upon_conversion: true,
            ..Default::default()
        };
        let report = convert(
            &store,
            RecordKind::Note,
            vec![ok, private, rejected],
            &options,
        )
        .await
        .unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.deleted, 2);
        for result in &report.results {
            let exists = store
                .source_exists(RecordKind::Note, &result.source_record_id)
                .unwrap();
            assert_eq!(exists, !result.success, "{}", result.source_record_id);
        }
    }

    #[tokio::test]
    async fn provenance_survives_source_deletion() {
        let record = note("n1", EntityRef::new("acc-1", "Account"), false);
        let store = seeded_store(&[record.clone()]);
        let options = ConversionOptions {
            delete_source_upon_conversion: true,
            ..Default::default()
        };
        convert(&store, RecordKind::Note, vec![record], &options)
            .await
            .unwrap();
        let stored = store.content_for_record("n1").unwrap().unwrap();
        assert_eq!(stored.provenance.original_parent_id, "acc-1");
        assert_eq!(stored.provenance.original_owner_id, "owner-1");
        assert_eq!(
            store.payload(&stored.version_id).unwrap().unwrap(),
            b"Line one<br>it&#39;s line two".to_vec()
        );
    }

    #[tokio::test]
    async fn inbound_message_attachment_shared_with_case() {
        let record = attachment("a1", message_ref("msg-1"), false);
        let store = seeded_store(&[record.clone()]);
        store
            .add_message(MessageRecord {
                id: "msg-1".to_string(),
                parent: Some(EntityRef::new("case-9", "Case")),
                incoming: true,
                has_attachment: true,
            })
            .unwrap();
        let options = ConversionOptions {
            route_inbound_message_attachments_to_case: true,
            ..Default::default()
        };
        let report = convert(&store, RecordKind::Attachment, vec![record], &options)
            .await
            .unwrap();
        assert!(report.results[0].success);
        let links = store.share_links().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].linked_entity_id, "case-9");
        let stored = store.content_for_record("a1").unwrap().unwrap();
        assert_eq!(stored.provenance.original_parent_id, "msg-1");
    }

    #[tokio::test]
    async fn message_attachment_without_routing_is_rejected() {
        let record = attachment("a1", message_ref("msg-1"), false);
        let store = seeded_store(&[record.clone()]);
        let report = convert(
            &store,
            RecordKind::Attachment,
            vec![record],
            &ConversionOptions::default(),
        )
        .await
        .unwrap();
        assert!(!report.results[0].success);
        assert!(report.results[0].message.contains("EmailMessage"));
    }

    #[tokio::test]
    async fn one_result_per_input_for_mixed_chunk() {
        let records = vec![
            note("n1", EntityRef::new("acc-1", "Account"), false),
            note("n2", EntityRef::new("w-1", "Widget"), false),
            note("n3", EntityRef::new("acc-2", "Account"), true),
            attachment("a1", EntityRef::new("acc-1", "Account"), false),
        ];
        let store = seeded_store(&records);
        let report = convert(
            &store,
            RecordKind::Note,
            records,
            &ConversionOptions::default(),
        )
        .await
        .unwrap();
        let ids: Vec<&str> = report
            .results
            .iter()
            .map(|r| r.source_record_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "n1", "n2", "n3"]);
        assert!(!report.results[0].success);
        assert_eq!(report.converted, 2);
        // Only n2 is turned away by the filter; a1 fails for its kind.
        assert_eq!(report.rejected, 1);
    }

    #[tokio::test]
    async fn repeated_id_in_chunk_gets_its_own_failed_result() {
        let record = note("n1", EntityRef::new("acc-1", "Account"), false);
        let store = seeded_store(&[record.clone()]);
        let report = convert(
            &store,
            RecordKind::Note,
            vec![record.clone(), record],
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.converted, 1);
        assert_eq!(report.rejected, 0);
        assert!(report.results[0].success);
        assert!(!report.results[1].success);
        assert!(report.results[1].message.contains("more than once"));
        assert_eq!(store.content_count().unwrap(), 1);
        assert_eq!(store.share_links().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_chunk_yields_no_results() {
        let store = seeded_store(&[]);
        let report = convert(
            &store,
            RecordKind::Note,
            vec![],
            &ConversionOptions::default(),
        )
        .await
        .unwrap();
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn store_failure_aborts_without_rollback() {
        let record = note("n1", EntityRef::new("acc-1", "Account"), false);
        let store = seeded_store(&[record.clone()]);
        store.inject_failure(StoreOperation::UpdateOwners).unwrap();
        let options = ConversionOptions {
            delete_source_upon_conversion: true,
            ..Default::default()
        };
        let err = convert(&store, RecordKind::Note, vec![record], &options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("UpdateOwners"));
        // Content already created stays behind, unowned and unlinked.
        assert_eq!(store.content_count().unwrap(), 1);
        assert!(store.share_links().unwrap().is_empty());
        assert!(store.source_exists(RecordKind::Note, "n1").unwrap());
    }

    #[tokio::test]
    async fn rerun_after_deletion_finds_nothing() {
        let record = note("n1", EntityRef::new("acc-1", "Account"), false);
        let store = seeded_store(&[record.clone()]);
        let options = ConversionOptions {
            delete_source_upon_conversion: true,
            ..Default::default()
        };
        convert(&store, RecordKind::Note, vec![record], &options)
            .await
            .unwrap();
        let ids = store
            .query_source_ids(RecordKind::Note, &Default::default())
            .await
            .unwrap();
        assert!(ids.is_empty());
        let again = store
            .get_source_records(RecordKind::Note, &["n1".to_string()])
            .await
            .unwrap();
        assert!(again.is_empty());
        let report = convert(&store, RecordKind::Note, again, &options)
            .await
            .unwrap();
        assert!(report.results.is_empty());
        assert_eq!(store.content_count().unwrap(), 1);
    }

    /// Delegates to an [`InMemoryStore`] but leaves the content created from
    /// one source record out of every requery.
    struct HidingStore {
        inner: InMemoryStore,
        hidden_record: String,
    }

    #[async_trait::async_trait]
    impl Store for HidingStore {
        async fn sharing_capabilities(&self) -> Result<SharingCapabilities> {
            self.inner.sharing_capabilities().await
        }

        async fn count_source_records(
            &self,
            kind: RecordKind,
            scope: &crate::options::ParentScope,
        ) -> Result<usize> {
            self.inner.count_source_records(kind, scope).await
        }

        async fn query_source_ids(
            &self,
            kind: RecordKind,
            scope: &crate::options::ParentScope,
        ) -> Result<Vec<String>> {
            self.inner.query_source_ids(kind, scope).await
        }

        async fn get_source_records(
            &self,
            kind: RecordKind,
            ids: &[String],
        ) -> Result<Vec<SourceRecord>> {
            self.inner.get_source_records(kind, ids).await
        }

        async fn get_messages(&self, ids: &[String]) -> Result<Vec<MessageRecord>> {
            self.inner.get_messages(ids).await
        }

        async fn insert_contents(&self, contents: &[NewContent]) -> Result<Vec<String>> {
            self.inner.insert_contents(contents).await
        }

        async fn get_contents(&self, version_ids: &[String]) -> Result<Vec<StoredContent>> {
            let mut contents = self.inner.get_contents(version_ids).await?;
            contents.retain(|c| c.provenance.original_record_id != self.hidden_record);
            Ok(contents)
        }

        async fn update_content_owners(&self, updates: &[OwnerUpdate]) -> Result<()> {
            self.inner.update_content_owners(updates).await
        }

        async fn insert_share_links(&self, links: &[ShareLink]) -> Result<()> {
            self.inner.insert_share_links(links).await
        }

        async fn delete_source_records(&self, kind: RecordKind, ids: &[String]) -> Result<()> {
            self.inner.delete_source_records(kind, ids).await
        }
    }

    #[tokio::test]
    async fn content_missing_from_requery_keeps_success_but_nothing_else() {
        let seen = note("n1", EntityRef::new("acc-1", "Account"), false);
        let lost = note("n2", EntityRef::new("acc-1", "Account"), false);
        let store = HidingStore {
            inner: seeded_store(&[seen.clone(), lost.clone()]),
            hidden_record: "n2".to_string(),
        };
        let options = ConversionOptions {
            delete_source_upon_conversion: true,
            ..Default::default()
        };
        let caps = store.sharing_capabilities().await.unwrap();
        let report = ConversionPipeline::new(&store, &caps, RecordKind::Note, &options)
            .convert(vec![seen, lost])
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.converted, 2);
        assert_eq!(report.share_links, 1);
        assert_eq!(report.deleted, 1);

        let result = &report.results[1];
        assert_eq!(result.source_record_id, "n2");
        assert!(result.success);
        assert!(result.new_content_id.is_some());
        assert!(result.content_document_id.is_none());
        assert!(result.message.contains("could not be requeried"));

        // Created, but still owned by the running identity and unshared.
        let stored = store.inner.content_for_record("n2").unwrap().unwrap();
        assert_eq!(stored.owner_id, store.inner.running_user());
        assert!(store
            .inner
            .share_links_for_document(&stored.document_id)
            .unwrap()
            .is_empty());
        assert!(store.inner.source_exists(RecordKind::Note, "n2").unwrap());

        assert!(!store.inner.source_exists(RecordKind::Note, "n1").unwrap());
        let kept = store.inner.content_for_record("n1").unwrap().unwrap();
        assert_eq!(kept.owner_id, "owner-1");
    }
}
