//! Batch conversion driver.
//!
//! Coordinates a full run: discover the working set ids → split them into
//! chunks → load and convert each chunk → log results → notify. Record
//! bodies are only held for the chunk being converted.
//!
//! Chunks are processed one after another, never concurrently. A store
//! failure stops the run at the failing chunk; chunks converted before it
//! stay converted and their results stay logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use content_migrator_core::models::RecordKind;
use content_migrator_core::options::{ConversionOptions, ParentScope};
use content_migrator_core::pipeline::ConversionPipeline;
use content_migrator_core::results::ConversionResult;
use content_migrator_core::store::Store;

use crate::config::{Config, MAX_CHUNK_SIZE};
use crate::conversion_log;
use crate::db;
use crate::notify;
use crate::progress::{BatchProgressEvent, BatchProgressReporter};
use crate::sqlite_store::SqliteStore;

/// Receives each chunk's results as soon as the chunk completes.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, run_id: &str, kind: RecordKind, results: &[ConversionResult]) -> Result<()>;
}

#[async_trait]
impl ResultSink for SqlitePool {
    async fn record(&self, run_id: &str, kind: RecordKind, results: &[ConversionResult]) -> Result<()> {
        conversion_log::append_results(self, run_id, kind, results).await
    }
}

/// Discards results.
pub struct NoSink;

#[async_trait]
impl ResultSink for NoSink {
    async fn record(&self, _: &str, _: RecordKind, _: &[ConversionResult]) -> Result<()> {
        Ok(())
    }
}

/// Everything a run needs besides the store.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub chunk_size: usize,
    pub scope: ParentScope,
    pub options: ConversionOptions,
}

/// Totals for one record kind.
#[derive(Debug, Clone, Default)]
pub struct KindSummary {
    pub kind: Option<RecordKind>,
    pub total: usize,
    pub chunks: usize,
    pub converted: usize,
    pub failed: usize,
    pub share_links: usize,
    pub deleted: usize,
    pub results: Vec<ConversionResult>,
}

/// Convert every eligible record of one kind.
pub async fn convert_kind(
    store: &dyn Store,
    kind: RecordKind,
    settings: &BatchSettings,
    run_id: &str,
    sink: &dyn ResultSink,
    progress: &dyn BatchProgressReporter,
) -> Result<KindSummary> {
    progress.report(BatchProgressEvent::Discovering { kind });

    let ids = store.query_source_ids(kind, &settings.scope).await?;
    let total = ids.len();
    let mut summary = KindSummary {
        kind: Some(kind),
        total,
        ..Default::default()
    };
    if total == 0 {
        tracing::info!(%kind, "nothing to convert");
        return Ok(summary);
    }

    let capabilities = store.sharing_capabilities().await?;
    let pipeline = ConversionPipeline::new(store, &capabilities, kind, &settings.options);
    let chunk_size = settings.chunk_size.max(1);
    let chunk_count = chunk_count(total, chunk_size);

    tracing::info!(%kind, records = total, chunks = chunk_count, "starting conversion");

    let mut done = 0u64;
    for (index, chunk_ids) in ids.chunks(chunk_size).enumerate() {
        let context = || format!("{} chunk {} of {} failed", kind, index + 1, chunk_count);

        // Bodies are loaded one chunk at a time.
        let chunk = store
            .get_source_records(kind, chunk_ids)
            .await
            .with_context(context)?;
        let report = pipeline.convert(chunk).await.with_context(context)?;
        sink.record(run_id, kind, &report.results).await?;

        summary.chunks += 1;
        summary.converted += report.converted;
        summary.failed += report.results.len() - report.converted;
        summary.share_links += report.share_links;
        summary.deleted += report.deleted;
        summary.results.extend(report.results);

        done += chunk_ids.len() as u64;
        progress.report(BatchProgressEvent::Converting {
            kind,
            n: done,
            total: total as u64,
        });
    }

    Ok(summary)
}

fn chunk_count(total: usize, chunk_size: usize) -> usize {
    if total == 0 {
        0
    } else {
        total.div_ceil(chunk_size.max(1))
    }
}

/// Flags given on the command line, each overriding the config file.
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    pub delete_source: Option<bool>,
    pub share_private: Option<bool>,
    pub convert_if_sharing_disabled: Option<bool>,
    pub route_message_attachments: Option<bool>,
    pub scope_parent_ids: Option<Vec<String>>,
    pub chunk_size: Option<usize>,
}

pub fn settings_from(config: &Config, overrides: &OptionOverrides) -> BatchSettings {
    let mut options = config.conversion.options();
    if let Some(v) = overrides.delete_source {
        options.delete_source_upon_conversion = v;
    }
    if let Some(v) = overrides.share_private {
        options.share_private = v;
    }
    if let Some(v) = overrides.convert_if_sharing_disabled {
        options.convert_if_sharing_capability_disabled = v;
    }
    if let Some(v) = overrides.route_message_attachments {
        options.route_inbound_message_attachments_to_case = v;
    }
    let scope = match &overrides.scope_parent_ids {
        Some(ids) => ParentScope::from_ids(Some(ids.clone())),
        None => config.conversion.scope(),
    };
    BatchSettings {
        chunk_size: overrides.chunk_size.unwrap_or(config.batch.chunk_size),
        scope,
        options,
    }
}

/// CLI entry point for `cmig convert`.
pub async fn run_convert(
    config: &Config,
    kinds: &[RecordKind],
    overrides: &OptionOverrides,
    dry_run: bool,
    progress: &dyn BatchProgressReporter,
) -> Result<()> {
    let settings = settings_from(config, overrides);
    if settings.chunk_size == 0 || settings.chunk_size > MAX_CHUNK_SIZE {
        anyhow::bail!("chunk size must be between 1 and {}", MAX_CHUNK_SIZE);
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::open(pool.clone()).await?;

    if dry_run {
        for kind in kinds {
            let total = store.count_source_records(*kind, &settings.scope).await?;
            println!("convert {} (dry-run)", kind.label());
            println!("  records found: {}", total);
            println!("  chunks: {}", chunk_count(total, settings.chunk_size));
        }
        pool.close().await;
        return Ok(());
    }

    let run_id = Uuid::new_v4().to_string();
    let mut all_results = Vec::new();

    for kind in kinds {
        let summary = convert_kind(&store, *kind, &settings, &run_id, &pool, progress).await?;

        println!("convert {}", kind.label());
        println!("  records: {}", summary.total);
        println!("  chunks: {}", summary.chunks);
        println!("  converted: {}", summary.converted);
        println!("  failed: {}", summary.failed);
        println!("  share links: {}", summary.share_links);
        if settings.options.delete_source_upon_conversion {
            println!("  deleted: {}", summary.deleted);
        }
        all_results.extend(summary.results);
    }

    println!("run: {}", run_id);
    println!("ok");

    let notifier = notify::notifier_for(&config.notify)?;
    notify::deliver(notifier.as_ref(), &all_results, &config.notify.addresses).await;

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use content_migrator_core::models::{EntityRef, RecordBody, SourceRecord};
    use content_migrator_core::store::memory::{InMemoryStore, StoreOperation};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        chunks: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ResultSink for Recording {
        async fn record(&self, _: &str, _: RecordKind, results: &[ConversionResult]) -> Result<()> {
            self.chunks.lock().unwrap().push(results.len());
            Ok(())
        }
    }

    fn store_with_notes(count: usize) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_entity_type("Account", true).unwrap();
        store.add_user("u1", true).unwrap();
        store.add_user("gone", false).unwrap();
        for i in 0..count {
            store
                .add_source_record(SourceRecord {
                    id: format!("n{:03}", i),
                    parent: EntityRef::new(format!("acc-{}", i % 3), "Account"),
                    owner_id: "u1".to_string(),
                    title: format!("Note {}", i),
                    body: RecordBody::Text("text".to_string()),
                    description: None,
                    is_private: false,
                })
                .unwrap();
        }
        store
            .add_source_record(SourceRecord {
                id: "inactive".to_string(),
                parent: EntityRef::new("acc-0", "Account"),
                owner_id: "gone".to_string(),
                title: "Old".to_string(),
                body: RecordBody::Text("text".to_string()),
                description: None,
                is_private: false,
            })
            .unwrap();
        store
    }

    fn settings(chunk_size: usize) -> BatchSettings {
        BatchSettings {
            chunk_size,
            scope: ParentScope::All,
            options: ConversionOptions::default(),
        }
    }

    #[tokio::test]
    async fn splits_working_set_into_chunks() {
        let store = store_with_notes(7);
        let sink = Recording::default();
        let summary = convert_kind(
            &store,
            RecordKind::Note,
            &settings(3),
            "run-1",
            &sink,
            &NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(summary.total, 7);
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.converted, 7);
        assert_eq!(summary.results.len(), 7);
        assert_eq!(*sink.chunks.lock().unwrap(), vec![3, 3, 1]);
        assert!(store.content_for_record("inactive").unwrap().is_none());
    }

    #[tokio::test]
    async fn scope_restricts_working_set() {
        let store = store_with_notes(6);
        let mut s = settings(200);
        s.scope = ParentScope::from_ids(Some(vec!["acc-1".to_string()]));
        let summary = convert_kind(&store, RecordKind::Note, &s, "run", &NoSink, &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary.total, 2);

        s.scope = ParentScope::from_ids(Some(vec![]));
        let summary = convert_kind(&store, RecordKind::Note, &s, "run", &NoSink, &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.chunks, 0);
    }

    #[tokio::test]
    async fn failing_chunk_stops_the_run() {
        let store = store_with_notes(4);
        store.inject_failure(StoreOperation::InsertContents).unwrap();
        let sink = Recording::default();
        let err = convert_kind(
            &store,
            RecordKind::Note,
            &settings(2),
            "run",
            &sink,
            &NoProgress,
        )
        .await
        .unwrap_err();
        assert!(format!("{:#}", err).contains("chunk 1 of 2"));
        assert!(sink.chunks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_loading_a_chunk_names_the_chunk() {
        let store = store_with_notes(3);
        store.inject_failure(StoreOperation::GetSources).unwrap();
        let err = convert_kind(
            &store,
            RecordKind::Note,
            &settings(2),
            "run",
            &NoSink,
            &NoProgress,
        )
        .await
        .unwrap_err();
        assert!(format!("{:#}", err).contains("chunk 1 of 2"));
        assert_eq!(store.content_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn record_deleted_after_discovery_is_skipped() {
        let store = store_with_notes(4);
        let ids = store
            .query_source_ids(RecordKind::Note, &ParentScope::All)
            .await
            .unwrap();
        store
            .delete_source_records(RecordKind::Note, &ids[..1])
            .await
            .unwrap();
        let records = store
            .get_source_records(RecordKind::Note, &ids[..2])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, ids[1]);
    }

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(chunk_count(0, 200), 0);
        assert_eq!(chunk_count(200, 200), 1);
        assert_eq!(chunk_count(201, 200), 2);
    }

    #[test]
    fn overrides_win_over_config() {
        let config = Config::minimal();
        let overrides = OptionOverrides {
            delete_source: Some(true),
            scope_parent_ids: Some(vec!["acc-1".to_string()]),
            chunk_size: Some(10),
            ..Default::default()
        };
        let s = settings_from(&config, &overrides);
        assert!(s.options.delete_source_upon_conversion);
        assert!(!s.options.share_private);
        assert_eq!(s.chunk_size, 10);
        assert!(s.scope.contains("acc-1"));
        assert!(!s.scope.contains("acc-2"));
    }
}
