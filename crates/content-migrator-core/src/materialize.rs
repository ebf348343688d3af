//! Content materialization.
//!
//! Builds one content version per eligible request and creates them all
//! in a single bulk call. The generated version ids are paired with their
//! requests right away, so later phases never depend on row order.

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::models::{ConversionRequest, NewContent};
use crate::results::{ConversionResult, ResultLog};
use crate::store::Store;
use crate::strategy::strategy_for;

/// Requests whose content now exists, keyed by generated version id.
#[derive(Debug, Default)]
pub struct Materialized {
    /// Version ids in creation order.
    pub version_ids: Vec<String>,
    pub by_version: HashMap<String, ConversionRequest>,
}

impl Materialized {
    pub fn is_empty(&self) -> bool {
        self.version_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.version_ids.len()
    }
}

/// Create content for every request and record a successful result for
/// each.
pub async fn materialize(
    store: &dyn Store,
    requests: Vec<ConversionRequest>,
    log: &mut ResultLog,
) -> Result<Materialized> {
    if requests.is_empty() {
        return Ok(Materialized::default());
    }

    let contents: Vec<NewContent> = requests
        .iter()
        .map(|r| strategy_for(r.record.kind()).build(&r.record))
        .collect();

    let version_ids = store.insert_contents(&contents).await?;
    if version_ids.len() != requests.len() {
        bail!(
            "store created {} content versions for {} requests",
            version_ids.len(),
            requests.len()
        );
    }

    let mut by_version = HashMap::with_capacity(requests.len());
    for (version_id, request) in version_ids.iter().zip(requests) {
        log.record(ConversionResult::converted(
            request.record.id.clone(),
            version_id.clone(),
        ));
        by_version.insert(version_id.clone(), request);
    }

    tracing::debug!(created = version_ids.len(), "content versions created");

    Ok(Materialized {
        version_ids,
        by_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityRef, RecordBody, SourceRecord};
    use crate::store::memory::InMemoryStore;

    fn note(id: &str, body: &str) -> ConversionRequest {
        ConversionRequest::to_parent(SourceRecord {
            id: id.to_string(),
            parent: EntityRef::new("acc-1", "Account"),
            owner_id: "u1".to_string(),
            title: id.to_uppercase(),
            body: RecordBody::Text(body.to_string()),
            description: None,
            is_private: false,
        })
    }

    #[tokio::test]
    async fn creates_one_version_per_request() {
        let store = InMemoryStore::new();
        let mut log = ResultLog::new();
        let created = materialize(
            &store,
            vec![note("n1", "one"), note("n2", "two & three")],
            &mut log,
        )
        .await
        .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(store.content_count().unwrap(), 2);
        for version_id in &created.version_ids {
            let request = &created.by_version[version_id];
            let result = log.get(&request.record.id).unwrap();
            assert!(result.success);
            assert_eq!(result.new_content_id.as_deref(), Some(version_id.as_str()));
        }

        let n2 = store.content_for_record("n2").unwrap().unwrap();
        assert_eq!(
            store.payload(&n2.version_id).unwrap().unwrap(),
            b"two &amp; three".to_vec()
        );
        assert_eq!(n2.title, "N2");
    }

    #[tokio::test]
    async fn content_is_owned_by_running_user_until_restored() {
        let store = InMemoryStore::with_running_user("batch-admin");
        let mut log = ResultLog::new();
        materialize(&store, vec![note("n1", "x")], &mut log)
            .await
            .unwrap();
        let stored = store.content_for_record("n1").unwrap().unwrap();
        assert_eq!(stored.owner_id, "batch-admin");
        assert_eq!(stored.provenance.original_owner_id, "u1");
    }

    #[tokio::test]
    async fn empty_input_skips_the_store() {
        let store = InMemoryStore::new();
        store
            .inject_failure(crate::store::memory::StoreOperation::InsertContents)
            .unwrap();
        let mut log = ResultLog::new();
        let created = materialize(&store, vec![], &mut log).await.unwrap();
        assert!(created.is_empty());
    }
}
