//! Source-record cleanup.

use anyhow::Result;

use crate::models::{RecordKind, StoredContent};
use crate::store::Store;

/// Delete the source records behind the requeried content, when enabled.
///
/// Deletion does not depend on whether a share link was created. Returns
/// the number of records deleted.
pub async fn delete_converted_sources(
    store: &dyn Store,
    kind: RecordKind,
    contents: &[StoredContent],
    enabled: bool,
) -> Result<usize> {
    if !enabled || contents.is_empty() {
        return Ok(0);
    }
    let ids: Vec<String> = contents
        .iter()
        .map(|c| c.provenance.original_record_id.clone())
        .collect();
    store.delete_source_records(kind, &ids).await?;
    tracing::debug!(%kind, deleted = ids.len(), "source records deleted");
    Ok(ids.len())
}
