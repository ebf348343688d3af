//! Ownership and share-link restoration.
//!
//! Created content is requeried to learn its document id, then paired
//! with its request through the version id. Each content document gets
//! the original record's owner back, and a share link to the resolved
//! target when the target type and the privacy options allow it.

use anyhow::Result;

use crate::capability::CapabilityLookup;
use crate::materialize::Materialized;
use crate::models::{OwnerUpdate, ShareLink, StoredContent};
use crate::options::ConversionOptions;
use crate::results::ResultLog;
use crate::store::Store;

pub const PRIVATE_LINK_SKIPPED: &str =
    "Share link not created because the record is private and share_private is disabled.";

const NOT_REQUERIED: &str = "Content was created but could not be requeried; owner and share link were not restored.";

/// Content that survived the requery, ready for cleanup.
#[derive(Debug, Default)]
pub struct Restored {
    pub contents: Vec<StoredContent>,
    pub owner_updates: usize,
    pub share_links: usize,
}

/// Requery created content, restore owners, and create share links.
pub async fn restore_ownership_and_links(
    store: &dyn Store,
    created: &Materialized,
    capabilities: &dyn CapabilityLookup,
    options: &ConversionOptions,
    log: &mut ResultLog,
) -> Result<Restored> {
    if created.is_empty() {
        return Ok(Restored::default());
    }

    let contents = store.get_contents(&created.version_ids).await?;

    let mut owner_updates = Vec::with_capacity(contents.len());
    let mut links = Vec::with_capacity(contents.len());

    for content in &contents {
        let Some(request) = created.by_version.get(&content.version_id) else {
            tracing::warn!(version = %content.version_id, "requeried content matches no request");
            continue;
        };
        let record = &request.record;
        let target = &request.share_target;

        log.set_document_id(&record.id, &content.document_id);

        owner_updates.push(OwnerUpdate {
            document_id: content.document_id.clone(),
            owner_id: record.owner_id.clone(),
        });

        if capabilities.supports_sharing(&target.entity_type) {
            if !record.is_private || options.share_private {
                links.push(ShareLink {
                    linked_entity_id: target.id.clone(),
                    content_document_id: content.document_id.clone(),
                    share_type: options.share_type,
                    visibility: options.visibility,
                });
            } else {
                log.append_message(&record.id, PRIVATE_LINK_SKIPPED);
            }
        } else {
            log.append_message(&record.id, &capability_skip_message(&target.entity_type));
        }
    }

    let requeried: std::collections::HashSet<&str> =
        contents.iter().map(|c| c.version_id.as_str()).collect();
    for (version_id, request) in &created.by_version {
        if !requeried.contains(version_id.as_str()) {
            log.append_message(&request.record.id, NOT_REQUERIED);
        }
    }

    if !owner_updates.is_empty() {
        store.update_content_owners(&owner_updates).await?;
    }
    if !links.is_empty() {
        store.insert_share_links(&links).await?;
    }

    tracing::debug!(
        owners = owner_updates.len(),
        links = links.len(),
        "ownership and share links restored"
    );

    Ok(Restored {
        contents,
        owner_updates: owner_updates.len(),
        share_links: links.len(),
    })
}

fn capability_skip_message(target_type: &str) -> String {
    format!(
        "Share link not created because entity type '{}' does not support sharing.",
        target_type
    )
}
