//! Share-target resolution.
//!
//! Every record is shared with its own parent, except attachments of
//! inbound email messages when routing is enabled: those go to the
//! message's parent (typically a case), because the message type never
//! supports share links.

use std::collections::HashMap;

use anyhow::Result;

use crate::models::{ConversionRequest, MessageRecord, SourceRecord, MESSAGE_ENTITY_TYPE};
use crate::options::ConversionOptions;
use crate::store::Store;
use crate::strategy::strategy_for;

/// Pair each record with the entity its content should be shared with.
///
/// Message lookups are made in a single bulk call. Output order matches
/// input order.
pub async fn resolve_requests(
    store: &dyn Store,
    records: Vec<SourceRecord>,
    options: &ConversionOptions,
) -> Result<Vec<ConversionRequest>> {
    let message_ids: Vec<String> = if options.route_inbound_message_attachments_to_case {
        let mut ids: Vec<String> = records
            .iter()
            .filter(|r| routable(r))
            .map(|r| r.parent.id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    } else {
        Vec::new()
    };

    let messages: HashMap<String, MessageRecord> = if message_ids.is_empty() {
        HashMap::new()
    } else {
        store
            .get_messages(&message_ids)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect()
    };

    let requests: Vec<ConversionRequest> = records
        .into_iter()
        .map(|record| {
            let rerouted = if routable(&record) {
                messages
                    .get(&record.parent.id)
                    .and_then(inbound_message_parent)
            } else {
                None
            };
            match rerouted {
                Some(target) => {
                    tracing::debug!(
                        record = %record.id,
                        message = %record.parent.id,
                        target = %target.id,
                        "routing attachment to message parent"
                    );
                    ConversionRequest {
                        record,
                        share_target: target,
                    }
                }
                None => ConversionRequest::to_parent(record),
            }
        })
        .collect();

    Ok(requests)
}

fn routable(record: &SourceRecord) -> bool {
    strategy_for(record.kind()).routes_through_messages()
        && record.parent.entity_type == MESSAGE_ENTITY_TYPE
}

/// Parent of an inbound, attachment-bearing message, if it has one.
fn inbound_message_parent(message: &MessageRecord) -> Option<crate::models::EntityRef> {
    if message.incoming && message.has_attachment {
        message.parent.clone()
    } else {
        None
    }
}
