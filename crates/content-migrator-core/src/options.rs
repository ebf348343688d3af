//! Conversion options.
//!
//! The options are built once by the caller (CLI or batch driver) and are
//! read-only for the lifetime of a pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{ShareType, Visibility};

/// Which parent entities a run is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentScope {
    /// No restriction.
    #[default]
    All,
    /// Only records whose parent id is in the set. An empty set selects
    /// nothing.
    Only(BTreeSet<String>),
}

impl ParentScope {
    /// Build a scope from an optional id list: `None` is unrestricted,
    /// an empty list selects nothing.
    pub fn from_ids(ids: Option<Vec<String>>) -> Self {
        match ids {
            None => ParentScope::All,
            Some(ids) => ParentScope::Only(ids.into_iter().collect()),
        }
    }

    pub fn contains(&self, parent_id: &str) -> bool {
        match self {
            ParentScope::All => true,
            ParentScope::Only(ids) => ids.contains(parent_id),
        }
    }

    /// True when the scope cannot match any record.
    pub fn is_empty(&self) -> bool {
        matches!(self, ParentScope::Only(ids) if ids.is_empty())
    }
}

/// Flags that drive the conversion pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Delete each source record once its content item exists.
    #[serde(default)]
    pub delete_source_upon_conversion: bool,
    /// Share private records with their target entity.
    #[serde(default)]
    pub share_private: bool,
    /// Convert records whose target type lacks the sharing capability.
    /// Such records never get a share link.
    #[serde(default)]
    pub convert_if_sharing_capability_disabled: bool,
    /// Share attachments of inbound email messages with the message's
    /// parent instead of the message.
    #[serde(default)]
    pub route_inbound_message_attachments_to_case: bool,
    #[serde(default)]
    pub share_type: ShareType,
    #[serde(default)]
    pub visibility: Visibility,
}
