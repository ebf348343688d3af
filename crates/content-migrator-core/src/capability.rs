//! Sharing-capability lookup.
//!
//! An entity type either supports share links or it does not. The lookup
//! is pure: implementations answer from type metadata loaded up front.

use std::collections::HashSet;

/// Answers whether an entity type supports share links.
pub trait CapabilityLookup: Send + Sync {
    fn supports_sharing(&self, entity_type: &str) -> bool;
}

/// Set of entity types with the sharing capability enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharingCapabilities {
    enabled: HashSet<String>,
}

impl SharingCapabilities {
    pub fn new<I, S>(enabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: enabled.into_iter().map(Into::into).collect(),
        }
    }

    pub fn enable(&mut self, entity_type: impl Into<String>) {
        self.enabled.insert(entity_type.into());
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

impl CapabilityLookup for SharingCapabilities {
    fn supports_sharing(&self, entity_type: &str) -> bool {
        self.enabled.contains(entity_type)
    }
}
