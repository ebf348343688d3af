//! Per-record conversion results.
//!
//! [`ResultLog`] holds exactly one [`ConversionResult`] per input record,
//! keyed by the source record id. Phases seed it with failures, record
//! successes, and append messages to existing entries in place. A record
//! id seen twice in one chunk keeps its own failed entry beside the first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outcome of converting one source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    pub source_record_id: String,
    /// Id of the created content version, if any.
    pub new_content_id: Option<String>,
    /// Id of the content document, known once the content is requeried.
    pub content_document_id: Option<String>,
    /// Diagnostics, empty unless something worth reporting happened.
    pub message: String,
}

impl ConversionResult {
    pub fn failed(source_record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            source_record_id: source_record_id.into(),
            new_content_id: None,
            content_document_id: None,
            message: message.into(),
        }
    }

    pub fn converted(source_record_id: impl Into<String>, new_content_id: impl Into<String>) -> Self {
        Self {
            success: true,
            source_record_id: source_record_id.into(),
            new_content_id: Some(new_content_id.into()),
            content_document_id: None,
            message: String::new(),
        }
    }

    fn append(&mut self, message: &str) {
        if !self.message.is_empty() {
            self.message.push(' ');
        }
        self.message.push_str(message);
    }
}

/// Ordered map from source record id to its result.
#[derive(Debug, Default)]
pub struct ResultLog {
    results: BTreeMap<String, ConversionResult>,
    duplicates: Vec<ConversionResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the result for a source record.
    pub fn record(&mut self, result: ConversionResult) {
        self.results
            .insert(result.source_record_id.clone(), result);
    }

    /// Record a failed result for a repeated occurrence of an id. It never
    /// replaces the entry of the first occurrence.
    pub fn record_duplicate(&mut self, source_record_id: &str) {
        self.duplicates.push(ConversionResult::failed(
            source_record_id,
            format!(
                "Not converted: record {} appears more than once in this chunk.",
                source_record_id
            ),
        ));
    }

    /// Append a message to an existing result. Unknown ids are ignored so
    /// that a later phase can never invent a result.
    pub fn append_message(&mut self, source_record_id: &str, message: &str) {
        if let Some(result) = self.results.get_mut(source_record_id) {
            result.append(message);
        } else {
            tracing::warn!(source_record_id, "message for unknown record dropped");
        }
    }

    pub fn set_document_id(&mut self, source_record_id: &str, document_id: &str) {
        if let Some(result) = self.results.get_mut(source_record_id) {
            result.content_document_id = Some(document_id.to_string());
        }
    }

    pub fn get(&self, source_record_id: &str) -> Option<&ConversionResult> {
        self.results.get(source_record_id)
    }

    pub fn len(&self) -> usize {
        self.results.len() + self.duplicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.duplicates.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }

    /// Results sorted by source record id. A duplicate follows the first
    /// occurrence of its id.
    pub fn into_results(self) -> Vec<ConversionResult> {
        let mut results: Vec<ConversionResult> = self
            .results
            .into_values()
            .chain(self.duplicates)
            .collect();
        results.sort_by(|a, b| a.source_record_id.cmp(&b.source_record_id));
        results
    }
}
