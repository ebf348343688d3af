//! Per-kind content strategies.
//!
//! Notes and attachments share one pipeline. The few places where they
//! differ (payload encoding, file name, content type, routing through
//! inbound messages) are answered by a [`ContentStrategy`].

use crate::models::{NewContent, Provenance, RecordBody, RecordKind, SourceRecord};

/// Content type given to converted notes.
pub const NOTE_CONTENT_TYPE: &str = "text/html";

const DEFAULT_BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// How one record kind turns into a [`NewContent`].
pub trait ContentStrategy: Send + Sync {
    fn kind(&self) -> RecordKind;

    /// Bytes stored as the content payload.
    fn payload(&self, record: &SourceRecord) -> Vec<u8>;

    fn title(&self, record: &SourceRecord) -> String {
        record.title.clone()
    }

    /// File name reported for the content version.
    fn path_on_client(&self, record: &SourceRecord) -> String;

    fn content_type(&self, record: &SourceRecord) -> String;

    /// Whether records of this kind may be shared with the parent of an
    /// inbound email message instead of the message itself.
    fn routes_through_messages(&self) -> bool {
        false
    }

    fn build(&self, record: &SourceRecord) -> NewContent {
        NewContent {
            title: self.title(record),
            path_on_client: self.path_on_client(record),
            content_type: self.content_type(record),
            payload: self.payload(record),
            description: record.description.clone(),
            provenance: Provenance::of(record),
        }
    }
}

/// Converts text notes into rich-text content.
pub struct NoteStrategy;

impl ContentStrategy for NoteStrategy {
    fn kind(&self) -> RecordKind {
        RecordKind::Note
    }

    fn payload(&self, record: &SourceRecord) -> Vec<u8> {
        match &record.body {
            RecordBody::Text(text) => escape_rich_text(text).into_bytes(),
            RecordBody::Binary { data, .. } => data.clone(),
        }
    }

    fn path_on_client(&self, record: &SourceRecord) -> String {
        format!("{}.snote", record.title)
    }

    fn content_type(&self, _record: &SourceRecord) -> String {
        NOTE_CONTENT_TYPE.to_string()
    }
}

/// Converts binary attachments into files, payload copied verbatim.
pub struct AttachmentStrategy;

impl ContentStrategy for AttachmentStrategy {
    fn kind(&self) -> RecordKind {
        RecordKind::Attachment
    }

    fn payload(&self, record: &SourceRecord) -> Vec<u8> {
        match &record.body {
            RecordBody::Binary { data, .. } => data.clone(),
            RecordBody::Text(text) => text.as_bytes().to_vec(),
        }
    }

    fn path_on_client(&self, record: &SourceRecord) -> String {
        record.title.clone()
    }

    fn content_type(&self, record: &SourceRecord) -> String {
        match &record.body {
            RecordBody::Binary {
                content_type: Some(ct),
                ..
            } if !ct.trim().is_empty() => ct.clone(),
            _ => DEFAULT_BINARY_CONTENT_TYPE.to_string(),
        }
    }

    fn routes_through_messages(&self) -> bool {
        true
    }
}

/// Strategy for a record kind.
pub fn strategy_for(kind: RecordKind) -> &'static dyn ContentStrategy {
    match kind {
        RecordKind::Note => &NoteStrategy,
        RecordKind::Attachment => &AttachmentStrategy,
    }
}

/// Escape plain text for the rich-text note dialect.
///
/// XML special characters are escaped, every line break (`\r\n`, `\r`,
/// `\n`) becomes `<br>`, and `&apos;` is rewritten to `&#39;`, which is
/// the only apostrophe entity the dialect accepts.
pub fn escape_rich_text(text: &str) -> String {
    let escaped = quick_xml::escape::escape(text);
    escaped
        .replace("\r\n", "<br>")
        .replace('\r', "<br>")
        .replace('\n', "<br>")
        .replace("&apos;", "&#39;")
}
