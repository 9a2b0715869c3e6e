//! Serialize a [`PdfDocument`] back to bytes.

use chrono::Utc;
use lopdf::{Dictionary, Object, StringFormat};
use tracing::debug;

use super::{PdfDocument, encode_text_string};
use crate::error::{FolioError, PdfError, Result};
use crate::models::config::OutputConfig;

const OBJECTS_PER_STREAM: usize = 100;

/// Options for [`save`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Prune unreachable objects, flate-compress streams and pack the rest
    /// into object streams behind a cross-reference stream.
    pub compact: bool,

    /// Written to `/Producer` together with a fresh `/ModDate`.
    pub producer: Option<String>,
}

impl SaveOptions {
    /// Compact output without metadata changes.
    pub fn compact() -> Self {
        Self {
            compact: true,
            producer: None,
        }
    }

    /// Set the producer string.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }
}

impl From<&OutputConfig> for SaveOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            compact: config.compact,
            producer: config.producer.clone(),
        }
    }
}

/// Serialize the document.
///
/// Locked documents are written through the classic writer without any
/// rewriting, since their strings and streams are still ciphertext.
pub fn save(document: &mut PdfDocument, options: &SaveOptions) -> Result<Vec<u8>> {
    let locked = document.is_locked();
    if !locked {
        if let Some(producer) = &options.producer {
            stamp_metadata(document, producer);
        }
    }

    let doc = &mut document.inner;
    let mut bytes = Vec::new();
    let written = if options.compact && !locked {
        doc.prune_objects();
        doc.compress();
        doc.renumber_objects();
        let modern = lopdf::SaveOptions::builder()
            .use_object_streams(true)
            .use_xref_streams(true)
            .max_objects_per_stream(OBJECTS_PER_STREAM)
            .compression_level(6)
            .build();
        doc.save_with_options(&mut bytes, modern)
    } else {
        doc.save_to(&mut bytes)
    };
    written.map_err(|e| PdfError::Serialize(e.to_string()))?;

    if bytes.is_empty() {
        return Err(FolioError::EmptyResult("serializer produced no bytes".to_string()));
    }
    debug!(
        "Serialized {} pages into {} bytes (compact: {})",
        document.page_count(),
        bytes.len(),
        options.compact && !locked
    );
    Ok(bytes)
}

fn stamp_metadata(document: &mut PdfDocument, producer: &str) {
    let doc = &mut document.inner;
    let now = Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    let producer = Object::String(encode_text_string(producer), StringFormat::Literal);
    let mod_date = Object::String(now.into_bytes(), StringFormat::Literal);

    let info_id = match doc.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(id) if doc.get_dictionary(id).is_ok() => id,
        _ => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };
    if let Ok(info) = doc.get_dictionary_mut(info_id) {
        info.set("Producer", producer);
        info.set("ModDate", mod_date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::pdf::{LoadOptions, load};

    fn reload(bytes: &[u8]) -> PdfDocument {
        load(bytes, &LoadOptions::default()).unwrap()
    }

    #[test]
    fn test_classic_save_is_idempotent() {
        let mut doc = fixtures::sample_document(4);
        let widths = fixtures::page_widths(&doc);
        let rotations = doc.rotations();

        let bytes = save(&mut doc, &SaveOptions::default()).unwrap();
        let reloaded = reload(&bytes);
        assert_eq!(reloaded.page_count(), 4);
        assert_eq!(fixtures::page_widths(&reloaded), widths);
        assert_eq!(reloaded.rotations(), rotations);
    }

    #[test]
    fn test_compact_save_is_idempotent() {
        let mut doc = fixtures::sample_document(5);
        let widths = fixtures::page_widths(&doc);

        let bytes = save(&mut doc, &SaveOptions::compact()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1."));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/ObjStm"));
        assert!(text.contains("/XRef"));

        let mut reloaded = reload(&bytes);
        assert_eq!(fixtures::page_widths(&reloaded), widths);
        assert_eq!(reloaded.title().as_deref(), Some("Sample"));

        let again = save(&mut reloaded, &SaveOptions::compact()).unwrap();
        assert_eq!(fixtures::page_widths(&reload(&again)), widths);
    }

    #[test]
    fn test_compact_save_spans_several_object_streams() {
        let mut doc = fixtures::sample_document(120);
        let bytes = save(&mut doc, &SaveOptions::compact()).unwrap();
        let reloaded = reload(&bytes);
        assert_eq!(reloaded.page_count(), 120);
        assert_eq!(reloaded.page_size(119).unwrap().0, fixtures::page_width(119));
    }

    #[test]
    fn test_producer_is_written() {
        let mut doc = fixtures::sample_document(1);
        let options = SaveOptions::compact().with_producer("folio test");
        let bytes = save(&mut doc, &options).unwrap();
        let reloaded = reload(&bytes);
        assert_eq!(reloaded.producer().as_deref(), Some("folio test"));
    }

    #[test]
    fn test_empty_document_serializes() {
        let mut doc = PdfDocument::new();
        let bytes = save(&mut doc, &SaveOptions::compact()).unwrap();
        assert_eq!(reload(&bytes).page_count(), 0);
    }
}
