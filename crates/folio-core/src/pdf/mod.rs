//! In-memory PDF documents: loading, inspection and serialization.

mod loader;
mod serializer;
pub(crate) mod tree;
pub(crate) mod xobject;

pub use loader::{LoadOptions, load};
pub use serializer::{SaveOptions, save};

use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Encryption state of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStatus {
    /// The source was not encrypted.
    None,
    /// Encrypted and opened without the key. Strings and streams are still
    /// ciphertext; only structural operations are meaningful.
    Locked,
    /// Encrypted in the source and decrypted on load.
    Decrypted,
}

/// A parsed PDF document owned by one operation.
#[derive(Debug)]
pub struct PdfDocument {
    pub(crate) inner: Document,
    encryption: EncryptionStatus,
}

/// Snapshot of a document for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub version: String,
    pub title: Option<String>,
    pub producer: Option<String>,
    pub encryption: EncryptionStatus,
    pub pages: Vec<PageInfo>,
}

/// Displayed size and rotation of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub number: usize,
    /// Width in points, after applying `/Rotate`.
    pub width: f32,
    /// Height in points, after applying `/Rotate`.
    pub height: f32,
    pub rotation: u16,
}

impl PdfDocument {
    /// Create a document with no pages.
    pub fn new() -> Self {
        Self::from_parts(tree::empty_document(), EncryptionStatus::None)
    }

    pub(crate) fn from_parts(inner: Document, encryption: EncryptionStatus) -> Self {
        Self { inner, encryption }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Page object ids in document order.
    pub(crate) fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().into_values().collect()
    }

    pub(crate) fn page_id(&self, index: usize) -> Result<ObjectId, ValidationError> {
        Ok(self.page_ids_at(&[index])?[0])
    }

    /// Object ids of the pages at `indices`, walking the page tree once.
    pub(crate) fn page_ids_at(&self, indices: &[usize]) -> Result<Vec<ObjectId>, ValidationError> {
        let pages = self.page_ids();
        indices
            .iter()
            .map(|&index| {
                pages.get(index).copied().ok_or(ValidationError::PageOutOfRange {
                    index,
                    page_count: pages.len(),
                })
            })
            .collect()
    }

    /// Encryption state recorded at load time.
    pub fn encryption(&self) -> EncryptionStatus {
        self.encryption
    }

    /// Whether the source bytes were encrypted.
    pub fn was_encrypted(&self) -> bool {
        self.encryption != EncryptionStatus::None
    }

    /// Whether the document is still encrypted in memory.
    pub fn is_locked(&self) -> bool {
        self.encryption == EncryptionStatus::Locked
    }

    /// Effective rotation of the page at `index`.
    pub fn rotation(&self, index: usize) -> Result<u16, ValidationError> {
        Ok(tree::page_rotation(&self.inner, self.page_id(index)?))
    }

    /// Effective rotation of every page, in order.
    pub fn rotations(&self) -> Vec<u16> {
        self.page_ids()
            .into_iter()
            .map(|id| tree::page_rotation(&self.inner, id))
            .collect()
    }

    /// Unrotated width and height of the page at `index`, in points.
    pub fn page_size(&self, index: usize) -> Result<(f32, f32), ValidationError> {
        let [x0, y0, x1, y1] = tree::page_box(&self.inner, self.page_id(index)?);
        Ok((x1 - x0, y1 - y0))
    }

    /// Document title from the Info dictionary.
    pub fn title(&self) -> Option<String> {
        self.info_string(b"Title")
    }

    /// Producer from the Info dictionary.
    pub fn producer(&self) -> Option<String> {
        self.info_string(b"Producer")
    }

    fn info_string(&self, key: &[u8]) -> Option<String> {
        if self.is_locked() {
            return None;
        }
        let info = self.inner.trailer.get(b"Info").ok()?;
        let info = tree::resolve(&self.inner, info)?.as_dict().ok()?;
        match tree::resolve(&self.inner, info.get(key).ok()?)? {
            Object::String(bytes, _) => Some(decode_text_string(bytes)),
            _ => None,
        }
    }

    /// Inspection snapshot.
    pub fn info(&self) -> DocumentInfo {
        let pages = self
            .page_ids()
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let [x0, y0, x1, y1] = tree::page_box(&self.inner, id);
                let rotation = tree::page_rotation(&self.inner, id);
                let (width, height) = if rotation % 180 == 0 {
                    (x1 - x0, y1 - y0)
                } else {
                    (y1 - y0, x1 - x0)
                };
                PageInfo {
                    number: i + 1,
                    width,
                    height,
                    rotation,
                }
            })
            .collect::<Vec<_>>();
        DocumentInfo {
            page_count: pages.len(),
            version: self.inner.version.clone(),
            title: self.title(),
            producer: self.producer(),
            encryption: self.encryption,
            pages,
        }
    }
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, otherwise
/// treated as Latin-1.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a PDF text string, using UTF-16BE only when Latin-1 is not enough.
pub(crate) fn encode_text_string(text: &str) -> Vec<u8> {
    if text.chars().all(|c| (c as u32) < 0x100) {
        return text.chars().map(|c| c as u8).collect();
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_new_document_is_empty() {
        let doc = PdfDocument::new();
        assert_eq!(doc.page_count(), 0);
        assert!(!doc.was_encrypted());
    }

    #[test]
    fn test_info_reports_displayed_size() {
        let mut doc = fixtures::sample_document(2);
        let page_id = doc.page_id(1).unwrap();
        doc.inner
            .get_dictionary_mut(page_id)
            .unwrap()
            .set("Rotate", 90);

        let info = doc.info();
        assert_eq!(info.page_count, 2);
        assert_eq!(info.pages[0].rotation, 0);
        assert_eq!(info.pages[1].rotation, 90);
        assert_eq!(info.pages[1].width, 792.0);
        assert_eq!(info.title.as_deref(), Some("Sample"));
    }

    #[test]
    fn test_page_index_out_of_range() {
        let doc = fixtures::sample_document(3);
        assert_eq!(
            doc.rotation(3),
            Err(ValidationError::PageOutOfRange {
                index: 3,
                page_count: 3
            })
        );
    }

    #[test]
    fn test_page_ids_at_keeps_requested_order() {
        let doc = fixtures::sample_document(4);
        let all = doc.page_ids();
        assert_eq!(doc.page_ids_at(&[3, 0, 3]).unwrap(), vec![all[3], all[0], all[3]]);
        assert_eq!(
            doc.page_ids_at(&[1, 4]),
            Err(ValidationError::PageOutOfRange {
                index: 4,
                page_count: 4
            })
        );
    }

    #[test]
    fn test_text_string_round_trip() {
        assert_eq!(decode_text_string(&encode_text_string("Caf\u{e9}")), "Caf\u{e9}");
        assert_eq!(decode_text_string(&encode_text_string("\u{141}\u{f3}d\u{17a}")), "\u{141}\u{f3}d\u{17a}");
    }
}
