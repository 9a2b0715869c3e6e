//! Parse PDF bytes into a [`PdfDocument`], handling encryption.

use std::collections::{BTreeMap, HashSet};

use lopdf::xref::XrefEntry;
use lopdf::{Document, ObjectId, Reader};
use tracing::{debug, warn};

use super::{EncryptionStatus, PdfDocument, tree};
use crate::error::{PdfError, Result};

/// Options for [`load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Password for encrypted documents. Empty strings count as absent.
    pub password: Option<String>,

    /// Return encrypted documents that cannot be opened in the `Locked`
    /// state instead of failing with `PasswordRequired`. Only inspection
    /// should ask for this; page content of a locked document cannot be
    /// copied.
    pub allow_locked: bool,
}

impl LoadOptions {
    /// Options with a password.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            allow_locked: false,
        }
    }

    /// Allow locked documents.
    pub fn allow_locked(mut self, allow: bool) -> Self {
        self.allow_locked = allow;
        self
    }
}

/// Load a document from bytes.
///
/// Without a password, documents encrypted with an empty user password are
/// decrypted transparently. With a password, a rejected password fails with
/// `IncorrectPassword`; any other failure retries once without the password.
pub fn load(bytes: &[u8], options: &LoadOptions) -> Result<PdfDocument> {
    if bytes.is_empty() {
        return Err(PdfError::Corrupt("input is empty".to_string()).into());
    }

    let password = options.password.as_deref().filter(|p| !p.is_empty());
    let document = match password {
        Some(password) => load_with_password(bytes, password)?,
        None => open(bytes, options)?,
    };

    tree::pages_root(&document.inner)?;
    debug!(
        "Loaded PDF {} with {} pages ({:?})",
        document.inner.version,
        document.page_count(),
        document.encryption()
    );
    Ok(document)
}

fn load_with_password(bytes: &[u8], password: &str) -> Result<PdfDocument> {
    match Document::load_mem_with_password(bytes, password) {
        Ok(mut doc) => {
            if strip_encryption(&mut doc) {
                return Ok(PdfDocument::from_parts(doc, EncryptionStatus::Decrypted));
            }
            if doc.is_encrypted() {
                return Err(PdfError::IncorrectPassword.into());
            }
            Ok(PdfDocument::from_parts(doc, EncryptionStatus::None))
        }
        Err(lopdf::Error::InvalidPassword) => Err(PdfError::IncorrectPassword.into()),
        Err(e) => {
            debug!("Load with password failed ({}), retrying without", e);
            let mut doc = Document::load_mem(bytes).map_err(|e| PdfError::Corrupt(e.to_string()))?;
            if strip_encryption(&mut doc) {
                return Ok(PdfDocument::from_parts(doc, EncryptionStatus::Decrypted));
            }
            if doc.is_encrypted() {
                return Err(PdfError::Corrupt(format!("could not decrypt document: {e}")).into());
            }
            Ok(PdfDocument::from_parts(doc, EncryptionStatus::None))
        }
    }
}

fn open(bytes: &[u8], options: &LoadOptions) -> Result<PdfDocument> {
    let mut doc = Document::load_mem(bytes).map_err(|e| PdfError::Corrupt(e.to_string()))?;
    if strip_encryption(&mut doc) {
        debug!("Decrypted PDF with empty password");
        return Ok(PdfDocument::from_parts(doc, EncryptionStatus::Decrypted));
    }
    if !doc.is_encrypted() {
        return Ok(PdfDocument::from_parts(doc, EncryptionStatus::None));
    }
    if !options.allow_locked {
        return Err(PdfError::PasswordRequired.into());
    }
    warn!("Opened encrypted document without its password; content stays encrypted");
    Ok(PdfDocument::from_parts(read_raw_objects(bytes, doc), EncryptionStatus::Locked))
}

/// Fill an encrypted document that was parsed without its key with every
/// uncompressed object exactly as stored. Strings and streams stay
/// ciphertext; the page tree structure is readable.
fn read_raw_objects(bytes: &[u8], document: Document) -> Document {
    let start = bytes.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
    let ids: Vec<ObjectId> = document
        .reference_table
        .entries
        .iter()
        .filter_map(|(&number, entry)| match entry {
            XrefEntry::Normal { generation, .. } => Some((number, *generation)),
            _ => None,
        })
        .collect();

    let mut reader = Reader {
        buffer: &bytes[start..],
        document,
        encryption_state: None,
        raw_objects: BTreeMap::new(),
        password: None,
    };
    for id in ids {
        if reader.document.objects.contains_key(&id) {
            continue;
        }
        match reader.get_object(id, &mut HashSet::new()) {
            Ok(object) => {
                reader.document.objects.insert(id, object);
            }
            Err(e) => debug!("Skipping object {} {}: {}", id.0, id.1, e),
        }
    }
    reader.document
}

/// Drop the decryption state and `/Encrypt` entry of a decrypted document
/// so it serializes as plain text. Returns whether it had been decrypted.
fn strip_encryption(doc: &mut Document) -> bool {
    if doc.encryption_state.take().is_none() {
        return false;
    }
    doc.trailer.remove(b"Encrypt");
    true
}
