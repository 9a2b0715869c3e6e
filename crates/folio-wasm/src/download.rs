//! Object URLs for finished documents.

use std::cell::RefCell;

use js_sys::{Array, Uint8Array};
use wasm_bindgen::JsValue;
use web_sys::{Blob, BlobPropertyBag, Url};

/// Holds at most one object URL. Publishing a new document revokes the
/// previous URL, as does releasing or dropping the slot.
#[derive(Debug, Default)]
pub struct DownloadSlot {
    url: RefCell<Option<String>>,
}

impl DownloadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `bytes` in a blob of type `mime` and return its object URL.
    pub fn publish(&self, bytes: &[u8], mime: &str) -> Result<String, JsValue> {
        let parts = Array::of1(&Uint8Array::from(bytes));
        let options = BlobPropertyBag::new();
        options.set_type(mime);
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
        let url = Url::create_object_url_with_blob(&blob)?;

        if let Some(previous) = self.url.replace(Some(url.clone())) {
            revoke(&previous);
        }
        Ok(url)
    }

    /// The URL currently held, if any.
    pub fn current(&self) -> Option<String> {
        self.url.borrow().clone()
    }

    /// Revoke the held URL.
    pub fn release(&self) {
        if let Some(url) = self.url.take() {
            revoke(&url);
        }
    }
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        self.release();
    }
}

fn revoke(url: &str) {
    if let Err(e) = Url::revoke_object_url(url) {
        tracing::debug!("Could not revoke {}: {:?}", url, e);
    }
}
