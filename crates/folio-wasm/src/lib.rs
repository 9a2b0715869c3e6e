//! WASM bindings for Folio PDF page operations.
//!
//! This crate exposes the page pipeline to browsers. A [`Workbench`] owns
//! the configuration, issues an operation token per request so a newer
//! request supersedes an older one, and keeps the object URL of the last
//! published download.

mod download;
mod fetch;

use std::sync::{Arc, Mutex};

use js_sys::{Array, Object, Promise, Reflect, Uint8Array};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use folio_core::models::FolioConfig;
use folio_core::ops::{NumberStyle, parse_page_ranges};
use folio_core::{
    ErrorKind, FolioError, InputFile, OperationContext, OperationRequest, OperationResult,
    OperationTracker, SaveOptions, execute, images_to_pdf, inspect, lock_document, save,
    unlock_document,
};

pub use download::DownloadSlot;
pub use fetch::FetchBridge;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Error shape handed to JavaScript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
    pub retryable: bool,
}

impl From<&FolioError> for ErrorView {
    fn from(error: &FolioError) -> Self {
        Self {
            kind: error.kind(),
            message: error.user_message(),
            detail: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

fn error_to_js(error: FolioError) -> JsValue {
    tracing::debug!("{:?}", error);
    serde_wasm_bindgen::to_value(&ErrorView::from(&error))
        .unwrap_or_else(|_| JsValue::from_str(&error.user_message()))
}

fn serde_error(error: serde_wasm_bindgen::Error) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Describe a PDF: page count, page sizes, metadata and encryption.
#[wasm_bindgen(js_name = inspectPdf)]
pub fn inspect_pdf(bytes: Vec<u8>, password: Option<String>) -> Result<JsValue, JsValue> {
    let mut input = InputFile::new("document.pdf", bytes);
    if let Some(password) = password {
        input = input.with_password(password);
    }
    let info = inspect(&input).map_err(error_to_js)?;
    serde_wasm_bindgen::to_value(&info).map_err(serde_error)
}

/// Parse 1-based range text (e.g. "1-3, 5, 8-") into zero-based
/// `{start, end}` ranges.
#[wasm_bindgen(js_name = parsePageRanges)]
pub fn parse_page_ranges_js(text: &str, page_count: Option<usize>) -> Result<JsValue, JsValue> {
    let ranges = parse_page_ranges(text, page_count).map_err(|e| error_to_js(e.into()))?;
    serde_wasm_bindgen::to_value(&ranges).map_err(serde_error)
}

/// Render one page label, e.g. `formatPageNumber("{n} of {total}", 3, 10, "arabic")`.
#[wasm_bindgen(js_name = formatPageNumber)]
pub fn format_page_number(format: &str, n: usize, total: usize, style: JsValue) -> Result<String, JsValue> {
    let style: NumberStyle = if style.is_undefined() || style.is_null() {
        NumberStyle::default()
    } else {
        serde_wasm_bindgen::from_value(style).map_err(serde_error)?
    };
    Ok(folio_core::ops::format_page_number(format, n, total, style))
}

/// Plain text of every page.
#[wasm_bindgen(js_name = pdfToText)]
pub fn pdf_to_text(bytes: &[u8]) -> Result<String, JsValue> {
    folio_core::pdf_to_text(bytes).map_err(error_to_js)
}

/// Read `{name, bytes, password?}` objects.
fn read_inputs(files: &Array) -> Result<Vec<InputFile>, JsValue> {
    files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let name = Reflect::get(&file, &"name".into())?
                .as_string()
                .unwrap_or_else(|| format!("document-{}.pdf", index + 1));
            let bytes = Reflect::get(&file, &"bytes".into())?;
            if bytes.is_undefined() || bytes.is_null() {
                return Err(JsValue::from_str(&format!("file {} has no bytes", name)));
            }
            let input = InputFile::new(name, Uint8Array::new(&bytes).to_vec());
            Ok(match Reflect::get(&file, &"password".into())?.as_string() {
                Some(password) if !password.is_empty() => input.with_password(password),
                _ => input,
            })
        })
        .collect()
}

/// The summary plus a `files` array of `{name, bytes, page_count}`.
fn result_to_js(result: &OperationResult) -> Result<JsValue, JsValue> {
    let summary = serde_wasm_bindgen::to_value(&result.summary()).map_err(serde_error)?;
    let files = Array::new();
    for output in &result.outputs {
        let file = Object::new();
        Reflect::set(&file, &"name".into(), &output.name.as_str().into())?;
        Reflect::set(&file, &"bytes".into(), &Uint8Array::from(output.bytes.as_slice()))?;
        Reflect::set(&file, &"page_count".into(), &(output.page_count as u32).into())?;
        files.push(&file);
    }
    Reflect::set(&summary, &"files".into(), &files)?;
    Ok(summary)
}

/// Progress of the operation that owns it, keyed by token id.
///
/// Reports carrying any other id are dropped, so a superseded operation
/// still winding down cannot overwrite the newer one's progress.
#[derive(Debug, Clone, Default)]
struct Progress(Arc<Mutex<(u64, f64)>>);

impl Progress {
    /// Hand ownership to operation `id`, starting at zero.
    fn reset(&self, id: u64) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = (id, 0.0);
        }
    }

    fn set(&self, id: u64, fraction: f64) {
        if let Ok(mut slot) = self.0.lock() {
            if slot.0 == id {
                slot.1 = fraction;
            }
        }
    }

    fn get(&self) -> f64 {
        self.0.lock().map(|slot| slot.1).unwrap_or_default()
    }
}

/// Browser entry point for running operations.
#[wasm_bindgen]
pub struct Workbench {
    config: FolioConfig,
    tracker: OperationTracker,
    progress: Progress,
    download: DownloadSlot,
}

#[wasm_bindgen]
impl Workbench {
    /// Create a workbench; `config` is a partial configuration object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Workbench, JsValue> {
        let config: FolioConfig = if config.is_undefined() || config.is_null() {
            FolioConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(serde_error)?
        };
        config.validate().map_err(error_to_js)?;

        Ok(Self {
            config,
            tracker: OperationTracker::new(),
            progress: Progress::default(),
            download: DownloadSlot::new(),
        })
    }

    /// Run a request (e.g. `{kind: "rotate", angle: 90}`) over
    /// `[{name, bytes, password?}]`. Resolves to the result summary with
    /// the output files, or rejects with `{kind, message, detail, retryable}`.
    /// A request started later makes this one reject with kind `cancelled`.
    pub fn run(&self, files: Array, request: JsValue) -> Result<Promise, JsValue> {
        let inputs = read_inputs(&files)?;
        let request: OperationRequest = serde_wasm_bindgen::from_value(request).map_err(serde_error)?;
        let ctx = self.context();

        Ok(future_to_promise(async move {
            let result = execute(&ctx, inputs, &request).await.map_err(error_to_js)?;
            for warning in &result.warnings {
                web_sys::console::warn_1(&warning.as_str().into());
            }
            result_to_js(&result)
        }))
    }

    /// Put each image (JPEG or PNG) on its own page. Resolves to the PDF bytes.
    #[wasm_bindgen(js_name = imagesToPdf)]
    pub fn images_to_pdf(&self, files: Array) -> Result<Promise, JsValue> {
        let inputs = read_inputs(&files)?;
        let ctx = self.context();
        let options = SaveOptions::from(&self.config.output);

        Ok(future_to_promise(async move {
            let mut document = images_to_pdf(&ctx, &inputs).map_err(error_to_js)?;
            ctx.checkpoint().map_err(error_to_js)?;
            let bytes = save(&mut document, &options).map_err(error_to_js)?;
            ctx.report_progress(1.0);
            Ok(Uint8Array::from(bytes.as_slice()).into())
        }))
    }

    /// Add a password through the encryption service.
    pub fn lock(&self, bytes: Vec<u8>, password: String) -> Promise {
        self.encrypt(bytes, password, true)
    }

    /// Remove a password through the encryption service.
    pub fn unlock(&self, bytes: Vec<u8>, password: String) -> Promise {
        self.encrypt(bytes, password, false)
    }

    /// Supersede whatever is running.
    pub fn cancel(&self) {
        let token = self.tracker.begin();
        self.progress.reset(token.id());
    }

    /// Fraction in `0..=1` reported by the latest operation.
    #[wasm_bindgen(getter)]
    pub fn progress(&self) -> f64 {
        self.progress.get()
    }

    /// Publish a document for download, revoking the previous URL.
    pub fn publish(&self, bytes: &[u8]) -> Result<String, JsValue> {
        self.download.publish(bytes, "application/pdf")
    }

    /// URL of the published download, if any.
    #[wasm_bindgen(getter, js_name = downloadUrl)]
    pub fn download_url(&self) -> Option<String> {
        self.download.current()
    }

    /// Revoke the published download URL.
    pub fn release(&self) {
        self.download.release();
    }
}

impl Workbench {
    /// Start a new operation token, superseding every running request.
    fn context(&self) -> OperationContext {
        let token = self.tracker.begin();
        let id = token.id();
        self.progress.reset(id);
        let progress = self.progress.clone();
        OperationContext::new(self.config.clone(), token).with_progress(move |fraction| progress.set(id, fraction))
    }

    fn encrypt(&self, bytes: Vec<u8>, password: String, lock: bool) -> Promise {
        let ctx = self.context();
        let bridge = FetchBridge::new(&self.config.bridge);

        future_to_promise(async move {
            let result = if lock {
                lock_document(&ctx, &bridge, &bytes, &password).await
            } else {
                unlock_document(&ctx, &bridge, &bytes, &password).await
            };
            let output = result.map_err(error_to_js)?;
            ctx.report_progress(1.0);
            Ok(Uint8Array::from(output.as_slice()).into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::error::{BridgeError, ValidationError};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_view() {
        let error = FolioError::from(ValidationError::InvalidRotation(45));
        let view = ErrorView::from(&error);
        assert_eq!(view.kind, ErrorKind::Validation);
        assert!(view.message.contains("45"));
        assert!(!view.retryable);

        let error = FolioError::from(BridgeError::Timeout(60));
        assert!(ErrorView::from(&error).retryable);
    }

    #[test]
    fn test_progress_round_trips_fraction() {
        let progress = Progress::default();
        assert_eq!(progress.get(), 0.0);
        progress.reset(1);
        let shared = progress.clone();
        shared.set(1, 0.75);
        assert_eq!(progress.get(), 0.75);
    }

    #[test]
    fn test_superseded_operation_cannot_overwrite_progress() {
        let tracker = OperationTracker::new();
        let progress = Progress::default();

        let first = tracker.begin();
        progress.reset(first.id());
        progress.set(first.id(), 0.9);

        let second = tracker.begin();
        progress.reset(second.id());
        assert_eq!(progress.get(), 0.0);

        progress.set(first.id(), 1.0);
        assert_eq!(progress.get(), 0.0);
        progress.set(second.id(), 0.25);
        assert_eq!(progress.get(), 0.25);
    }

    #[test]
    fn test_workbench_progress_follows_latest_context() {
        let bench = Workbench {
            config: FolioConfig::default(),
            tracker: OperationTracker::new(),
            progress: Progress::default(),
            download: DownloadSlot::new(),
        };
        let stale = bench.context();
        let current = bench.context();

        stale.report_progress(0.8);
        assert_eq!(bench.progress(), 0.0);
        current.report_progress(0.5);
        assert_eq!(bench.progress(), 0.5);

        bench.cancel();
        current.report_progress(0.9);
        assert_eq!(bench.progress(), 0.0);
    }
}
