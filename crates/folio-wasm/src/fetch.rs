//! Encryption bridge over the browser `fetch` API.

use js_sys::{Array, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortSignal, Blob, BlobPropertyBag, DomException, FormData, RequestInit, Response};

use folio_core::bridge::{BridgeAction, BridgeResponse, EncryptionBridge};
use folio_core::error::BridgeError;
use folio_core::models::BridgeConfig;

/// Posts multipart forms to the encryption service.
pub struct FetchBridge {
    base_url: String,
    timeout_secs: u64,
}

impl FetchBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        }
    }

    fn form(file: &[u8], password: &str) -> Result<FormData, JsValue> {
        let options = BlobPropertyBag::new();
        options.set_type("application/pdf");
        let blob = Blob::new_with_u8_array_sequence_and_options(&Array::of1(&Uint8Array::from(file)), &options)?;

        let form = FormData::new()?;
        form.append_with_blob_and_filename("file", &blob, "document.pdf")?;
        form.append_with_str("password", password)?;
        Ok(form)
    }

    fn classify(&self, error: JsValue) -> BridgeError {
        match error.dyn_ref::<DomException>() {
            Some(e) if e.name() == "TimeoutError" || e.name() == "AbortError" => {
                BridgeError::Timeout(self.timeout_secs)
            }
            _ => BridgeError::Unreachable(describe(&error)),
        }
    }

    async fn post(&self, action: BridgeAction, file: &[u8], password: &str) -> Result<BridgeResponse, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&Self::form(file, password)?.into());
        let timeout_ms = u32::try_from(self.timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
        init.set_signal(Some(&AbortSignal::timeout_with_u32(timeout_ms)));

        let url = format!("{}{}", self.base_url, action.path());
        let response: Response = JsFuture::from(window.fetch_with_str_and_init(&url, &init))
            .await?
            .dyn_into()?;
        let status = response.status();
        let body = JsFuture::from(response.array_buffer()?).await?;

        Ok(BridgeResponse {
            status,
            body: Uint8Array::new(&body).to_vec(),
        })
    }
}

impl EncryptionBridge for FetchBridge {
    async fn send(
        &self,
        action: BridgeAction,
        file: &[u8],
        password: &str,
    ) -> Result<BridgeResponse, BridgeError> {
        self.post(action, file, password).await.map_err(|e| self.classify(e))
    }
}

fn describe(error: &JsValue) -> String {
    error
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| error.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}
