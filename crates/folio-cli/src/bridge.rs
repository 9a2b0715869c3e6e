//! HTTP transport for the encryption service.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::debug;

use folio_core::bridge::{BridgeAction, BridgeResponse, EncryptionBridge};
use folio_core::error::BridgeError;
use folio_core::models::BridgeConfig;

/// Sends multipart requests to the service at `base_url`.
pub struct HttpBridge {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpBridge {
    pub fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self, action: BridgeAction) -> String {
        format!("{}{}", self.base_url, action.path())
    }

    fn transport_error(&self, error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Timeout(self.timeout_secs)
        } else {
            BridgeError::Unreachable(error.to_string())
        }
    }
}

impl EncryptionBridge for HttpBridge {
    async fn send(
        &self,
        action: BridgeAction,
        file: &[u8],
        password: &str,
    ) -> Result<BridgeResponse, BridgeError> {
        let part = Part::bytes(file.to_vec())
            .file_name("document.pdf")
            .mime_str("application/pdf")
            .map_err(|e| self.transport_error(e))?;
        let form = Form::new()
            .part("file", part)
            .text("password", password.to_string());

        let url = self.url(action);
        debug!("POST {} ({} bytes)", url, file.len());
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?
            .to_vec();
        debug!("{} answered {} with {} bytes", url, status, body.len());
        Ok(BridgeResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let config = BridgeConfig {
            base_url: "http://localhost:3001/".to_string(),
            ..BridgeConfig::default()
        };
        let bridge = HttpBridge::new(&config).unwrap();
        assert_eq!(bridge.url(BridgeAction::Lock), "http://localhost:3001/lock");
        assert_eq!(bridge.url(BridgeAction::Unlock), "http://localhost:3001/unlock");
    }
}
