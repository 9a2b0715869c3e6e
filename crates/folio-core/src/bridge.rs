//! Contract with the external encryption service.
//!
//! Adding or removing a password is delegated to an out-of-process tool
//! behind two endpoints, `POST /lock` and `POST /unlock`, each taking a
//! multipart `file` and `password`. This module defines the transport
//! trait, response classification and the retry loop; transports live in
//! the front ends.

use std::future::Future;
use tracing::{debug, warn};

use crate::context::OperationContext;
use crate::error::{BridgeError, Result, ValidationError};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Which endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    Lock,
    Unlock,
}

impl BridgeAction {
    pub fn path(self) -> &'static str {
        match self {
            BridgeAction::Lock => "/lock",
            BridgeAction::Unlock => "/unlock",
        }
    }
}

/// Raw status and body of a bridge response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Transport to the encryption service.
pub trait EncryptionBridge {
    /// Send `file` and `password` to the endpoint for `action`.
    ///
    /// Only transport failures are errors here; HTTP error statuses come
    /// back as a response and are classified by the caller.
    fn send(
        &self,
        action: BridgeAction,
        file: &[u8],
        password: &str,
    ) -> impl Future<Output = std::result::Result<BridgeResponse, BridgeError>>;
}

/// Map a response to the document bytes or a [`BridgeError`].
pub fn classify_bridge_response(response: BridgeResponse) -> std::result::Result<Vec<u8>, BridgeError> {
    match response.status {
        200..=299 => {
            if response.body.is_empty() {
                Err(BridgeError::InvalidResponse("empty body".to_string()))
            } else if !response.body.starts_with(PDF_MAGIC) {
                Err(BridgeError::InvalidResponse("body is not a PDF".to_string()))
            } else {
                Ok(response.body)
            }
        }
        status @ 400..=499 => Err(BridgeError::Rejected {
            status,
            message: body_text(&response.body),
        }),
        status @ 500..=599 => Err(BridgeError::Failed {
            status,
            message: body_text(&response.body),
        }),
        status => Err(BridgeError::InvalidResponse(format!("unexpected status {status}"))),
    }
}

fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).trim().to_string()
}

/// Encrypt `file` with `password` through the bridge.
pub async fn lock_document<B: EncryptionBridge>(
    ctx: &OperationContext,
    bridge: &B,
    file: &[u8],
    password: &str,
) -> Result<Vec<u8>> {
    call(ctx, bridge, BridgeAction::Lock, file, password).await
}

/// Remove the password from `file` through the bridge.
pub async fn unlock_document<B: EncryptionBridge>(
    ctx: &OperationContext,
    bridge: &B,
    file: &[u8],
    password: &str,
) -> Result<Vec<u8>> {
    call(ctx, bridge, BridgeAction::Unlock, file, password).await
}

async fn call<B: EncryptionBridge>(
    ctx: &OperationContext,
    bridge: &B,
    action: BridgeAction,
    file: &[u8],
    password: &str,
) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(ValidationError::MissingPassword.into());
    }
    if !file.starts_with(PDF_MAGIC) {
        return Err(ValidationError::EmptyInput("input is not a PDF file".to_string()).into());
    }

    let attempts = ctx.config().bridge.retries + 1;
    let mut attempt = 1;
    loop {
        ctx.checkpoint()?;
        let outcome = bridge
            .send(action, file, password)
            .await
            .and_then(classify_bridge_response);
        ctx.checkpoint()?;

        match outcome {
            Ok(bytes) => {
                debug!("{} succeeded on attempt {}", action.path(), attempt);
                return Ok(bytes);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!("{} attempt {} failed: {}; retrying", action.path(), attempt, e);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
