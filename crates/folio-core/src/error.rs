//! Error types for the folio-core library.

use thiserror::Error;

/// Main error type for the folio library.
#[derive(Error, Debug)]
pub enum FolioError {
    /// PDF loading or serialization error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Operation parameters were rejected before any work started.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The encryption bridge (or another remote service) failed.
    #[error("external service error: {0}")]
    Bridge(#[from] BridgeError),

    /// The operation structurally succeeded but produced nothing usable.
    #[error("operation produced an empty result: {0}")]
    EmptyResult(String),

    /// Some items of a batch failed while others succeeded.
    #[error("{failed} of {total} items failed")]
    PartialBatchFailure {
        /// Number of failed items.
        failed: usize,
        /// Number of items in the batch.
        total: usize,
        /// One message per failed item, prefixed with its position.
        errors: Vec<String>,
    },

    /// A newer operation superseded this one.
    #[error("operation was superseded by a newer request")]
    Cancelled,

    /// Image decode or encode error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to reading and writing PDF bytes.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The supplied password does not open the document.
    #[error("incorrect password")]
    IncorrectPassword,

    /// The document is encrypted and no password was supplied.
    #[error("document is password protected")]
    PasswordRequired,

    /// Structural parse failure not attributable to a password.
    #[error("document is corrupt: {0}")]
    Corrupt(String),

    /// The in-memory model could not be written back to bytes.
    #[error("failed to serialize PDF: {0}")]
    Serialize(String),

    /// The object graph is missing a required entry.
    #[error("malformed document structure: {0}")]
    Structure(String),
}

/// Errors raised while validating operation parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A page index is outside `[0, page_count)`.
    #[error("page index {index} is out of range (document has {page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    /// A rotation that is not one of 0, 90, 180 or 270.
    #[error("invalid rotation {0}; expected 0, 90, 180 or 270")]
    InvalidRotation(i64),

    /// No input files or no ranges were supplied.
    #[error("no input supplied: {0}")]
    EmptyInput(String),

    /// The operation expects a different number of input files.
    #[error("{operation} expects {expected} input file(s), got {actual}")]
    InputCount {
        operation: &'static str,
        expected: &'static str,
        actual: usize,
    },

    /// A reorder list that is not a permutation of the remaining pages.
    #[error("invalid page order: {0}")]
    InvalidOrder(String),

    /// Every page would be removed.
    #[error("operation would remove every page")]
    NoPagesRemaining,

    /// A page range could not be parsed or is reversed.
    #[error("invalid page range: {0}")]
    InvalidRange(String),

    /// Opacity outside 0.0 to 1.0.
    #[error("opacity {0} is outside 0.0..=1.0")]
    InvalidOpacity(f32),

    /// Stamp or page-number parameters are unusable.
    #[error("invalid stamp: {0}")]
    InvalidStamp(String),

    /// A password is required by the operation but was empty.
    #[error("a non-empty password is required")]
    MissingPassword,

    /// The request does not match the operation it was dispatched to.
    #[error("request parameters do not belong to the {0} operation")]
    UnsupportedOperation(&'static str),
}

/// Errors reported by the out-of-process encryption bridge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The request never completed within the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Connection-level failure.
    #[error("could not reach service: {0}")]
    Unreachable(String),

    /// The service rejected the request (4xx).
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The service failed while processing (5xx).
    #[error("service failed ({status}): {message}")]
    Failed { status: u16, message: String },

    /// The service answered 2xx but the body is not a PDF.
    #[error("service returned an invalid document: {0}")]
    InvalidResponse(String),
}

impl BridgeError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_) | BridgeError::Unreachable(_) | BridgeError::Failed { .. }
        )
    }
}

/// Coarse error category shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    IncorrectPassword,
    PasswordRequired,
    CorruptDocument,
    PartialBatchFailure,
    EmptyResult,
    ExternalService,
    Cancelled,
    Internal,
}

impl FolioError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FolioError::Validation(_) => ErrorKind::Validation,
            FolioError::Pdf(PdfError::IncorrectPassword) => ErrorKind::IncorrectPassword,
            FolioError::Pdf(PdfError::PasswordRequired) => ErrorKind::PasswordRequired,
            FolioError::Pdf(PdfError::Corrupt(_) | PdfError::Structure(_)) => {
                ErrorKind::CorruptDocument
            }
            FolioError::Pdf(PdfError::Serialize(_)) => ErrorKind::Internal,
            FolioError::Bridge(_) => ErrorKind::ExternalService,
            FolioError::EmptyResult(_) => ErrorKind::EmptyResult,
            FolioError::PartialBatchFailure { .. } => ErrorKind::PartialBatchFailure,
            FolioError::Cancelled => ErrorKind::Cancelled,
            FolioError::Image(_) | FolioError::Io(_) | FolioError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FolioError::Bridge(e) if e.is_retryable())
    }

    /// Message suitable for an end user. Internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => self.to_string(),
            ErrorKind::IncorrectPassword => "The password is incorrect. Please try again.".to_string(),
            ErrorKind::PasswordRequired => {
                "This document is password protected. Enter its password to continue.".to_string()
            }
            ErrorKind::CorruptDocument => {
                "The file could not be read. It may be damaged or not a PDF.".to_string()
            }
            ErrorKind::PartialBatchFailure => format!("Some files could not be processed: {self}."),
            ErrorKind::EmptyResult => {
                "The operation did not produce any pages. Check the selected files.".to_string()
            }
            ErrorKind::ExternalService => {
                "The processing service is unavailable. Check your connection and try again."
                    .to_string()
            }
            ErrorKind::Cancelled => "The operation was replaced by a newer one.".to_string(),
            ErrorKind::Internal => "Something went wrong while processing the file.".to_string(),
        }
    }
}

/// Result type for the folio library.
pub type Result<T> = std::result::Result<T, FolioError>;
