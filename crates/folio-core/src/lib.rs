//! Core library for Folio, an in-memory PDF page workbench.
//!
//! This crate provides:
//! - PDF loading with password handling, and compact serialization
//! - Page operations (merge, split, organize, rotate, watermark, page numbers)
//! - Image recompression
//! - Batched execution with progress and operation tokens
//! - The contract for the external encryption service
//! - Image to PDF and PDF to text conversion

pub mod batch;
pub mod bridge;
pub mod compress;
pub mod context;
pub mod convert;
pub mod error;
pub mod models;
pub mod ops;
pub mod pdf;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod fixtures;

pub use batch::{BatchReport, BatchRunner, OperationToken, OperationTracker};
pub use bridge::{BridgeAction, BridgeResponse, EncryptionBridge, lock_document, unlock_document};
pub use compress::{CompressionLevel, CompressionOutcome, compress};
pub use context::OperationContext;
pub use convert::{images_to_pdf, pdf_to_text};
pub use error::{ErrorKind, FolioError, Result};
pub use models::{FolioConfig, InputFile, OperationKind, OperationRequest, OperationResult, OutputFile};
pub use pdf::{DocumentInfo, EncryptionStatus, LoadOptions, PageInfo, PdfDocument, SaveOptions, load, save};
pub use pipeline::{execute, inspect};
