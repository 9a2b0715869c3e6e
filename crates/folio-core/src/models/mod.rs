//! Data models for folio.

pub mod config;
pub mod operation;

pub use config::{BatchConfig, BridgeConfig, CompressionConfig, FolioConfig, OutputConfig};
pub use operation::{
    CompressionStats, InputFile, OperationKind, OperationRequest, OperationResult, OutputFile,
    ResultSummary, saved_percent,
};
