//! Operation requests and results exchanged with callers.

use serde::{Deserialize, Serialize};

use crate::compress::CompressionLevel;
use crate::error::ValidationError;
use crate::ops::{OrganizePlan, PageNumberSpec, PageRange, StampSpec, normalize_rotation};

/// The operations the pipeline can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Merge,
    Split,
    Organize,
    Rotate,
    Watermark,
    PageNumbers,
    Compress,
}

impl OperationKind {
    /// Short lowercase name, used in output file names and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Merge => "merge",
            OperationKind::Split => "split",
            OperationKind::Organize => "organize",
            OperationKind::Rotate => "rotate",
            OperationKind::Watermark => "watermark",
            OperationKind::PageNumbers => "page_numbers",
            OperationKind::Compress => "compress",
        }
    }

    /// Check the number of input files this operation accepts.
    pub fn check_input_count(self, actual: usize) -> Result<(), ValidationError> {
        match self {
            OperationKind::Merge if actual == 0 => {
                Err(ValidationError::EmptyInput("merge needs at least one file".to_string()))
            }
            OperationKind::Merge => Ok(()),
            _ if actual == 1 => Ok(()),
            other => Err(ValidationError::InputCount {
                operation: other.as_str(),
                expected: "exactly 1",
                actual,
            }),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parameterized operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationRequest {
    /// Concatenate every input in order.
    Merge,

    /// One output per range.
    Split { ranges: Vec<PageRange> },

    /// Delete, reorder and rotate pages of one document.
    Organize(OrganizePlan),

    /// Rotate the listed pages (or every page) by a multiple of 90 degrees.
    Rotate {
        angle: i64,
        #[serde(default)]
        pages: Option<Vec<usize>>,
    },

    /// Overlay a text or image stamp.
    Watermark(StampSpec),

    /// Draw a page number on each page.
    PageNumbers(PageNumberSpec),

    /// Re-encode raster images at the level's quality.
    Compress { level: CompressionLevel },
}

impl OperationRequest {
    /// The kind of this request.
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Merge => OperationKind::Merge,
            OperationRequest::Split { .. } => OperationKind::Split,
            OperationRequest::Organize(_) => OperationKind::Organize,
            OperationRequest::Rotate { .. } => OperationKind::Rotate,
            OperationRequest::Watermark(_) => OperationKind::Watermark,
            OperationRequest::PageNumbers(_) => OperationKind::PageNumbers,
            OperationRequest::Compress { .. } => OperationKind::Compress,
        }
    }

    /// Validate the parameters that do not depend on the loaded document.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            OperationRequest::Split { ranges } if ranges.is_empty() => {
                Err(ValidationError::EmptyInput("split needs at least one range".to_string()))
            }
            OperationRequest::Rotate { angle, .. } => normalize_rotation(*angle).map(|_| ()),
            OperationRequest::Organize(plan) => plan.validate_rotations(),
            OperationRequest::Watermark(spec) => spec.validate(),
            OperationRequest::PageNumbers(spec) => spec.validate(),
            _ => Ok(()),
        }
    }
}

/// A named input document.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Display name, usually the file name.
    pub name: String,
    /// Raw PDF bytes.
    pub bytes: Vec<u8>,
    /// Password for encrypted documents.
    pub password: Option<String>,
}

impl InputFile {
    /// Create an input without a password.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            password: None,
        }
    }

    /// Attach a password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Name without a trailing `.pdf` extension.
    pub fn stem(&self) -> &str {
        let lower = self.name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            &self.name[..self.name.len() - 4]
        } else {
            &self.name
        }
    }
}

/// One produced document.
#[derive(Debug, Clone)]
pub struct OutputFile {
    /// Suggested file name.
    pub name: String,
    /// Serialized PDF bytes.
    pub bytes: Vec<u8>,
    /// Number of pages in the output.
    pub page_count: usize,
}

/// Image statistics from a compression run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Image XObjects reachable from the page tree.
    pub images_found: usize,
    /// Images replaced by a smaller re-encoding.
    pub images_processed: usize,
    /// Images left untouched (unsupported, failed, or not smaller).
    pub images_skipped: usize,
    /// The original bytes were returned unchanged.
    pub used_original: bool,
}

/// Everything a completed operation produced.
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// Operation that ran.
    pub kind: OperationKind,
    /// Output documents, in order.
    pub outputs: Vec<OutputFile>,
    /// Total size of the inputs in bytes.
    pub original_size: usize,
    /// Total size of the outputs in bytes.
    pub result_size: usize,
    /// Non-fatal problems (skipped files, images, locked sources).
    pub warnings: Vec<String>,
    /// Present for compression runs.
    pub compression: Option<CompressionStats>,
}

impl OperationResult {
    /// Serializable summary without the document bytes.
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            kind: self.kind,
            outputs: self
                .outputs
                .iter()
                .map(|o| OutputSummary {
                    name: o.name.clone(),
                    size: o.bytes.len(),
                    page_count: o.page_count,
                })
                .collect(),
            original_size: self.original_size,
            result_size: self.result_size,
            saved_percent: saved_percent(self.original_size, self.result_size),
            warnings: self.warnings.clone(),
            compression: self.compression.clone(),
        }
    }
}

/// Percentage of bytes saved, zero when the result grew.
pub fn saved_percent(original: usize, result: usize) -> f64 {
    if original == 0 || result >= original {
        return 0.0;
    }
    (original - result) as f64 * 100.0 / original as f64
}

/// Serializable view of [`OperationResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub kind: OperationKind,
    pub outputs: Vec<OutputSummary>,
    pub original_size: usize,
    pub result_size: usize,
    pub saved_percent: f64,
    pub warnings: Vec<String>,
    pub compression: Option<CompressionStats>,
}

/// Serializable view of [`OutputFile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSummary {
    pub name: String,
    pub size: usize,
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let request: OperationRequest =
            serde_json::from_str(r#"{"kind": "rotate", "angle": 90}"#).unwrap();
        assert_eq!(
            request,
            OperationRequest::Rotate {
                angle: 90,
                pages: None
            }
        );

        let request: OperationRequest =
            serde_json::from_str(r#"{"kind": "compress", "level": "extreme"}"#).unwrap();
        assert_eq!(request.kind(), OperationKind::Compress);
    }

    #[test]
    fn test_input_count() {
        assert!(OperationKind::Merge.check_input_count(0).is_err());
        assert!(OperationKind::Merge.check_input_count(3).is_ok());
        assert!(OperationKind::Split.check_input_count(1).is_ok());
        assert_eq!(
            OperationKind::Split.check_input_count(2),
            Err(ValidationError::InputCount {
                operation: "split",
                expected: "exactly 1",
                actual: 2
            })
        );
    }

    #[test]
    fn test_invalid_rotation_rejected_before_loading() {
        let request = OperationRequest::Rotate {
            angle: 45,
            pages: None,
        };
        assert_eq!(request.validate(), Err(ValidationError::InvalidRotation(45)));
    }

    #[test]
    fn test_input_stem() {
        assert_eq!(InputFile::new("report.PDF", vec![]).stem(), "report");
        assert_eq!(InputFile::new("notes", vec![]).stem(), "notes");
    }

    #[test]
    fn test_saved_percent() {
        assert_eq!(saved_percent(200, 50), 75.0);
        assert_eq!(saved_percent(100, 120), 0.0);
        assert_eq!(saved_percent(0, 0), 0.0);
    }
}
