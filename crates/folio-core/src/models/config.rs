//! Configuration structures for the processing pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FolioError, Result};

/// Main configuration for folio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Image recompression settings.
    pub compression: CompressionConfig,

    /// Batch orchestration settings.
    pub batch: BatchConfig,

    /// Serialization settings.
    pub output: OutputConfig,

    /// Encryption bridge endpoint settings.
    pub bridge: BridgeConfig,
}

/// Encode quality per compression level, each in (0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Quality for the "low" level.
    pub low_quality: f32,

    /// Quality for the "recommended" level.
    pub recommended_quality: f32,

    /// Quality for the "extreme" level.
    pub extreme_quality: f32,

    /// Also re-encode uncompressed and Flate-encoded 8-bit images as JPEG.
    pub recompress_raw_images: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            low_quality: 0.75,
            recommended_quality: 0.50,
            extreme_quality: 0.25,
            recompress_raw_images: true,
        }
    }
}

/// Batch orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of files loaded per batch during multi-file operations.
    pub load_batch_size: usize,

    /// Number of files processed per batch by the CLI batch commands.
    pub file_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            load_batch_size: 8,
            file_batch_size: 4,
        }
    }
}

/// Serializer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write object streams and a cross-reference stream.
    pub compact: bool,

    /// Value written to `/Producer`; `None` leaves metadata untouched.
    pub producer: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compact: true,
            producer: Some(format!("folio {}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

/// Encryption bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the bridge service.
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Additional attempts after a retryable failure.
    pub retries: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            timeout_secs: 60,
            retries: 1,
        }
    }
}

impl FolioConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| FolioError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| FolioError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let qualities = [
            ("compression.low_quality", self.compression.low_quality),
            ("compression.recommended_quality", self.compression.recommended_quality),
            ("compression.extreme_quality", self.compression.extreme_quality),
        ];
        for (key, value) in qualities {
            if !(value > 0.0 && value <= 1.0) {
                return Err(FolioError::Config(format!("{key} must be in (0, 1], got {value}")));
            }
        }
        if self.batch.load_batch_size == 0 || self.batch.file_batch_size == 0 {
            return Err(FolioError::Config("batch sizes must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FolioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compression.recommended_quality, 0.5);
        assert!(config.output.compact);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FolioConfig =
            serde_json::from_str(r#"{"bridge": {"timeout_secs": 5}}"#).unwrap();
        assert_eq!(config.bridge.timeout_secs, 5);
        assert_eq!(config.bridge.retries, 1);
        assert_eq!(config.batch.load_batch_size, 8);
    }

    #[test]
    fn test_out_of_range_quality_rejected() {
        let mut config = FolioConfig::default();
        config.compression.extreme_quality = 0.0;
        assert!(config.validate().is_err());
    }
}
