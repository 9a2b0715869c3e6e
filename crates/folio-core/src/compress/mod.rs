//! Image recompression.
//!
//! Every image XObject reachable from the page tree is re-encoded as JPEG
//! at the quality of the requested level and replaced in place when that
//! makes it smaller. The original bytes are returned whenever nothing was
//! gained.

mod recode;

use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::context::OperationContext;
use crate::error::Result;
use crate::models::{CompressionConfig, CompressionStats};
use crate::pdf::{PdfDocument, SaveOptions, save, tree};

/// Compression strength.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    Low,
    #[default]
    Recommended,
    Extreme,
}

impl CompressionLevel {
    /// Encode quality in (0, 1] for this level.
    pub fn quality(self, config: &CompressionConfig) -> f32 {
        match self {
            CompressionLevel::Low => config.low_quality,
            CompressionLevel::Recommended => config.recommended_quality,
            CompressionLevel::Extreme => config.extreme_quality,
        }
    }
}

impl std::str::FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "recommended" => Ok(CompressionLevel::Recommended),
            "extreme" => Ok(CompressionLevel::Extreme),
            other => Err(format!("unknown compression level '{other}'")),
        }
    }
}

/// Result of [`compress`].
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    /// The bytes to hand back; the original ones when `stats.used_original`.
    pub bytes: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    pub page_count: usize,
    pub stats: CompressionStats,
}

impl CompressionOutcome {
    fn original(original: &[u8], page_count: usize, mut stats: CompressionStats) -> Self {
        stats.used_original = true;
        Self {
            bytes: original.to_vec(),
            original_size: original.len(),
            compressed_size: original.len(),
            page_count,
            stats,
        }
    }
}

/// Recompress the images of `document`, which was loaded from `original`.
pub fn compress(
    ctx: &OperationContext,
    original: &[u8],
    mut document: PdfDocument,
    level: CompressionLevel,
) -> Result<CompressionOutcome> {
    let page_count = document.page_count();
    if document.is_locked() {
        ctx.warn("document is password protected; returned unchanged");
        return Ok(CompressionOutcome::original(original, page_count, CompressionStats::default()));
    }

    let config = &ctx.config().compression;
    let quality = recode::jpeg_quality(level.quality(config));
    let images = collect_images(&document.inner);
    let mut stats = CompressionStats {
        images_found: images.len(),
        ..CompressionStats::default()
    };

    for id in images {
        ctx.checkpoint()?;
        let Ok(stream) = document.inner.get_object(id).and_then(Object::as_stream) else {
            stats.images_skipped += 1;
            continue;
        };
        match recode::recompress(&document.inner, stream, quality, config.recompress_raw_images) {
            Ok(replacement) => {
                document.inner.objects.insert(id, Object::Stream(replacement));
                stats.images_processed += 1;
            }
            Err(reason) => {
                debug!("Skipping image {:?}: {}", id, reason);
                stats.images_skipped += 1;
            }
        }
    }

    if stats.images_processed == 0 {
        info!("No image could be recompressed; keeping the original");
        return Ok(CompressionOutcome::original(original, page_count, stats));
    }

    let options = SaveOptions {
        compact: true,
        producer: ctx.config().output.producer.clone(),
    };
    let bytes = save(&mut document, &options)?;
    if bytes.len() >= original.len() {
        info!(
            "Recompressed output ({} bytes) is not smaller than the original ({} bytes)",
            bytes.len(),
            original.len()
        );
        return Ok(CompressionOutcome::original(original, page_count, stats));
    }

    info!(
        "Compressed {} -> {} bytes ({} of {} images)",
        original.len(),
        bytes.len(),
        stats.images_processed,
        stats.images_found
    );
    Ok(CompressionOutcome {
        original_size: original.len(),
        compressed_size: bytes.len(),
        bytes,
        page_count,
        stats,
    })
}

/// Ids of every image XObject used by a page, including those nested in
/// form XObjects.
fn collect_images(doc: &Document) -> BTreeSet<ObjectId> {
    let mut images = BTreeSet::new();
    let mut visited = HashSet::new();
    for page_id in doc.get_pages().into_values() {
        if let Some(resources) = tree::inherited_attribute(doc, page_id, b"Resources") {
            walk_resources(doc, &resources, &mut images, &mut visited);
        }
    }
    images
}

fn walk_resources(
    doc: &Document,
    resources: &Object,
    images: &mut BTreeSet<ObjectId>,
    visited: &mut HashSet<ObjectId>,
) {
    let Some(xobjects) = tree::resolve(doc, resources)
        .and_then(|o| o.as_dict().ok())
        .and_then(|d| d.get(b"XObject").ok())
        .and_then(|o| tree::resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
    else {
        return;
    };

    for (_, entry) in xobjects.iter() {
        let Object::Reference(id) = entry else {
            continue;
        };
        if !visited.insert(*id) {
            continue;
        }
        let Ok(stream) = doc.get_object(*id).and_then(Object::as_stream) else {
            continue;
        };
        if recode::is_image(stream) {
            images.insert(*id);
        } else if let Ok(nested) = stream.dict.get(b"Resources") {
            walk_resources(doc, nested, images, visited);
        }
    }
}
