//! Decode and re-encode image XObjects.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, ImageFormat, RgbImage};
use lopdf::{Document, Object, Stream};
use tracing::trace;

/// Why an image was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SkipReason {
    /// JPX, CCITT, JBIG2 and the like.
    UnsupportedFilter(String),
    /// Indexed, CMYK, Lab, separations.
    UnsupportedColorSpace(String),
    UnsupportedDepth(i64),
    /// Stencil masks and images with a `/Decode` remap.
    Mask,
    /// Raw samples while raw recompression is disabled.
    RawDisabled,
    Corrupt(String),
    NotSmaller { original: usize, encoded: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnsupportedFilter(name) => write!(f, "unsupported filter {name}"),
            SkipReason::UnsupportedColorSpace(name) => write!(f, "unsupported color space {name}"),
            SkipReason::UnsupportedDepth(bits) => write!(f, "{bits} bits per component"),
            SkipReason::Mask => f.write_str("image mask or decode array"),
            SkipReason::RawDisabled => f.write_str("raw image recompression is disabled"),
            SkipReason::Corrupt(detail) => write!(f, "could not decode: {detail}"),
            SkipReason::NotSmaller { original, encoded } => {
                write!(f, "re-encoded size {encoded} is not below {original}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channels {
    Gray,
    Rgb,
}

impl Channels {
    fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb => 3,
        }
    }

    fn device_name(self) -> &'static str {
        match self {
            Channels::Gray => "DeviceGray",
            Channels::Rgb => "DeviceRGB",
        }
    }
}

/// Whether a stream is an image XObject.
pub(crate) fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image"))
}

/// Re-encode an image XObject as a JPEG at `quality` (1..=100).
///
/// Returns the replacement stream only when it is strictly smaller than
/// the stored one.
pub(crate) fn recompress(
    doc: &Document,
    stream: &Stream,
    quality: u8,
    allow_raw: bool,
) -> Result<Stream, SkipReason> {
    let dict = &stream.dict;
    let is_mask = dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false);
    if is_mask || dict.has(b"Decode") {
        return Err(SkipReason::Mask);
    }
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    if bits != 8 {
        return Err(SkipReason::UnsupportedDepth(bits));
    }

    let width = dimension(dict.get(b"Width").ok())?;
    let height = dimension(dict.get(b"Height").ok())?;
    let (channels, keep_color_space) = color_space(doc, dict.get(b"ColorSpace").ok())?;

    let img = match filter_name(dict)?.as_deref() {
        Some("DCTDecode") => {
            image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| SkipReason::Corrupt(e.to_string()))?
        }
        None | Some("FlateDecode") | Some("LZWDecode") | Some("RunLengthDecode") => {
            if !allow_raw {
                return Err(SkipReason::RawDisabled);
            }
            let samples = if dict.has(b"Filter") {
                stream
                    .decompressed_content()
                    .map_err(|e| SkipReason::Corrupt(e.to_string()))?
            } else {
                stream.content.clone()
            };
            from_samples(samples, width, height, channels)?
        }
        Some(other) => return Err(SkipReason::UnsupportedFilter(other.to_string())),
    };

    if (img.width(), img.height()) != (width, height) {
        return Err(SkipReason::Corrupt(format!(
            "decoded {}x{}, dictionary says {}x{}",
            img.width(),
            img.height(),
            width,
            height
        )));
    }

    let encoded = encode_jpeg(&img, channels, quality)?;
    if encoded.len() >= stream.content.len() {
        return Err(SkipReason::NotSmaller {
            original: stream.content.len(),
            encoded: encoded.len(),
        });
    }
    trace!(
        "Re-encoded {}x{} image: {} -> {} bytes",
        width,
        height,
        stream.content.len(),
        encoded.len()
    );

    let mut replacement = dict.clone();
    replacement.remove(b"DecodeParms");
    replacement.remove(b"Length");
    replacement.set("Filter", "DCTDecode");
    replacement.set("BitsPerComponent", 8);
    if !keep_color_space {
        replacement.set("ColorSpace", channels.device_name());
    }
    Ok(Stream::new(replacement, encoded).with_compression(false))
}

fn dimension(obj: Option<&Object>) -> Result<u32, SkipReason> {
    match obj.and_then(|o| o.as_i64().ok()) {
        Some(v) if v > 0 && v <= u32::MAX as i64 => Ok(v as u32),
        _ => Err(SkipReason::Corrupt("missing or invalid dimensions".to_string())),
    }
}

/// First filter name, `None` when unfiltered. Chains of several filters
/// are not handled.
fn filter_name(dict: &lopdf::Dictionary) -> Result<Option<String>, SkipReason> {
    let name = match dict.get(b"Filter") {
        Err(_) => return Ok(None),
        Ok(Object::Name(name)) => name.clone(),
        Ok(Object::Array(items)) if items.is_empty() => return Ok(None),
        Ok(Object::Array(items)) if items.len() == 1 => items[0]
            .as_name()
            .map(<[u8]>::to_vec)
            .map_err(|_| SkipReason::UnsupportedFilter("non-name filter".to_string()))?,
        Ok(_) => return Err(SkipReason::UnsupportedFilter("filter chain".to_string())),
    };
    Ok(Some(String::from_utf8_lossy(&name).into_owned()))
}

/// Channel layout of an image color space, and whether the existing
/// `/ColorSpace` entry can stay (ICC profiles do).
fn color_space(doc: &Document, obj: Option<&Object>) -> Result<(Channels, bool), SkipReason> {
    let Some(obj) = obj else {
        return Err(SkipReason::UnsupportedColorSpace("none".to_string()));
    };
    let resolved = doc.dereference(obj).map(|(_, o)| o).unwrap_or(obj);
    match resolved {
        Object::Name(name) => match name.as_slice() {
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok((Channels::Rgb, false)),
            b"DeviceGray" | b"G" | b"CalGray" => Ok((Channels::Gray, false)),
            other => Err(SkipReason::UnsupportedColorSpace(
                String::from_utf8_lossy(other).into_owned(),
            )),
        },
        Object::Array(items) => {
            let family = items.first().and_then(|o| o.as_name().ok()).unwrap_or_default();
            match family {
                b"ICCBased" => {
                    let components = items
                        .get(1)
                        .and_then(|o| doc.dereference(o).ok())
                        .and_then(|(_, o)| o.as_stream().ok())
                        .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok());
                    match components {
                        Some(1) => Ok((Channels::Gray, true)),
                        Some(3) => Ok((Channels::Rgb, true)),
                        _ => Err(SkipReason::UnsupportedColorSpace("ICCBased".to_string())),
                    }
                }
                b"CalRGB" => Ok((Channels::Rgb, false)),
                b"CalGray" => Ok((Channels::Gray, false)),
                other => Err(SkipReason::UnsupportedColorSpace(
                    String::from_utf8_lossy(other).into_owned(),
                )),
            }
        }
        _ => Err(SkipReason::UnsupportedColorSpace("malformed".to_string())),
    }
}

fn from_samples(
    mut samples: Vec<u8>,
    width: u32,
    height: u32,
    channels: Channels,
) -> Result<DynamicImage, SkipReason> {
    let expected = width as usize * height as usize * channels.count();
    if samples.len() < expected {
        return Err(SkipReason::Corrupt(format!(
            "{} sample bytes, expected {}",
            samples.len(),
            expected
        )));
    }
    samples.truncate(expected);
    let img = match channels {
        Channels::Gray => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        Channels::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
    };
    img.ok_or_else(|| SkipReason::Corrupt("sample buffer does not match dimensions".to_string()))
}

fn encode_jpeg(img: &DynamicImage, channels: Channels, quality: u8) -> Result<Vec<u8>, SkipReason> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    let result = match channels {
        Channels::Gray => {
            let gray = img.to_luma8();
            encoder.write_image(gray.as_raw(), img.width(), img.height(), ExtendedColorType::L8)
        }
        Channels::Rgb => {
            let rgb = img.to_rgb8();
            encoder.write_image(rgb.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        }
    };
    result.map_err(|e| SkipReason::Corrupt(format!("encode failed: {e}")))?;
    Ok(out)
}

/// Map a 0.0..=1.0 quality to the encoder's 1..=100 scale.
pub(crate) fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use lopdf::dictionary;

    fn image_stream(dict: lopdf::Dictionary, content: Vec<u8>) -> Stream {
        Stream::new(dict, content).with_compression(false)
    }

    #[test]
    fn test_jpeg_quality() {
        assert_eq!(jpeg_quality(0.5), 50);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(2.0), 100);
    }

    #[test]
    fn test_large_jpeg_is_reencoded() {
        let doc = Document::with_version("1.7");
        let jpeg = fixtures::noisy_jpeg(64, 64, 100);
        let stream = image_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 64,
                "Height" => 64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.clone(),
        );
        assert!(is_image(&stream));
        let replacement = recompress(&doc, &stream, 25, true).unwrap();
        assert!(replacement.content.len() < jpeg.len());
        assert_eq!(replacement.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
    }

    #[test]
    fn test_raw_samples_are_reencoded() {
        let doc = Document::with_version("1.7");
        let samples = vec![128u8; 32 * 32 * 3];
        let stream = image_stream(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 32,
                "Height" => 32,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            samples.clone(),
        );
        assert!(recompress(&doc, &stream, 50, true).is_ok());
        assert_eq!(recompress(&doc, &stream, 50, false).unwrap_err(), SkipReason::RawDisabled);
    }

    #[test]
    fn test_unsupported_images_are_skipped() {
        let doc = Document::with_version("1.7");
        let base = dictionary! {
            "Subtype" => "Image",
            "Width" => 4,
            "Height" => 4,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };

        let mut jpx = base.clone();
        jpx.set("Filter", "JPXDecode");
        assert!(matches!(
            recompress(&doc, &image_stream(jpx, vec![0; 10]), 50, true),
            Err(SkipReason::UnsupportedFilter(_))
        ));

        let mut mask = base.clone();
        mask.set("ImageMask", true);
        assert_eq!(
            recompress(&doc, &image_stream(mask, vec![0; 48]), 50, true).unwrap_err(),
            SkipReason::Mask
        );

        let mut one_bit = base.clone();
        one_bit.set("BitsPerComponent", 1);
        assert_eq!(
            recompress(&doc, &image_stream(one_bit, vec![0; 8]), 50, true).unwrap_err(),
            SkipReason::UnsupportedDepth(1)
        );

        let mut indexed = base.clone();
        indexed.set(
            "ColorSpace",
            vec!["Indexed".into(), "DeviceRGB".into(), 1.into(), Object::string_literal("abcdef")],
        );
        assert!(matches!(
            recompress(&doc, &image_stream(indexed, vec![0; 16]), 50, true),
            Err(SkipReason::UnsupportedColorSpace(_))
        ));

        let truncated = image_stream(base, vec![0; 5]);
        assert!(matches!(
            recompress(&doc, &truncated, 50, true),
            Err(SkipReason::Corrupt(_))
        ));
    }
}
