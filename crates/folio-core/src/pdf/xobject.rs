//! Embed JPEG and PNG images as image XObjects.

use image::{ColorType, DynamicImage, ImageFormat};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::trace;

use crate::error::{PdfError, Result};

/// An image XObject added to a document.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EmbeddedImage {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

impl EmbeddedImage {
    /// Height divided by width.
    pub fn aspect(&self) -> f32 {
        self.height as f32 / self.width.max(1) as f32
    }
}

/// Add `bytes` (JPEG or PNG) to `doc` as an image XObject.
///
/// Baseline gray and RGB JPEGs are embedded unchanged with `DCTDecode`.
/// Everything else is decoded and stored as Flate-compressed samples, with
/// an `/SMask` when the image has an alpha channel.
pub(crate) fn embed_image(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(PdfError::Structure("image has no pixels".to_string()).into());
    }

    let passthrough = match (format, img.color()) {
        (ImageFormat::Jpeg, ColorType::L8) => Some(b"DeviceGray".as_slice()),
        (ImageFormat::Jpeg, ColorType::Rgb8) => Some(b"DeviceRGB".as_slice()),
        _ => None,
    };

    let id = match passthrough {
        Some(color_space) => {
            trace!("Embedding {}x{} JPEG unchanged", width, height);
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => Object::Name(color_space.to_vec()),
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            };
            doc.add_object(Stream::new(dict, bytes.to_vec()).with_compression(false))
        }
        None => embed_samples(doc, &img)?,
    };

    Ok(EmbeddedImage { id, width, height })
}

fn embed_samples(doc: &mut Document, img: &DynamicImage) -> Result<ObjectId> {
    let (width, height) = (img.width(), img.height());
    let gray = matches!(
        img.color(),
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
    );
    let (color_space, samples) = if gray {
        ("DeviceGray", img.to_luma8().into_raw())
    } else {
        ("DeviceRGB", img.to_rgb8().into_raw())
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    };

    if img.color().has_alpha() {
        let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let smask = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        };
        let smask_id = doc.add_object(flate_stream(smask, alpha)?);
        dict.set("SMask", Object::Reference(smask_id));
    }

    trace!("Embedding {}x{} image as {} samples", width, height, color_space);
    Ok(doc.add_object(flate_stream(dict, samples)?))
}

fn flate_stream(dict: lopdf::Dictionary, samples: Vec<u8>) -> Result<Stream> {
    let mut stream = Stream::new(dict, samples);
    stream
        .compress()
        .map_err(|e| PdfError::Serialize(format!("failed to compress image: {e}")))?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_jpeg_is_embedded_unchanged() {
        let jpeg = fixtures::noisy_jpeg(40, 20, 90);
        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &jpeg).unwrap();
        assert_eq!((embedded.width, embedded.height), (40, 20));
        assert_eq!(embedded.aspect(), 0.5);

        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, jpeg);
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
    }

    #[test]
    fn test_png_with_alpha_gets_soft_mask() {
        let png = fixtures::transparent_png(8, 8);
        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &png).unwrap();

        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert!(stream.dict.has(b"SMask"));
        assert_eq!(stream.decompressed_content().unwrap().len(), 8 * 8 * 3);
    }

    #[test]
    fn test_unknown_bytes_are_rejected() {
        let mut doc = Document::with_version("1.7");
        assert!(embed_image(&mut doc, b"not an image").is_err());
    }
}
