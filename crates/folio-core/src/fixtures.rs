//! Documents and images built in memory for tests.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions, Stream, StringFormat, dictionary};

use crate::pdf::{LoadOptions, PdfDocument, load};

/// MediaBox width of the page at `index`; every page differs so order is
/// observable.
pub fn page_width(index: usize) -> f32 {
    600.0 + index as f32
}

/// Unrotated page widths in order.
pub fn page_widths(doc: &PdfDocument) -> Vec<f32> {
    (0..doc.page_count()).map(|i| doc.page_size(i).unwrap().0).collect()
}

fn build_pages(doc: &mut Document, count: usize) -> ObjectId {
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::with_capacity(count);
    for i in 0..count {
        let content = format!("BT\n/F1 24 Tf\n72 700 Td\n(Page {}) Tj\nET\n", i + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(page_width(i)), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    pages_id
}

fn to_bytes(doc: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// `count` pages reading "Page 1", "Page 2", ..., with resources inherited
/// from the page tree root and the title "Sample".
pub fn sample_pdf(count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    build_pages(&mut doc, count);
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(b"Sample".to_vec(), StringFormat::Literal),
    });
    doc.trailer.set("Info", Object::Reference(info_id));
    to_bytes(&mut doc)
}

/// [`sample_pdf`] loaded.
pub fn sample_document(count: usize) -> PdfDocument {
    load(&sample_pdf(count), &LoadOptions::default()).unwrap()
}

/// A one-page document encrypted with RC4 128.
pub fn encrypted_pdf(user_password: &str, owner_password: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    build_pages(&mut doc, 1);
    doc.trailer.set(
        "ID",
        vec![
            Object::String(b"folio-test-id-01".to_vec(), StringFormat::Literal),
            Object::String(b"folio-test-id-01".to_vec(), StringFormat::Literal),
        ],
    );
    let version = EncryptionVersion::V2 {
        document: &doc,
        owner_password,
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).unwrap();
    doc.encrypt(&state).unwrap();
    to_bytes(&mut doc)
}

/// One page whose only content is a `width` x `height` high-quality JPEG.
pub fn pdf_with_image(width: u32, height: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = build_pages(&mut doc, 1);
    let jpeg = noisy_jpeg(width, height, 100);
    let image_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false),
    );
    doc.get_dictionary_mut(pages_id)
        .unwrap()
        .get_mut(b"Resources")
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("XObject", dictionary! { "Im1" => Object::Reference(image_id) });
    to_bytes(&mut doc)
}

/// Text of the first `Tj` on the page at `index`.
pub fn page_text(doc: &PdfDocument, index: usize) -> String {
    let page_id = doc.page_ids()[index];
    let bytes = doc.inner.get_page_content(page_id).unwrap();
    let content = Content::decode(&bytes).unwrap();
    content
        .operations
        .iter()
        .find(|op| op.operator == "Tj")
        .and_then(|op| op.operands.first())
        .map(|text| String::from_utf8_lossy(text.as_str().unwrap()).into_owned())
        .unwrap_or_default()
}

/// Give page `from` a link annotation pointing at page `to`.
pub fn link_pages(doc: &mut PdfDocument, from: ObjectId, to: ObjectId) {
    let annotation = doc.inner.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
        "Dest" => vec![Object::Reference(to), "Fit".into()],
    });
    doc.inner
        .get_dictionary_mut(from)
        .unwrap()
        .set("Annots", vec![Object::Reference(annotation)]);
}

/// Deterministic noise, which JPEG compresses poorly at high quality.
fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

pub fn noisy_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let pixels = noise((width * height * 3) as usize);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// An RGBA PNG with a horizontal alpha gradient.
pub fn transparent_png(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[200, 30, 30, (x * 255 / width.max(1)) as u8]);
        }
    }
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
        .unwrap();
    out
}
