//! Conversion between PDFs and other formats.

use lopdf::{Dictionary, Object, Stream, dictionary};
use tracing::debug;

use crate::context::OperationContext;
use crate::error::{FolioError, PdfError, Result};
use crate::models::InputFile;
use crate::pdf::xobject::embed_image;
use crate::pdf::{PdfDocument, tree};

/// One page per image, each page the size of its image at 72 dpi.
///
/// Images that cannot be decoded are skipped with a warning.
pub fn images_to_pdf(ctx: &OperationContext, images: &[InputFile]) -> Result<PdfDocument> {
    let mut document = PdfDocument::new();
    let doc = &mut document.inner;
    let root = tree::pages_root(doc)?;
    let mut pages = Vec::with_capacity(images.len());

    for input in images {
        ctx.checkpoint()?;
        let image = match embed_image(doc, &input.bytes) {
            Ok(image) => image,
            Err(e) => {
                ctx.warn(format!("skipped {}: {}", input.name, e));
                continue;
            }
        };
        let (width, height) = (image.width as i64, image.height as i64);
        let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ\n");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(root),
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => Object::Reference(image.id) },
            },
            "Contents" => Object::Reference(content_id),
        });
        debug!("Added {} as a {}x{} page", input.name, width, height);
        pages.push(page_id);
    }

    if pages.is_empty() {
        return Err(FolioError::EmptyResult("no image could be converted".to_string()));
    }
    tree::append_kids(doc, root, &pages)?;
    Ok(document)
}

/// Plain text of every page.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PdfError::Corrupt(format!("text extraction failed: {e}")))?;
    Ok(text)
}
