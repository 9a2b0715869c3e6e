//! Extract page ranges into new documents.

use tracing::debug;

use super::copy::append_pages;
use super::ranges::PageRange;
use crate::context::OperationContext;
use crate::error::{PdfError, Result, ValidationError};
use crate::pdf::PdfDocument;

/// One new document per range, pages in range order.
///
/// Every range is validated before anything is copied.
pub fn split(
    ctx: &OperationContext,
    source: PdfDocument,
    ranges: &[PageRange],
) -> Result<Vec<PdfDocument>> {
    if ranges.is_empty() {
        return Err(ValidationError::EmptyInput("split needs at least one range".to_string()).into());
    }
    let page_count = source.page_count();
    for range in ranges {
        range.validate(page_count)?;
    }
    if source.is_locked() {
        return Err(PdfError::PasswordRequired.into());
    }

    let mut outputs = Vec::with_capacity(ranges.len());
    for range in ranges {
        ctx.checkpoint()?;
        let indices: Vec<usize> = range.indices().collect();
        outputs.push(extract_pages(&source, &indices)?);
        debug!("Extracted pages {} into a new document", range);
    }
    Ok(outputs)
}

/// Copy the pages at `indices`, in that order, into a new document.
pub fn extract_pages(source: &PdfDocument, indices: &[usize]) -> Result<PdfDocument> {
    let page_ids = source.page_ids_at(indices)?;
    let mut destination = PdfDocument::new();
    append_pages(&mut destination.inner, &source.inner, &page_ids)?;
    Ok(destination)
}
