//! Concatenate documents.

use tracing::{debug, info};

use super::copy::append_pages;
use crate::context::OperationContext;
use crate::error::{FolioError, Result, ValidationError};
use crate::pdf::PdfDocument;

/// Copy every page of every source, in order, into a new document.
///
/// A source whose pages cannot be copied, including one still encrypted,
/// is skipped with a warning and contributes nothing. Fails with `EmptyResult` when no page was copied.
pub fn merge(ctx: &OperationContext, sources: Vec<PdfDocument>) -> Result<PdfDocument> {
    if sources.is_empty() {
        return Err(ValidationError::EmptyInput("merge needs at least one document".to_string()).into());
    }
    let total = sources.len();
    let mut destination = PdfDocument::new();

    for (position, source) in sources.into_iter().enumerate() {
        ctx.checkpoint()?;
        if source.is_locked() {
            ctx.warn(format!("skipped document {}: it is password protected", position + 1));
            continue;
        }

        match append_pages(&mut destination.inner, &source.inner, &source.page_ids()) {
            Ok(copied) => debug!("Appended {} pages from document {}", copied.len(), position + 1),
            Err(e) => ctx.warn(format!("skipped document {}: {}", position + 1, e)),
        }
    }

    if destination.page_count() == 0 {
        return Err(FolioError::EmptyResult(format!(
            "none of the {total} documents contributed any pages"
        )));
    }
    info!("Merged {} documents into {} pages", total, destination.page_count());
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures;
    use crate::pdf::{LoadOptions, load};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_preserves_order_and_count() {
        let ctx = OperationContext::detached();
        let a = fixtures::sample_document(2);
        let b = fixtures::sample_document(3);
        let expected: Vec<f32> = fixtures::page_widths(&a)
            .into_iter()
            .chain(fixtures::page_widths(&b))
            .collect();

        let merged = merge(&ctx, vec![a, b]).unwrap();
        assert_eq!(merged.page_count(), 5);
        assert_eq!(fixtures::page_widths(&merged), expected);
        assert_eq!(fixtures::page_text(&merged, 2), "Page 1");
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_merge_of_empty_documents_is_empty_result() {
        let ctx = OperationContext::detached();
        let err = merge(&ctx, vec![PdfDocument::new(), PdfDocument::new()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_merge_without_sources_is_invalid() {
        let ctx = OperationContext::detached();
        let err = merge(&ctx, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_locked_source_is_skipped() {
        let ctx = OperationContext::detached();
        let locked = load(
            &fixtures::encrypted_pdf("user-pw", "owner-pw"),
            &LoadOptions::default().allow_locked(true),
        )
        .unwrap();

        let merged = merge(&ctx, vec![fixtures::sample_document(2), locked]).unwrap();
        assert_eq!(merged.page_count(), 2);
        assert_eq!(ctx.warnings(), vec!["skipped document 2: it is password protected"]);
    }

    #[test]
    fn test_only_locked_sources_is_empty_result() {
        let ctx = OperationContext::detached();
        let locked = load(
            &fixtures::encrypted_pdf("user-pw", "owner-pw"),
            &LoadOptions::default().allow_locked(true),
        )
        .unwrap();
        let err = merge(&ctx, vec![locked]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }
}
