//! Page operations.
//!
//! Every operation takes ownership of its input documents and returns new
//! ones, so a failed operation never leaves a half-modified document
//! behind. The pipeline dispatches requests through [`handler_for`].

mod copy;
mod merge;
mod organize;
mod ranges;
mod renumber;
mod split;
mod stamp;

pub use merge::merge;
pub use organize::{OrganizePlan, PageRotation, normalize_rotation, organize, rotate};
pub use ranges::{PageRange, chunks, every_page, parse_page_ranges};
pub use renumber::{NumberStyle, PageNumberSpec, format_page_number, renumber, to_roman};
pub use split::{extract_pages, split};
pub use stamp::{Anchor, Placement, StampContent, StampSpec, stamp};

use crate::context::OperationContext;
use crate::error::{Result, ValidationError};
use crate::models::{OperationKind, OperationRequest};
use crate::pdf::PdfDocument;

/// A page operation: input documents plus request in, output documents out.
pub type Handler = fn(&OperationContext, Vec<PdfDocument>, &OperationRequest) -> Result<Vec<PdfDocument>>;

/// Handlers for every operation that works on the page model.
/// Compression is absent: it needs the original bytes and runs in the
/// pipeline directly.
const HANDLERS: [(OperationKind, Handler); 6] = [
    (OperationKind::Merge, run_merge),
    (OperationKind::Split, run_split),
    (OperationKind::Organize, run_organize),
    (OperationKind::Rotate, run_rotate),
    (OperationKind::Watermark, run_watermark),
    (OperationKind::PageNumbers, run_page_numbers),
];

/// Look up the handler for `kind`.
pub fn handler_for(kind: OperationKind) -> Option<Handler> {
    HANDLERS
        .iter()
        .find(|(candidate, _)| *candidate == kind)
        .map(|(_, handler)| *handler)
}

fn single(mut documents: Vec<PdfDocument>, kind: OperationKind) -> Result<PdfDocument> {
    kind.check_input_count(documents.len())?;
    documents
        .pop()
        .ok_or_else(|| ValidationError::EmptyInput(format!("{kind} needs a document")).into())
}

fn mismatch(kind: OperationKind) -> crate::error::FolioError {
    ValidationError::UnsupportedOperation(kind.as_str()).into()
}

fn run_merge(ctx: &OperationContext, documents: Vec<PdfDocument>, _: &OperationRequest) -> Result<Vec<PdfDocument>> {
    Ok(vec![merge(ctx, documents)?])
}

fn run_split(ctx: &OperationContext, documents: Vec<PdfDocument>, request: &OperationRequest) -> Result<Vec<PdfDocument>> {
    let OperationRequest::Split { ranges } = request else {
        return Err(mismatch(OperationKind::Split));
    };
    split(ctx, single(documents, OperationKind::Split)?, ranges)
}

fn run_organize(ctx: &OperationContext, documents: Vec<PdfDocument>, request: &OperationRequest) -> Result<Vec<PdfDocument>> {
    let OperationRequest::Organize(plan) = request else {
        return Err(mismatch(OperationKind::Organize));
    };
    Ok(vec![organize(ctx, single(documents, OperationKind::Organize)?, plan)?])
}

fn run_rotate(ctx: &OperationContext, documents: Vec<PdfDocument>, request: &OperationRequest) -> Result<Vec<PdfDocument>> {
    let OperationRequest::Rotate { angle, pages } = request else {
        return Err(mismatch(OperationKind::Rotate));
    };
    let document = single(documents, OperationKind::Rotate)?;
    Ok(vec![rotate(ctx, document, *angle, pages.as_deref())?])
}

fn run_watermark(ctx: &OperationContext, documents: Vec<PdfDocument>, request: &OperationRequest) -> Result<Vec<PdfDocument>> {
    let OperationRequest::Watermark(spec) = request else {
        return Err(mismatch(OperationKind::Watermark));
    };
    Ok(vec![stamp(ctx, single(documents, OperationKind::Watermark)?, spec)?])
}

fn run_page_numbers(ctx: &OperationContext, documents: Vec<PdfDocument>, request: &OperationRequest) -> Result<Vec<PdfDocument>> {
    let OperationRequest::PageNumbers(spec) = request else {
        return Err(mismatch(OperationKind::PageNumbers));
    };
    Ok(vec![renumber(ctx, single(documents, OperationKind::PageNumbers)?, spec)?])
}
