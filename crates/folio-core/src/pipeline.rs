//! Request execution: load, validate, transform, serialize.

use tracing::{Instrument, debug, info};

use crate::batch::BatchRunner;
use crate::compress::compress;
use crate::context::OperationContext;
use crate::error::{FolioError, Result, ValidationError};
use crate::models::{InputFile, OperationKind, OperationRequest, OperationResult, OutputFile};
use crate::ops::handler_for;
use crate::pdf::{DocumentInfo, LoadOptions, PdfDocument, SaveOptions, load, save};

/// Run `request` over `inputs`.
///
/// Parameters are validated before any document is loaded. The operation
/// token is checked between every step, and a result computed for a
/// superseded token is discarded with `Cancelled`.
pub async fn execute(
    ctx: &OperationContext,
    inputs: Vec<InputFile>,
    request: &OperationRequest,
) -> Result<OperationResult> {
    run(ctx, inputs, request).instrument(ctx.span().clone()).await
}

async fn run(
    ctx: &OperationContext,
    inputs: Vec<InputFile>,
    request: &OperationRequest,
) -> Result<OperationResult> {
    let kind = request.kind();
    kind.check_input_count(inputs.len())?;
    request.validate()?;
    ctx.checkpoint()?;

    let original_size = inputs.iter().map(|i| i.bytes.len()).sum();
    info!("Running {} on {} file(s)", kind, inputs.len());

    if let OperationRequest::Compress { level } = request {
        let input = &inputs[0];
        let document = load_input(input, false)?;
        ctx.checkpoint()?;
        let outcome = compress(ctx, &input.bytes, document, *level)?;
        ctx.report_progress(1.0);
        ctx.checkpoint()?;
        return Ok(OperationResult {
            kind,
            outputs: vec![OutputFile {
                name: format!("{}_compressed.pdf", input.stem()),
                bytes: outcome.bytes,
                page_count: outcome.page_count,
            }],
            original_size,
            result_size: outcome.compressed_size,
            warnings: ctx.take_warnings(),
            compression: Some(outcome.stats),
        });
    }

    let documents = load_all(ctx, &inputs, kind).await?;
    ctx.checkpoint()?;

    let handler = handler_for(kind).ok_or(ValidationError::UnsupportedOperation(kind.as_str()))?;
    let mut results = handler(ctx, documents, request)?;
    ctx.checkpoint()?;

    let options = SaveOptions::from(&ctx.config().output);
    let stem = inputs.first().map(InputFile::stem).unwrap_or("document");
    let count = results.len();
    let mut outputs = Vec::with_capacity(count);
    for (index, document) in results.iter_mut().enumerate() {
        ctx.checkpoint()?;
        let bytes = save(document, &options)?;
        outputs.push(OutputFile {
            name: output_name(request, stem, index),
            bytes,
            page_count: document.page_count(),
        });
        ctx.report_progress(0.5 + 0.5 * (index + 1) as f64 / count as f64);
    }
    ctx.checkpoint()?;

    let result_size = outputs.iter().map(|o| o.bytes.len()).sum();
    debug!("{} produced {} output(s), {} bytes", kind, outputs.len(), result_size);
    Ok(OperationResult {
        kind,
        outputs,
        original_size,
        result_size,
        warnings: ctx.take_warnings(),
        compression: None,
    })
}

/// Load and describe one document without changing it.
pub fn inspect(input: &InputFile) -> Result<DocumentInfo> {
    Ok(load_input(input, true)?.info())
}

fn load_input(input: &InputFile, allow_locked: bool) -> Result<PdfDocument> {
    let options = LoadOptions {
        password: input.password.clone(),
        allow_locked,
    };
    load(&input.bytes, &options)
}

/// Load every input. Merge inputs go through the batch runner whatever
/// their count, so an input that cannot be loaded becomes a warning and a
/// merge left with nothing fails with `EmptyResult`.
async fn load_all(ctx: &OperationContext, inputs: &[InputFile], kind: OperationKind) -> Result<Vec<PdfDocument>> {
    if kind != OperationKind::Merge {
        let documents = inputs
            .iter()
            .map(|input| load_input(input, false))
            .collect::<Result<Vec<_>>>()?;
        ctx.report_progress(0.5);
        return Ok(documents);
    }

    let runner = BatchRunner::new(ctx.config().batch.load_batch_size).with_token(ctx.token().clone());
    let report = runner
        .run(
            inputs.iter().collect(),
            |_, input: &InputFile| {
                let loaded = load_input(input, false);
                async move { loaded }
            },
            |fraction| ctx.report_progress(fraction * 0.5),
        )
        .await?
        .ensure_any_success()?;

    let mut documents = Vec::with_capacity(report.len());
    for (input, loaded) in inputs.iter().zip(report.into_results()) {
        match loaded {
            Ok(document) => documents.push(document),
            Err(FolioError::Cancelled) => return Err(FolioError::Cancelled),
            Err(e) => ctx.warn(format!("skipped {}: {}", input.name, e.user_message())),
        }
    }
    Ok(documents)
}

fn output_name(request: &OperationRequest, stem: &str, index: usize) -> String {
    match request {
        OperationRequest::Merge => "merged.pdf".to_string(),
        OperationRequest::Split { ranges } => match ranges.get(index) {
            Some(range) => format!("{stem}_pages_{range}.pdf"),
            None => format!("{stem}_part_{}.pdf", index + 1),
        },
        OperationRequest::Organize(_) => format!("{stem}_organized.pdf"),
        OperationRequest::Rotate { .. } => format!("{stem}_rotated.pdf"),
        OperationRequest::Watermark(_) => format!("{stem}_watermarked.pdf"),
        OperationRequest::PageNumbers(_) => format!("{stem}_numbered.pdf"),
        OperationRequest::Compress { .. } => format!("{stem}_compressed.pdf"),
    }
}
