//! Compress command - recompress the images of one or more PDFs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use folio_core::compress::CompressionLevel;
use folio_core::models::saved_percent;
use folio_core::{
    BatchRunner, FolioError, InputFile, OperationContext, OperationRequest, OperationResult,
    OperationToken, execute,
};

use super::{format_size, load_config, parent_dir, print_warnings, read_input, user_error};

/// Arguments for the compress command.
#[derive(Args)]
pub struct CompressArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Compression level: low, recommended or extreme
    #[arg(short, long, default_value = "recommended")]
    level: CompressionLevel,

    /// Output directory (default: next to each input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write a CSV report of every file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Files compressed concurrently (default: from config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Password for encrypted inputs
    #[arg(short, long)]
    password: Option<String>,
}

/// Outcome for one input file.
struct FileOutcome {
    path: PathBuf,
    result: Result<OperationResult, FolioError>,
    written: Option<PathBuf>,
}

pub async fn run(args: CompressArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No PDF files found for: {}", args.inputs.join(" "));
    }
    println!("{} Found {} files to compress", style("ℹ").blue(), files.len());

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let inputs = files
        .iter()
        .map(|path| read_input(path, args.password.as_deref()))
        .collect::<anyhow::Result<Vec<InputFile>>>()?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let request = OperationRequest::Compress { level: args.level };
    let runner = BatchRunner::new(args.jobs.unwrap_or(config.batch.file_batch_size));
    let total = files.len() as f64;
    let report = runner
        .run(
            inputs,
            |_, input: InputFile| {
                let ctx = OperationContext::new(config.clone(), OperationToken::detached());
                let request = request.clone();
                async move { execute(&ctx, vec![input], &request).await }
            },
            |fraction| pb.set_position((fraction * total).round() as u64),
        )
        .await
        .map_err(user_error)?;
    pb.finish_and_clear();

    let mut outcomes = Vec::with_capacity(files.len());
    for (path, result) in files.into_iter().zip(report.into_results()) {
        let written = match &result {
            Ok(result) => Some(write_compressed(&path, result, args.output_dir.as_deref())?),
            Err(e) => {
                warn!("Failed to compress {}: {}", path.display(), e);
                None
            }
        };
        outcomes.push(FileOutcome { path, result, written });
    }

    if let Some(report_path) = &args.report {
        write_report(report_path, &outcomes)?;
        println!("{} Report written to {}", style("✓").green(), report_path.display());
    }

    print_summary(&outcomes, start);
    if outcomes.iter().all(|o| o.result.is_err()) {
        anyhow::bail!("No file could be compressed");
    }
    Ok(())
}

/// Expand glob patterns, keeping PDF files in pattern order.
fn expand_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let before = files.len();
        for path in glob(pattern)?.filter_map(|r| r.ok()) {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext.eq_ignore_ascii_case("pdf") && !files.contains(&path) {
                files.push(path);
            }
        }
        if files.len() == before {
            debug!("Pattern {} matched no PDF files", pattern);
        }
    }
    Ok(files)
}

fn write_compressed(
    path: &Path,
    result: &OperationResult,
    output_dir: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    let dir = output_dir.map(Path::to_path_buf).unwrap_or_else(|| parent_dir(path));
    let output = result
        .outputs
        .first()
        .ok_or_else(|| anyhow::anyhow!("Compression of {} produced no output", path.display()))?;

    let output_path = dir.join(&output.name);
    fs::write(&output_path, &output.bytes)?;
    debug!("Wrote {}", output_path.display());

    print_warnings(&result.warnings);
    Ok(output_path)
}

fn write_report(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "output",
        "original_size",
        "compressed_size",
        "saved_percent",
        "images_found",
        "images_processed",
        "images_skipped",
        "used_original",
        "error",
    ])?;

    for outcome in outcomes {
        let filename = outcome.path.display().to_string();
        let output = outcome
            .written
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match &outcome.result {
            Ok(result) => {
                let stats = result.compression.clone().unwrap_or_default();
                wtr.write_record([
                    filename.as_str(),
                    "success",
                    output.as_str(),
                    &result.original_size.to_string(),
                    &result.result_size.to_string(),
                    &format!("{:.1}", saved_percent(result.original_size, result.result_size)),
                    &stats.images_found.to_string(),
                    &stats.images_processed.to_string(),
                    &stats.images_skipped.to_string(),
                    &stats.used_original.to_string(),
                    "",
                ])?;
            }
            Err(e) => {
                wtr.write_record([
                    filename.as_str(),
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    e.user_message().as_str(),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

fn print_summary(outcomes: &[FileOutcome], start: Instant) {
    let successful: Vec<_> = outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
    let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    let original: usize = successful.iter().map(|r| r.original_size).sum();
    let compressed: usize = successful.iter().map(|r| r.result_size).sum();

    println!();
    println!(
        "{} Compressed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} -> {} ({:.1}% saved)",
        format_size(original),
        format_size(compressed),
        saved_percent(original, compressed)
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            if let Err(e) = &outcome.result {
                println!("  - {}: {}", outcome.path.display(), e.user_message());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_inputs_filters_and_dedupes() {
        let dir = tempdir().unwrap();
        for name in ["a.pdf", "b.PDF", "notes.txt"] {
            fs::write(dir.path().join(name), b"%PDF-1.7").unwrap();
        }
        let all = format!("{}/*", dir.path().display());
        let one = dir.path().join("a.pdf").display().to_string();

        let files = expand_inputs(&[one, all]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
    }
}
