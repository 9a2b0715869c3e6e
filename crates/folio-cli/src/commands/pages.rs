//! Page commands - merge, split, organize and rotate.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use folio_core::OperationRequest;
use folio_core::ops::{OrganizePlan, chunks, every_page, parse_page_ranges};

use super::{load_config, page_count, page_list, parent_dir, read_input, run_request, write_outputs};

/// Arguments for the merge command.
#[derive(Args)]
pub struct MergeArgs {
    /// Input PDF files, in merge order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (default: merged.pdf next to the first input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Password for encrypted inputs
    #[arg(short, long)]
    password: Option<String>,
}

/// Arguments for the split command.
#[derive(Args)]
pub struct SplitArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Page ranges, one output each (e.g. "1-3,4,5-")
    #[arg(short, long, conflicts_with = "every")]
    ranges: Option<String>,

    /// Split into chunks of this many pages
    #[arg(short, long)]
    every: Option<usize>,

    /// Output directory (default: next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Password for an encrypted input
    #[arg(short, long)]
    password: Option<String>,
}

/// Arguments for the organize command.
#[derive(Args)]
pub struct OrganizeArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Pages to delete (e.g. "2,4-5")
    #[arg(short, long)]
    delete: Option<String>,

    /// New order of the remaining pages (e.g. "3,1,2")
    #[arg(long)]
    order: Option<String>,

    /// Rotate a page by original number, as PAGE:DEGREES (e.g. "1:90")
    #[arg(long = "rotate", value_parser = parse_page_rotation)]
    rotations: Vec<(usize, i64)>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Password for an encrypted input
    #[arg(short, long)]
    password: Option<String>,
}

/// Arguments for the rotate command.
#[derive(Args)]
pub struct RotateArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Clockwise angle: 0, 90, 180 or 270
    #[arg(short, long, allow_hyphen_values = true)]
    angle: i64,

    /// Pages to rotate (default: all)
    #[arg(long)]
    pages: Option<String>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Password for an encrypted input
    #[arg(short, long)]
    password: Option<String>,
}

pub async fn merge(args: MergeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let inputs = args
        .inputs
        .iter()
        .map(|path| read_input(path, args.password.as_deref()))
        .collect::<anyhow::Result<Vec<_>>>()?;
    info!("Merging {} files", inputs.len());

    let result = run_request(config, inputs, &OperationRequest::Merge).await?;
    write_outputs(&result.outputs, args.output.as_deref(), &parent_dir(&args.inputs[0]))?;
    Ok(())
}

pub async fn split(args: SplitArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let input = read_input(&args.input, args.password.as_deref())?;
    let count = page_count(&input)?;

    let ranges = match (&args.ranges, args.every) {
        (Some(text), _) => parse_page_ranges(text, Some(count))?,
        (None, Some(0)) => anyhow::bail!("--every must be at least 1"),
        (None, Some(size)) => chunks(count, size),
        (None, None) => every_page(count),
    };
    info!("Splitting {} pages into {} parts", count, ranges.len());

    let result = run_request(config, vec![input], &OperationRequest::Split { ranges }).await?;
    let default_dir = parent_dir(&args.input);
    let written = write_outputs(&result.outputs, args.output.as_deref(), &default_dir)?;
    println!("{} Split into {} files", style("✓").green(), written.len());
    Ok(())
}

pub async fn organize(args: OrganizeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let input = read_input(&args.input, args.password.as_deref())?;
    let count = page_count(&input)?;

    let mut plan = OrganizePlan::new();
    if let Some(text) = &args.delete {
        plan = plan.with_deletions(page_list(text, count)?);
    }
    if let Some(text) = &args.order {
        let deleted: BTreeSet<_> = plan.delete.iter().collect();
        let remaining = count.saturating_sub(deleted.len());
        plan = plan.with_order(page_list(text, remaining)?);
    }
    for &(page, degrees) in &args.rotations {
        plan = plan.with_rotation(page - 1, degrees);
    }

    let result = run_request(config, vec![input], &OperationRequest::Organize(plan)).await?;
    write_outputs(&result.outputs, args.output.as_deref(), &parent_dir(&args.input))?;
    Ok(())
}

pub async fn rotate(args: RotateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let input = read_input(&args.input, args.password.as_deref())?;
    let pages = match &args.pages {
        Some(text) => Some(page_list(text, page_count(&input)?)?),
        None => None,
    };

    let request = OperationRequest::Rotate {
        angle: args.angle,
        pages,
    };
    let result = run_request(config, vec![input], &request).await?;
    write_outputs(&result.outputs, args.output.as_deref(), &parent_dir(&args.input))?;
    Ok(())
}

/// Parse `PAGE:DEGREES` with a 1-based page number.
fn parse_page_rotation(text: &str) -> Result<(usize, i64), String> {
    let (page, degrees) = text
        .split_once(':')
        .ok_or_else(|| format!("expected PAGE:DEGREES, got '{text}'"))?;
    let page: usize = page
        .trim()
        .parse()
        .map_err(|_| format!("'{page}' is not a page number"))?;
    if page == 0 {
        return Err("page numbers start at 1".to_string());
    }
    let degrees: i64 = degrees
        .trim()
        .parse()
        .map_err(|_| format!("'{degrees}' is not an angle"))?;
    Ok((page, degrees))
}
