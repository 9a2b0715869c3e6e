//! Subcommands and the helpers they share.

pub mod compress;
pub mod config;
pub mod convert;
pub mod crypt;
pub mod info;
pub mod pages;
pub mod stamp;

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use folio_core::models::FolioConfig;
use folio_core::ops::parse_page_ranges;
use folio_core::{
    FolioError, InputFile, OperationContext, OperationRequest, OperationResult, OperationToken,
    OutputFile, execute, inspect,
};

/// Config from `--config`, else the user config file when it exists, else
/// defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FolioConfig> {
    let path = match config_path {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = config::default_config_path();
            if !default_path.exists() {
                return Ok(FolioConfig::default());
            }
            default_path
        }
    };
    debug!("Loading configuration from {}", path.display());
    Ok(FolioConfig::from_file(&path)?)
}

/// Read a file from disk as a named input.
pub fn read_input(path: &Path, password: Option<&str>) -> anyhow::Result<InputFile> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf");

    let input = InputFile::new(name, bytes);
    Ok(match password {
        Some(password) => input.with_password(password),
        None => input,
    })
}

/// Directory of `path`, or the working directory for bare file names.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Log the full error and turn it into the short message shown to users.
pub fn user_error(error: FolioError) -> anyhow::Error {
    debug!("{:?}", error);
    anyhow::anyhow!("{}", error.user_message())
}

/// Page count of an input, used to resolve open-ended page ranges.
pub fn page_count(input: &InputFile) -> anyhow::Result<usize> {
    Ok(inspect(input).map_err(user_error)?.page_count)
}

/// Zero-based page indices from 1-based range text such as `"1-3,5"`.
pub fn page_list(text: &str, page_count: usize) -> anyhow::Result<Vec<usize>> {
    let ranges = parse_page_ranges(text, Some(page_count))?;
    Ok(ranges.iter().flat_map(|r| r.indices()).collect())
}

/// A percentage bar for one operation.
pub fn progress_bar(message: impl Into<String>) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")?
            .progress_chars("##-"),
    );
    pb.set_message(message.into());
    Ok(pb)
}

/// Run one request with a progress bar and print its warnings.
pub async fn run_request(
    config: FolioConfig,
    inputs: Vec<InputFile>,
    request: &OperationRequest,
) -> anyhow::Result<OperationResult> {
    let pb = progress_bar(request.kind().as_str())?;
    let progress = pb.clone();
    let ctx = OperationContext::new(config, OperationToken::detached())
        .with_progress(move |fraction| progress.set_position((fraction * 100.0).round() as u64));

    let result = match execute(&ctx, inputs, request).await {
        Ok(result) => {
            pb.finish_and_clear();
            result
        }
        Err(e) => {
            pb.abandon();
            return Err(user_error(e));
        }
    };

    print_warnings(&result.warnings);
    Ok(result)
}

pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }
}

/// Write every output document.
///
/// A single output goes to `output` when given (into it, if it is a
/// directory) and otherwise into `default_dir` under its suggested name.
/// Several outputs always go into a directory: `output` or `default_dir`.
pub fn write_outputs(
    outputs: &[OutputFile],
    output: Option<&Path>,
    default_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let single = outputs.len() == 1;
    let dir = match output {
        Some(path) if !single || path.is_dir() => path.to_path_buf(),
        _ => default_dir.to_path_buf(),
    };
    fs::create_dir_all(&dir)?;

    let mut written = Vec::with_capacity(outputs.len());
    for file in outputs {
        let path = match output {
            Some(path) if single && !path.is_dir() => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                path.to_path_buf()
            }
            _ => dir.join(&file.name),
        };
        fs::write(&path, &file.bytes)?;
        println!(
            "{} Wrote {} ({} pages, {})",
            style("✓").green(),
            path.display(),
            file.page_count,
            format_size(file.bytes.len())
        );
        written.push(path);
    }
    Ok(written)
}

/// Human-readable byte count.
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
