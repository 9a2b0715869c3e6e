//! Convert command - images to PDF and PDF to text.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use glob::glob;
use tracing::info;

use folio_core::{OperationContext, SaveOptions, images_to_pdf, pdf_to_text, save};

use super::{format_size, load_config, print_warnings, read_input, user_error};

/// Arguments for the convert command.
#[derive(Args)]
pub struct ConvertArgs {
    #[command(subcommand)]
    command: ConvertCommand,
}

#[derive(Subcommand)]
enum ConvertCommand {
    /// Put JPEG or PNG images into a PDF, one per page
    Images {
        /// Image files or glob patterns, in page order
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file
        #[arg(short, long, default_value = "images.pdf")]
        output: PathBuf,
    },

    /// Extract the text of a PDF
    Text {
        /// Input PDF file
        #[arg(required = true)]
        input: PathBuf,

        /// Output text file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(args: ConvertArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ConvertCommand::Images { inputs, output } => images(&inputs, &output, config_path),
        ConvertCommand::Text { input, output } => text(&input, output.as_deref()),
    }
}

fn images(patterns: &[String], output: &Path, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let mut files = Vec::new();
    for pattern in patterns {
        files.extend(glob(pattern)?.filter_map(|r| r.ok()));
    }
    if files.is_empty() {
        anyhow::bail!("No images found for: {}", patterns.join(" "));
    }
    info!("Converting {} images", files.len());

    let inputs = files
        .iter()
        .map(|path| read_input(path, None))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let options = SaveOptions::from(&config.output);
    let ctx = OperationContext::detached_with(config);
    let mut document = images_to_pdf(&ctx, &inputs).map_err(user_error)?;
    print_warnings(&ctx.take_warnings());
    let bytes = save(&mut document, &options).map_err(user_error)?;

    fs::write(output, &bytes)?;
    println!(
        "{} Wrote {} ({} pages, {})",
        style("✓").green(),
        output.display(),
        document.page_count(),
        format_size(bytes.len())
    );
    Ok(())
}

fn text(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let file = read_input(input, None)?;
    let text = pdf_to_text(&file.bytes).map_err(user_error)?;

    match output {
        Some(path) => {
            fs::write(path, &text)?;
            println!(
                "{} Text written to {}",
                style("✓").green(),
                path.display()
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}
