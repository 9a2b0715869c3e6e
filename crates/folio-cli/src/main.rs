//! CLI application for Folio PDF page operations.

mod bridge;
mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{compress, config, convert, crypt, info, pages, stamp};

/// Folio - merge, split, organize, stamp and compress PDF files locally
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine several PDFs into one
    Merge(pages::MergeArgs),

    /// Split a PDF into page ranges
    Split(pages::SplitArgs),

    /// Delete, reorder and rotate pages
    Organize(pages::OrganizeArgs),

    /// Rotate pages by a multiple of 90 degrees
    Rotate(pages::RotateArgs),

    /// Stamp a text or image watermark on pages
    Watermark(stamp::WatermarkArgs),

    /// Add page numbers
    Number(stamp::NumberArgs),

    /// Recompress the images of one or more PDFs
    Compress(compress::CompressArgs),

    /// Add a password through the encryption service
    Lock(crypt::CryptArgs),

    /// Remove a password through the encryption service
    Unlock(crypt::CryptArgs),

    /// Show page count, page sizes and metadata
    Info(info::InfoArgs),

    /// Convert images to PDF or PDF to text
    Convert(convert::ConvertArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Merge(args) => pages::merge(args, config_path).await,
        Commands::Split(args) => pages::split(args, config_path).await,
        Commands::Organize(args) => pages::organize(args, config_path).await,
        Commands::Rotate(args) => pages::rotate(args, config_path).await,
        Commands::Watermark(args) => stamp::watermark(args, config_path).await,
        Commands::Number(args) => stamp::number(args, config_path).await,
        Commands::Compress(args) => compress::run(args, config_path).await,
        Commands::Lock(args) => crypt::lock(args, config_path).await,
        Commands::Unlock(args) => crypt::unlock(args, config_path).await,
        Commands::Info(args) => info::run(args),
        Commands::Convert(args) => convert::run(args, config_path),
        Commands::Config(args) => config::run(args, config_path),
    }
}
