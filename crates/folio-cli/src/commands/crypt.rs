//! Lock and unlock commands, delegated to the encryption service.

use std::path::PathBuf;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use folio_core::{
    InputFile, OperationContext, OperationToken, OutputFile, inspect, lock_document,
    unlock_document,
};

use super::{load_config, parent_dir, read_input, user_error, write_outputs};
use crate::bridge::HttpBridge;

/// Arguments for the lock and unlock commands.
#[derive(Args)]
pub struct CryptArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Password to add or remove
    #[arg(short, long, required = true)]
    password: String,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Encryption service URL (default: from config)
    #[arg(long)]
    url: Option<String>,

    /// Request timeout in seconds (default: from config)
    #[arg(long)]
    timeout: Option<u64>,
}

pub async fn lock(args: CryptArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    run(args, config_path, true).await
}

pub async fn unlock(args: CryptArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    run(args, config_path, false).await
}

async fn run(args: CryptArgs, config_path: Option<&str>, lock: bool) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.url {
        config.bridge.base_url = url;
    }
    if let Some(timeout) = args.timeout {
        config.bridge.timeout_secs = timeout;
    }

    let input = read_input(&args.input, None)?;
    let bridge = HttpBridge::new(&config.bridge)?;
    info!("Sending {} to {}", input.name, config.bridge.base_url);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(if lock { "Locking..." } else { "Unlocking..." });
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let ctx = OperationContext::new(config, OperationToken::detached());
    let outcome = if lock {
        lock_document(&ctx, &bridge, &input.bytes, &args.password).await
    } else {
        unlock_document(&ctx, &bridge, &input.bytes, &args.password).await
    };
    spinner.finish_and_clear();
    let bytes = outcome.map_err(user_error)?;

    let name = format!("{}_{}.pdf", input.stem(), if lock { "locked" } else { "unlocked" });
    let output = InputFile::new(name, bytes);
    let page_count = inspect(&output).map(|info| info.page_count).unwrap_or(0);
    let outputs = [OutputFile {
        name: output.name,
        bytes: output.bytes,
        page_count,
    }];
    write_outputs(&outputs, args.output.as_deref(), &parent_dir(&args.input))?;
    Ok(())
}
