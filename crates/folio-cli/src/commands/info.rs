//! Info command - describe a PDF without changing it.

use std::path::PathBuf;

use clap::Args;
use console::style;

use folio_core::{DocumentInfo, EncryptionStatus, inspect};

use super::{format_size, read_input, user_error};

/// Arguments for the info command.
#[derive(Args)]
pub struct InfoArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Password for an encrypted input
    #[arg(short, long)]
    password: Option<String>,

    /// Print JSON instead of a summary
    #[arg(long)]
    json: bool,
}

pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let input = read_input(&args.input, args.password.as_deref())?;
    let info = inspect(&input).map_err(user_error)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", format_info(&input.name, input.bytes.len(), &info));
    }
    Ok(())
}

fn format_info(name: &str, size: usize, info: &DocumentInfo) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", style(name).bold()));
    output.push_str(&format!("  Version:    PDF {}\n", info.version));
    output.push_str(&format!("  Size:       {}\n", format_size(size)));
    output.push_str(&format!("  Pages:      {}\n", info.page_count));
    if let Some(title) = &info.title {
        output.push_str(&format!("  Title:      {}\n", title));
    }
    if let Some(producer) = &info.producer {
        output.push_str(&format!("  Producer:   {}\n", producer));
    }
    let encryption = match info.encryption {
        EncryptionStatus::None => "none",
        EncryptionStatus::Locked => "encrypted (no password given)",
        EncryptionStatus::Decrypted => "encrypted (opened with password)",
    };
    output.push_str(&format!("  Encryption: {}\n", encryption));

    output.push('\n');
    for page in &info.pages {
        output.push_str(&format!(
            "  {:>4}  {:>7.1} x {:<7.1} pt",
            page.number, page.width, page.height
        ));
        if page.rotation != 0 {
            output.push_str(&format!("  rotated {}°", page.rotation));
        }
        output.push('\n');
    }

    output
}
