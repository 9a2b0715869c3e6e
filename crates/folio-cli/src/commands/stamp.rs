//! Stamp commands - watermarks and page numbers.

use std::fs;
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use folio_core::OperationRequest;
use folio_core::ops::{Anchor, NumberStyle, PageNumberSpec, Placement, StampSpec};

use super::{load_config, page_count, page_list, parent_dir, read_input, run_request, write_outputs};

/// Where on the page a stamp is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Position {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl From<Position> for Anchor {
    fn from(position: Position) -> Self {
        match position {
            Position::TopLeft => Anchor::TopLeft,
            Position::TopCenter => Anchor::TopCenter,
            Position::TopRight => Anchor::TopRight,
            Position::CenterLeft => Anchor::CenterLeft,
            Position::Center => Anchor::Center,
            Position::CenterRight => Anchor::CenterRight,
            Position::BottomLeft => Anchor::BottomLeft,
            Position::BottomCenter => Anchor::BottomCenter,
            Position::BottomRight => Anchor::BottomRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Numerals {
    /// 1, 2, 3
    Arabic,
    /// i, ii, iii
    RomanLower,
    /// I, II, III
    RomanUpper,
}

impl From<Numerals> for NumberStyle {
    fn from(numerals: Numerals) -> Self {
        match numerals {
            Numerals::Arabic => NumberStyle::Arabic,
            Numerals::RomanLower => NumberStyle::RomanLower,
            Numerals::RomanUpper => NumberStyle::RomanUpper,
        }
    }
}

/// Arguments for the watermark command.
#[derive(Args)]
pub struct WatermarkArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Watermark text
    #[arg(short, long, required_unless_present = "image", conflicts_with = "image")]
    text: Option<String>,

    /// Watermark image (PNG or JPEG)
    #[arg(long)]
    image: Option<PathBuf>,

    /// Image width in points
    #[arg(long, default_value = "150")]
    width: f32,

    /// Font size in points
    #[arg(long, default_value = "48")]
    font_size: f32,

    /// Text color as hex RGB
    #[arg(long, default_value = "#808080", value_parser = parse_color)]
    color: [f32; 3],

    /// Anchor position
    #[arg(long, value_enum, default_value = "center")]
    position: Position,

    /// Distance from the page edges in points
    #[arg(long, default_value = "36")]
    margin: f32,

    /// Counter-clockwise rotation in degrees
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    rotation: f32,

    /// Opacity from 0 to 1
    #[arg(long, default_value = "0.5")]
    opacity: f32,

    /// Pages to stamp (default: all)
    #[arg(long)]
    pages: Option<String>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Password for an encrypted input
    #[arg(short, long)]
    password: Option<String>,
}

/// Arguments for the number command.
#[derive(Args)]
pub struct NumberArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Label format with {n} and optionally {total}
    #[arg(short, long, default_value = "{n}")]
    format: String,

    /// Numeral style
    #[arg(long, value_enum, default_value = "arabic")]
    style: Numerals,

    /// Number of the first numbered page
    #[arg(long, default_value = "1")]
    start: usize,

    /// Anchor position
    #[arg(long, value_enum, default_value = "bottom-center")]
    position: Position,

    /// Distance from the page edges in points
    #[arg(long, default_value = "24")]
    margin: f32,

    /// Font size in points
    #[arg(long, default_value = "11")]
    font_size: f32,

    /// Text color as hex RGB
    #[arg(long, default_value = "#000000", value_parser = parse_color)]
    color: [f32; 3],

    /// Pages to number (default: all)
    #[arg(long)]
    pages: Option<String>,

    /// Leave the first selected page unnumbered
    #[arg(long)]
    skip_first: bool,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Password for an encrypted input
    #[arg(short, long)]
    password: Option<String>,
}

pub async fn watermark(args: WatermarkArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let input = read_input(&args.input, args.password.as_deref())?;

    let placement = Placement::at(args.position.into())
        .with_margin(args.margin)
        .with_rotation(args.rotation)
        .with_opacity(args.opacity);
    let mut spec = match (&args.text, &args.image) {
        (Some(text), _) => StampSpec::text(text.as_str(), args.font_size).with_color(args.color),
        (None, Some(path)) => StampSpec::image(fs::read(path)?, args.width),
        (None, None) => anyhow::bail!("Either --text or --image is required"),
    }
    .with_placement(placement);
    if let Some(text) = &args.pages {
        spec = spec.with_pages(page_list(text, page_count(&input)?)?);
    }

    let result = run_request(config, vec![input], &OperationRequest::Watermark(spec)).await?;
    write_outputs(&result.outputs, args.output.as_deref(), &parent_dir(&args.input))?;
    Ok(())
}

pub async fn number(args: NumberArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let input = read_input(&args.input, args.password.as_deref())?;

    let mut spec = PageNumberSpec::default()
        .with_format(args.format.as_str())
        .with_style(args.style.into())
        .with_start(args.start)
        .with_placement(Placement::at(args.position.into()).with_margin(args.margin))
        .skip_first(args.skip_first);
    spec.font_size = args.font_size;
    spec.color = args.color;
    if let Some(text) = &args.pages {
        spec = spec.with_pages(page_list(text, page_count(&input)?)?);
    }

    let result = run_request(config, vec![input], &OperationRequest::PageNumbers(spec)).await?;
    write_outputs(&result.outputs, args.output.as_deref(), &parent_dir(&args.input))?;
    Ok(())
}

/// Parse `#rrggbb` (the `#` is optional) into RGB components in 0..=1.
fn parse_color(text: &str) -> Result<[f32; 3], String> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("expected a color like #ff0000, got '{text}'"));
    }
    let mut rgb = [0.0; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        let value = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| format!("'{text}' is not a hex color"))?;
        *channel = value as f32 / 255.0;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff0000"), Ok([1.0, 0.0, 0.0]));
        assert_eq!(parse_color("000000"), Ok([0.0, 0.0, 0.0]));
        assert!(parse_color("#fff").is_err());
        assert!(parse_color("#gg0000").is_err());
    }

    #[test]
    fn test_position_maps_to_anchor() {
        assert_eq!(Anchor::from(Position::BottomCenter), Anchor::BottomCenter);
        assert_eq!(NumberStyle::from(Numerals::RomanUpper), NumberStyle::RomanUpper);
    }
}
