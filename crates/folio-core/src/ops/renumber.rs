//! Page number stamping.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stamp::{Anchor, Mark, Overlay, Placement, ensure_unlocked, select_pages, validate_font};
use crate::context::OperationContext;
use crate::error::{Result, ValidationError};
use crate::pdf::PdfDocument;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(n|total)\}").unwrap();
}

/// How numbers are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStyle {
    #[default]
    Arabic,
    RomanLower,
    RomanUpper,
}

impl NumberStyle {
    pub fn render(self, n: usize) -> String {
        match self {
            NumberStyle::Arabic => n.to_string(),
            NumberStyle::RomanLower => to_roman(n).to_lowercase(),
            NumberStyle::RomanUpper => to_roman(n),
        }
    }
}

/// A page numbering request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageNumberSpec {
    /// Text with `{n}` for the current number and optionally `{total}`,
    /// the count of numbered pages.
    pub format: String,
    pub style: NumberStyle,
    /// Number given to the first numbered page.
    pub start: usize,
    pub placement: Placement,
    pub font_size: f32,
    pub color: [f32; 3],
    /// Zero-based page indices to number; every page when absent.
    pub pages: Option<Vec<usize>>,
    /// Leave the first selected page (usually a cover) unnumbered.
    pub skip_first: bool,
}

impl Default for PageNumberSpec {
    fn default() -> Self {
        Self {
            format: "{n}".to_string(),
            style: NumberStyle::Arabic,
            start: 1,
            placement: Placement::at(Anchor::BottomCenter).with_margin(24.0),
            font_size: 11.0,
            color: [0.0; 3],
            pages: None,
            skip_first: false,
        }
    }
}

impl PageNumberSpec {
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_style(mut self, style: NumberStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_pages(mut self, pages: Vec<usize>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn skip_first(mut self, skip: bool) -> Self {
        self.skip_first = skip;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if !self.format.contains("{n}") {
            return Err(ValidationError::InvalidStamp(format!(
                "page number format '{}' has no {{n}} placeholder",
                self.format
            )));
        }
        if self.start == 0 {
            return Err(ValidationError::InvalidStamp(
                "page numbers start at 1 or above".to_string(),
            ));
        }
        self.placement.validate()?;
        validate_font(self.font_size, &self.color)
    }
}

/// Fill `{n}` and `{total}` in `format`.
pub fn format_page_number(format: &str, n: usize, total: usize, style: NumberStyle) -> String {
    PLACEHOLDER
        .replace_all(format, |caps: &Captures| match &caps[1] {
            "n" => style.render(n),
            _ => style.render(total),
        })
        .into_owned()
}

/// Upper-case Roman numeral; numbers outside 1..=3999 fall back to digits.
pub fn to_roman(mut n: usize) -> String {
    const NUMERALS: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if n == 0 || n > 3999 {
        return n.to_string();
    }
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Draw page numbers according to `spec`.
pub fn renumber(ctx: &OperationContext, mut source: PdfDocument, spec: &PageNumberSpec) -> Result<PdfDocument> {
    spec.validate()?;
    ensure_unlocked(&source)?;
    let mut targets = select_pages(&source, spec.pages.as_deref())?;
    if spec.skip_first && !targets.is_empty() {
        targets.remove(0);
    }
    if targets.is_empty() {
        ctx.warn("no pages selected for numbering");
        return Ok(source);
    }

    let total = targets.len();
    let doc = &mut source.inner;
    let overlay = Overlay::new(doc, spec.placement.opacity, true, None)?;
    for (k, page_id) in targets.iter().enumerate() {
        ctx.checkpoint()?;
        let label = format_page_number(&spec.format, spec.start + k, total, spec.style);
        let mark = Mark::Text {
            text: &label,
            font_size: spec.font_size,
            color: spec.color,
        };
        overlay.apply(doc, *page_id, &mark, &spec.placement)?;
    }
    debug!("Numbered {} pages starting at {}", total, spec.start);
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures;
    use pretty_assertions::assert_eq;

    fn content(doc: &PdfDocument, index: usize) -> String {
        let bytes = doc.inner.get_page_content(doc.page_ids()[index]).unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_format_page_number() {
        assert_eq!(format_page_number("{n}", 3, 10, NumberStyle::Arabic), "3");
        assert_eq!(
            format_page_number("Page {n} of {total}", 4, 12, NumberStyle::RomanLower),
            "Page iv of xii"
        );
        assert_eq!(format_page_number("{n}/{n}", 9, 9, NumberStyle::RomanUpper), "IX/IX");
    }

    #[test]
    fn test_to_roman() {
        assert_eq!(to_roman(1), "I");
        assert_eq!(to_roman(14), "XIV");
        assert_eq!(to_roman(1994), "MCMXCIV");
        assert_eq!(to_roman(0), "0");
    }

    #[test]
    fn test_numbers_every_page() {
        let ctx = OperationContext::detached();
        let spec = PageNumberSpec::default().with_format("{n} / {total}");
        let doc = renumber(&ctx, fixtures::sample_document(3), &spec).unwrap();
        assert!(content(&doc, 0).contains("(1 / 3) Tj"));
        assert!(content(&doc, 2).contains("(3 / 3) Tj"));
    }

    #[test]
    fn test_skip_first_and_start() {
        let ctx = OperationContext::detached();
        let spec = PageNumberSpec::default().with_start(5).skip_first(true);
        let doc = renumber(&ctx, fixtures::sample_document(3), &spec).unwrap();
        assert!(!content(&doc, 0).contains("/FolioF"));
        assert!(content(&doc, 1).contains("(5) Tj"));
        assert!(content(&doc, 2).contains("(6) Tj"));
    }

    #[test]
    fn test_total_counts_pages_whatever_the_start() {
        let ctx = OperationContext::detached();
        let spec = PageNumberSpec::default().with_format("{n} of {total}").with_start(5);
        let doc = renumber(&ctx, fixtures::sample_document(3), &spec).unwrap();
        assert!(content(&doc, 0).contains("(5 of 3) Tj"));
        assert!(content(&doc, 2).contains("(7 of 3) Tj"));

        let spec = PageNumberSpec::default().with_format("{n} of {total}").skip_first(true);
        let doc = renumber(&ctx, fixtures::sample_document(3), &spec).unwrap();
        assert!(content(&doc, 2).contains("(2 of 2) Tj"));
    }

    #[test]
    fn test_invalid_specs() {
        let ctx = OperationContext::detached();
        for spec in [
            PageNumberSpec::default().with_format("Page"),
            PageNumberSpec::default().with_start(0),
            PageNumberSpec::default().with_pages(vec![10]),
        ] {
            let err = renumber(&ctx, fixtures::sample_document(2), &spec).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_empty_selection_warns() {
        let ctx = OperationContext::detached();
        let spec = PageNumberSpec::default().with_pages(vec![0]).skip_first(true);
        let doc = renumber(&ctx, fixtures::sample_document(2), &spec).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(ctx.warnings().len(), 1);
    }
}
