//! Overlay text or image stamps on pages.
//!
//! The original content of each page is wrapped in `q ... Q` and the stamp
//! is drawn afterwards in its own graphics state, so the page's existing
//! streams are never rewritten. Placement is computed in the orientation
//! the page is displayed in, honouring `/Rotate`.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::context::OperationContext;
use crate::error::{PdfError, Result, ValidationError};
use crate::pdf::xobject::{EmbeddedImage, embed_image};
use crate::pdf::{PdfDocument, tree};

/// Helvetica advance widths for bytes 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Where a stamp is anchored on the displayed page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    #[default]
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    /// Horizontal and vertical position factors, 0 = left/bottom, 1 = right/top.
    fn factors(self) -> (f32, f32) {
        match self {
            Anchor::TopLeft => (0.0, 1.0),
            Anchor::TopCenter => (0.5, 1.0),
            Anchor::TopRight => (1.0, 1.0),
            Anchor::CenterLeft => (0.0, 0.5),
            Anchor::Center => (0.5, 0.5),
            Anchor::CenterRight => (1.0, 0.5),
            Anchor::BottomLeft => (0.0, 0.0),
            Anchor::BottomCenter => (0.5, 0.0),
            Anchor::BottomRight => (1.0, 0.0),
        }
    }
}

/// Position, rotation and opacity of a stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub anchor: Anchor,
    /// Distance from the anchored page edges, in points.
    pub margin: f32,
    /// Extra shift to the right, in points.
    pub offset_x: f32,
    /// Extra shift upwards, in points.
    pub offset_y: f32,
    /// Counter-clockwise rotation in degrees.
    pub rotation: f32,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            anchor: Anchor::Center,
            margin: 36.0,
            offset_x: 0.0,
            offset_y: 0.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

impl Placement {
    pub fn at(anchor: Anchor) -> Self {
        Self {
            anchor,
            ..Self::default()
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_offset(mut self, x: f32, y: f32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ValidationError::InvalidOpacity(self.opacity));
        }
        let finite = [self.margin, self.offset_x, self.offset_y, self.rotation]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.margin < 0.0 {
            return Err(ValidationError::InvalidStamp(
                "margin, offsets and rotation must be finite and the margin non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a stamp draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StampContent {
    /// A single line of Helvetica text.
    Text {
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
        /// RGB components in 0.0..=1.0.
        #[serde(default)]
        color: [f32; 3],
    },
    /// A JPEG or PNG image scaled to `width` points.
    Image { data: Vec<u8>, width: f32 },
}

fn default_font_size() -> f32 {
    48.0
}

/// A watermark request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampSpec {
    pub content: StampContent,
    #[serde(default)]
    pub placement: Placement,
    /// Zero-based page indices; every page when absent.
    #[serde(default)]
    pub pages: Option<Vec<usize>>,
}

impl StampSpec {
    /// Black text of the given size, centred.
    pub fn text(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            content: StampContent::Text {
                text: text.into(),
                font_size,
                color: [0.0; 3],
            },
            placement: Placement::default(),
            pages: None,
        }
    }

    /// An image `width` points wide, centred.
    pub fn image(data: Vec<u8>, width: f32) -> Self {
        Self {
            content: StampContent::Image { data, width },
            placement: Placement::default(),
            pages: None,
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_color(mut self, rgb: [f32; 3]) -> Self {
        if let StampContent::Text { color, .. } = &mut self.content {
            *color = rgb;
        }
        self
    }

    pub fn with_pages(mut self, pages: Vec<usize>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.placement.validate()?;
        match &self.content {
            StampContent::Text {
                text,
                font_size,
                color,
            } => {
                if text.trim().is_empty() {
                    return Err(ValidationError::InvalidStamp("text is empty".to_string()));
                }
                validate_font(*font_size, color)
            }
            StampContent::Image { data, width } => {
                if data.is_empty() {
                    return Err(ValidationError::InvalidStamp("image is empty".to_string()));
                }
                if !(width.is_finite() && *width > 0.0) {
                    return Err(ValidationError::InvalidStamp(format!(
                        "image width {width} must be positive"
                    )));
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn validate_font(
    font_size: f32,
    color: &[f32; 3],
) -> std::result::Result<(), ValidationError> {
    if !(font_size.is_finite() && font_size > 0.0) {
        return Err(ValidationError::InvalidStamp(format!(
            "font size {font_size} must be positive"
        )));
    }
    if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err(ValidationError::InvalidStamp(
            "color components must be within 0.0..=1.0".to_string(),
        ));
    }
    Ok(())
}

/// Stamp `spec` onto the selected pages.
pub fn stamp(ctx: &OperationContext, mut source: PdfDocument, spec: &StampSpec) -> Result<PdfDocument> {
    spec.validate()?;
    ensure_unlocked(&source)?;
    let targets = select_pages(&source, spec.pages.as_deref())?;

    let doc = &mut source.inner;
    let (overlay, mark) = match &spec.content {
        StampContent::Text {
            text,
            font_size,
            color,
        } => (
            Overlay::new(doc, spec.placement.opacity, true, None)?,
            Mark::Text {
                text,
                font_size: *font_size,
                color: *color,
            },
        ),
        StampContent::Image { data, width } => (
            Overlay::new(doc, spec.placement.opacity, false, Some(data))?,
            Mark::Image { width: *width },
        ),
    };

    for page_id in &targets {
        ctx.checkpoint()?;
        overlay.apply(doc, *page_id, &mark, &spec.placement)?;
    }
    debug!("Stamped {} pages", targets.len());
    Ok(source)
}

pub(crate) fn ensure_unlocked(source: &PdfDocument) -> Result<()> {
    if source.is_locked() {
        return Err(PdfError::PasswordRequired.into());
    }
    Ok(())
}

/// Page ids for `pages` (every page when `None`), deduplicated, in
/// document order.
pub(crate) fn select_pages(source: &PdfDocument, pages: Option<&[usize]>) -> Result<Vec<ObjectId>> {
    let all = source.page_ids();
    match pages {
        None => Ok(all),
        Some(pages) => {
            let unique: BTreeSet<usize> = pages.iter().copied().collect();
            unique
                .into_iter()
                .map(|index| {
                    all.get(index).copied().ok_or_else(|| {
                        ValidationError::PageOutOfRange {
                            index,
                            page_count: all.len(),
                        }
                        .into()
                    })
                })
                .collect()
        }
    }
}

/// What to draw on one page.
pub(crate) enum Mark<'a> {
    Text {
        text: &'a str,
        font_size: f32,
        color: [f32; 3],
    },
    Image {
        width: f32,
    },
}

/// Objects shared by every stamped page of one document.
pub(crate) struct Overlay {
    open_id: ObjectId,
    gs_id: ObjectId,
    font_id: Option<ObjectId>,
    image: Option<EmbeddedImage>,
}

impl Overlay {
    pub fn new(doc: &mut Document, opacity: f32, with_font: bool, image: Option<&[u8]>) -> Result<Self> {
        let image = image.map(|bytes| embed_image(doc, bytes)).transpose()?;
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let gs_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(opacity),
            "CA" => Object::Real(opacity),
        });
        let font_id = with_font.then(|| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            })
        });
        Ok(Self {
            open_id,
            gs_id,
            font_id,
            image,
        })
    }

    /// Draw `mark` on one page.
    pub fn apply(&self, doc: &mut Document, page_id: ObjectId, mark: &Mark<'_>, placement: &Placement) -> Result<()> {
        tree::materialize_inherited(doc, page_id)?;

        let page = tree::page_dictionary(doc, page_id)?;
        let mut resources = owned_dictionary(doc, page.get(b"Resources").ok());
        let gs_name = register(doc, &mut resources, b"ExtGState", "FolioGS", self.gs_id);
        let font_name = self
            .font_id
            .map(|id| register(doc, &mut resources, b"Font", "FolioF", id));
        let image_name = self
            .image
            .map(|image| register(doc, &mut resources, b"XObject", "FolioIm", image.id));

        let page_box = tree::page_box(doc, page_id);
        let rotation = tree::page_rotation(doc, page_id);

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(gs_name.into_bytes())]),
        ];
        match (mark, font_name, self.image, image_name) {
            (Mark::Text { text, font_size, color }, Some(font), _, _) => {
                let width = text_width(text, *font_size);
                let matrix = placement_matrix(page_box, rotation, (width, *font_size), placement);
                operations.push(Operation::new("cm", reals(&matrix)));
                operations.push(Operation::new("rg", reals(color)));
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.into_bytes()), Object::Real(*font_size)],
                ));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Real(-width / 2.0), Object::Real(-font_size * 0.35)],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(win_ansi(text), StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            (Mark::Image { width }, _, Some(image), Some(name)) => {
                let height = width * image.aspect();
                let matrix = placement_matrix(page_box, rotation, (*width, height), placement);
                operations.push(Operation::new("cm", reals(&matrix)));
                operations.push(Operation::new(
                    "cm",
                    reals(&[*width, 0.0, 0.0, height, -width / 2.0, -height / 2.0]),
                ));
                operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            }
            _ => {
                return Err(PdfError::Structure("stamp resources do not match the mark".to_string()).into());
            }
        }
        operations.push(Operation::new("Q", vec![]));

        let encoded = Content { operations }
            .encode()
            .map_err(|e| PdfError::Serialize(format!("stamp content: {e}")))?;
        let mut content = b"\nQ\n".to_vec();
        content.extend_from_slice(&encoded);
        let stamp_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut contents = vec![Object::Reference(self.open_id)];
        contents.extend(existing_contents(doc, page_id));
        contents.push(Object::Reference(stamp_id));

        let page = tree::page_dictionary_mut(doc, page_id)?;
        page.set("Resources", resources);
        page.set("Contents", contents);
        Ok(())
    }
}

fn reals(values: &[f32]) -> Vec<Object> {
    values.iter().map(|v| Object::Real(*v)).collect()
}

/// Resolve a possibly indirect dictionary into an owned copy.
fn owned_dictionary(doc: &Document, obj: Option<&Object>) -> Dictionary {
    obj.and_then(|o| tree::resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Add `id` under a fresh name in `resources[category]` and return the name.
fn register(doc: &Document, resources: &mut Dictionary, category: &[u8], base: &str, id: ObjectId) -> String {
    let mut entries = owned_dictionary(doc, resources.get(category).ok());
    let mut name = base.to_string();
    let mut suffix = 1;
    while entries.has(name.as_bytes()) {
        suffix += 1;
        name = format!("{base}{suffix}");
    }
    entries.set(name.as_bytes(), Object::Reference(id));
    resources.set(category, entries);
    name
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Width of `text` set in Helvetica at `font_size`.
pub(crate) fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = win_ansi(text)
        .iter()
        .map(|&b| match b {
            32..=126 => HELVETICA_WIDTHS[(b - 32) as usize] as u32,
            _ => 556,
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// Encode text for a WinAnsi font; characters outside Latin-1 become `?`.
pub(crate) fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Transformation matrix that puts the centre of a `size` box at the
/// placement position and rotates it, in the page's user space.
pub(crate) fn placement_matrix(page_box: [f32; 4], rotation: u16, size: (f32, f32), placement: &Placement) -> [f32; 6] {
    let [x0, y0, x1, y1] = page_box;
    let (w, h) = (x1 - x0, y1 - y0);
    let (visual_w, visual_h) = if rotation % 180 == 0 { (w, h) } else { (h, w) };

    let theta = placement.rotation.to_radians();
    let (bw, bh) = size;
    let extent_w = (bw * theta.cos()).abs() + (bh * theta.sin()).abs();
    let extent_h = (bw * theta.sin()).abs() + (bh * theta.cos()).abs();

    let (fx, fy) = placement.anchor.factors();
    let margin = placement.margin;
    let vx = margin + extent_w / 2.0 + fx * (visual_w - 2.0 * margin - extent_w) + placement.offset_x;
    let vy = margin + extent_h / 2.0 + fy * (visual_h - 2.0 * margin - extent_h) + placement.offset_y;

    let (u, v) = match rotation {
        90 => (w - vy, vx),
        180 => (w - vx, h - vy),
        270 => (vy, h - vx),
        _ => (vx, vy),
    };
    let angle = (rotation as f32 + placement.rotation).to_radians();
    let (sin, cos) = angle.sin_cos();
    [cos, sin, -sin, cos, x0 + u, y0 + v]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_text_width() {
        assert!(close(text_width("A", 1000.0), 667.0));
        assert!(close(text_width("Hi", 10.0), 7.22 + 2.22));
    }

    #[test]
    fn test_placement_unrotated_corners() {
        let page = [0.0, 0.0, 600.0, 800.0];
        let m = placement_matrix(page, 0, (100.0, 20.0), &Placement::at(Anchor::BottomLeft).with_margin(10.0));
        assert!(close(m[4], 60.0) && close(m[5], 20.0));

        let m = placement_matrix(page, 0, (100.0, 20.0), &Placement::at(Anchor::TopRight).with_margin(10.0));
        assert!(close(m[4], 540.0) && close(m[5], 780.0));

        let m = placement_matrix(page, 0, (100.0, 20.0), &Placement::default().with_offset(5.0, -5.0));
        assert!(close(m[4], 305.0) && close(m[5], 395.0));
        assert!(close(m[0], 1.0) && close(m[1], 0.0));
    }

    #[test]
    fn test_placement_follows_page_rotation() {
        // displayed landscape: 800 wide, 600 high
        let page = [0.0, 0.0, 600.0, 800.0];
        let placement = Placement::at(Anchor::BottomLeft).with_margin(0.0);
        let m = placement_matrix(page, 90, (100.0, 20.0), &placement);
        // visual centre (50, 10) maps to user (600 - 10, 50)
        assert!(close(m[4], 590.0) && close(m[5], 50.0));
        // text runs up the user y axis
        assert!(close(m[0], 0.0) && close(m[1], 1.0));

        let m = placement_matrix(page, 270, (100.0, 20.0), &placement);
        assert!(close(m[4], 10.0) && close(m[5], 750.0));
    }

    #[test]
    fn test_offset_media_box() {
        let page = [100.0, 50.0, 700.0, 850.0];
        let m = placement_matrix(page, 0, (10.0, 10.0), &Placement::default());
        assert!(close(m[4], 400.0) && close(m[5], 450.0));
    }

    #[test]
    fn test_stamp_wraps_existing_content() {
        let ctx = OperationContext::detached();
        let source = fixtures::sample_document(2);
        let spec = StampSpec::text("DRAFT", 40.0)
            .with_placement(Placement::default().with_rotation(45.0).with_opacity(0.3))
            .with_pages(vec![1]);

        let doc = stamp(&ctx, source, &spec).unwrap();
        let pages = doc.page_ids();
        let first = doc.inner.get_page_content(pages[0]).unwrap();
        let second = doc.inner.get_page_content(pages[1]).unwrap();
        assert!(!String::from_utf8_lossy(&first).contains("DRAFT"));

        let text = String::from_utf8_lossy(&second);
        assert!(text.starts_with("q\n"));
        assert!(text.contains("Page 2"));
        assert!(text.contains("(DRAFT) Tj"));
        assert!(text.contains("/FolioGS gs"));
        assert!(text.trim_end().ends_with('Q'));

        let resources = doc.inner.get_dictionary(pages[1]).unwrap().get(b"Resources").unwrap();
        let fonts = resources.as_dict().unwrap().get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"FolioF"));
    }

    #[test]
    fn test_image_stamp() {
        let ctx = OperationContext::detached();
        let spec = StampSpec::image(fixtures::transparent_png(10, 5), 100.0)
            .with_placement(Placement::at(Anchor::TopLeft));
        let doc = stamp(&ctx, fixtures::sample_document(1), &spec).unwrap();
        let content = doc.inner.get_page_content(doc.page_ids()[0]).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("/FolioIm Do"));
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_invalid_stamps_are_rejected() {
        let ctx = OperationContext::detached();
        let bad = [
            StampSpec::text("x", 12.0).with_placement(Placement::default().with_opacity(1.5)),
            StampSpec::text("   ", 12.0),
            StampSpec::text("x", 0.0),
            StampSpec::text("x", 12.0).with_pages(vec![7]),
            StampSpec::image(Vec::new(), 10.0),
        ];
        for spec in bad {
            let err = stamp(&ctx, fixtures::sample_document(2), &spec).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{spec:?}");
        }
    }

    #[test]
    fn test_win_ansi_replaces_unsupported() {
        assert_eq!(win_ansi("a\u{e9}\u{4e2d}"), vec![b'a', 0xE9, b'?']);
    }
}
