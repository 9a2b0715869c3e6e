//! Page ranges and their text syntax.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

lazy_static! {
    // "5", "2-7", "9-" (open end); 1-based
    static ref RANGE_PATTERN: Regex = Regex::new(r"^\s*(\d+)\s*(?:(-)\s*(\d*))?\s*$").unwrap();
}

/// Inclusive, zero-based range of page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Create a range; `start` must not exceed `end`.
    pub fn new(start: usize, end: usize) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidRange(format!(
                "range {}-{} is reversed",
                start + 1,
                end + 1
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering one page.
    pub fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    /// Number of pages covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    /// Always false; a range covers at least one page.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Page indices in order.
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }

    /// Check the range against a page count.
    pub fn validate(&self, page_count: usize) -> Result<(), ValidationError> {
        if self.start > self.end {
            return Err(ValidationError::InvalidRange(format!(
                "range {}-{} is reversed",
                self.start + 1,
                self.end + 1
            )));
        }
        if self.end >= page_count {
            return Err(ValidationError::PageOutOfRange {
                index: self.end,
                page_count,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start + 1)
        } else {
            write!(f, "{}-{}", self.start + 1, self.end + 1)
        }
    }
}

/// Parse 1-based range text such as `"1-3, 5, 8-"` into zero-based ranges.
///
/// An open end (`"8-"`) needs `page_count`; without it the range is
/// rejected.
pub fn parse_page_ranges(
    text: &str,
    page_count: Option<usize>,
) -> Result<Vec<PageRange>, ValidationError> {
    let mut ranges = Vec::new();
    for part in text.split(',').filter(|p| !p.trim().is_empty()) {
        let caps = RANGE_PATTERN
            .captures(part)
            .ok_or_else(|| ValidationError::InvalidRange(format!("cannot parse '{}'", part.trim())))?;

        let start = parse_page_number(&caps[1])?;
        let end = match (caps.get(2), caps.get(3).map(|m| m.as_str())) {
            (None, _) => start,
            (Some(_), Some(end)) if !end.is_empty() => parse_page_number(end)?,
            (Some(_), _) => page_count.ok_or_else(|| {
                ValidationError::InvalidRange(format!("open range '{}' needs a page count", part.trim()))
            })?,
        };
        if end < start {
            return Err(ValidationError::InvalidRange(format!(
                "range {}-{} is reversed",
                start, end
            )));
        }
        ranges.push(PageRange {
            start: start - 1,
            end: end - 1,
        });
    }

    if ranges.is_empty() {
        return Err(ValidationError::EmptyInput("no page ranges given".to_string()));
    }
    if let Some(count) = page_count {
        for range in &ranges {
            range.validate(count)?;
        }
    }
    Ok(ranges)
}

fn parse_page_number(text: &str) -> Result<usize, ValidationError> {
    match text.parse::<usize>() {
        Ok(0) => Err(ValidationError::InvalidRange("page numbers start at 1".to_string())),
        Ok(n) => Ok(n),
        Err(_) => Err(ValidationError::InvalidRange(format!("'{text}' is not a page number"))),
    }
}

/// One single-page range per page.
pub fn every_page(page_count: usize) -> Vec<PageRange> {
    (0..page_count).map(PageRange::single).collect()
}

/// Ranges of at most `chunk` pages covering the document.
pub fn chunks(page_count: usize, chunk: usize) -> Vec<PageRange> {
    let chunk = chunk.max(1);
    (0..page_count)
        .step_by(chunk)
        .map(|start| PageRange {
            start,
            end: (start + chunk - 1).min(page_count - 1),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ranges() {
        let ranges = parse_page_ranges("1-3, 5", None).unwrap();
        assert_eq!(ranges, vec![PageRange { start: 0, end: 2 }, PageRange::single(4)]);
    }

    #[test]
    fn test_parse_open_range() {
        let ranges = parse_page_ranges("4-", Some(6)).unwrap();
        assert_eq!(ranges, vec![PageRange { start: 3, end: 5 }]);
        assert!(parse_page_ranges("4-", None).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            parse_page_ranges("3-1", None),
            Err(ValidationError::InvalidRange(_))
        ));
        assert!(matches!(
            parse_page_ranges("0", None),
            Err(ValidationError::InvalidRange(_))
        ));
        assert!(matches!(
            parse_page_ranges("a-b", None),
            Err(ValidationError::InvalidRange(_))
        ));
        assert!(matches!(
            parse_page_ranges(" , ", None),
            Err(ValidationError::EmptyInput(_))
        ));
        assert_eq!(
            parse_page_ranges("2-9", Some(4)),
            Err(ValidationError::PageOutOfRange {
                index: 8,
                page_count: 4
            })
        );
    }

    #[test]
    fn test_every_page_and_chunks() {
        assert_eq!(every_page(3).len(), 3);
        assert_eq!(
            chunks(5, 2),
            vec![
                PageRange { start: 0, end: 1 },
                PageRange { start: 2, end: 3 },
                PageRange::single(4)
            ]
        );
        assert!(chunks(0, 2).is_empty());
    }

    #[test]
    fn test_display_is_one_based() {
        assert_eq!(PageRange { start: 0, end: 2 }.to_string(), "1-3");
        assert_eq!(PageRange::single(4).to_string(), "5");
    }
}
