//! Delete, reorder and rotate pages within one document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::context::OperationContext;
use crate::error::{Result, ValidationError};
use crate::pdf::{PdfDocument, tree};

/// A rotation delta for one page, keyed by its original index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRotation {
    pub page: usize,
    pub degrees: i64,
}

/// Deletions, then a reorder of the remaining pages, then rotations.
///
/// Deletions and rotations use original page indices. `order` is a
/// permutation of positions among the pages left after deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizePlan {
    pub delete: Vec<usize>,
    pub order: Option<Vec<usize>>,
    pub rotations: Vec<PageRotation>,
}

impl OrganizePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete pages by original index.
    pub fn with_deletions(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.delete.extend(pages);
        self
    }

    /// Reorder the remaining pages.
    pub fn with_order(mut self, order: Vec<usize>) -> Self {
        self.order = Some(order);
        self
    }

    /// Add a rotation delta for a page by original index.
    pub fn with_rotation(mut self, page: usize, degrees: i64) -> Self {
        self.rotations.push(PageRotation { page, degrees });
        self
    }

    /// Check every rotation value.
    pub fn validate_rotations(&self) -> std::result::Result<(), ValidationError> {
        for rotation in &self.rotations {
            normalize_rotation(rotation.degrees)?;
        }
        Ok(())
    }

    /// Resolve the plan against a page count into the final sequence of
    /// original indices and a rotation delta per original index.
    pub(crate) fn resolve(
        &self,
        page_count: usize,
    ) -> std::result::Result<(Vec<usize>, Vec<u16>), ValidationError> {
        let check = |index: usize| {
            if index < page_count {
                Ok(())
            } else {
                Err(ValidationError::PageOutOfRange { index, page_count })
            }
        };

        let mut deleted = BTreeSet::new();
        for &index in &self.delete {
            check(index)?;
            deleted.insert(index);
        }
        let remaining: Vec<usize> = (0..page_count).filter(|i| !deleted.contains(i)).collect();
        if remaining.is_empty() && page_count > 0 {
            return Err(ValidationError::NoPagesRemaining);
        }

        let sequence = match &self.order {
            None => remaining,
            Some(order) => {
                if order.len() != remaining.len() {
                    return Err(ValidationError::InvalidOrder(format!(
                        "expected {} positions, got {}",
                        remaining.len(),
                        order.len()
                    )));
                }
                let mut seen = vec![false; remaining.len()];
                for &position in order {
                    match seen.get_mut(position) {
                        Some(slot) if !*slot => *slot = true,
                        Some(_) => {
                            return Err(ValidationError::InvalidOrder(format!(
                                "position {position} appears twice"
                            )));
                        }
                        None => {
                            return Err(ValidationError::InvalidOrder(format!(
                                "position {position} is out of range"
                            )));
                        }
                    }
                }
                order.iter().map(|&position| remaining[position]).collect()
            }
        };

        let mut deltas = vec![0u16; page_count];
        for rotation in &self.rotations {
            check(rotation.page)?;
            if deleted.contains(&rotation.page) {
                return Err(ValidationError::InvalidOrder(format!(
                    "page {} is both deleted and rotated",
                    rotation.page + 1
                )));
            }
            let delta = normalize_rotation(rotation.degrees)?;
            deltas[rotation.page] = (deltas[rotation.page] + delta) % 360;
        }
        Ok((sequence, deltas))
    }
}

/// Accept 0, 90, 180 or 270.
pub fn normalize_rotation(degrees: i64) -> std::result::Result<u16, ValidationError> {
    match degrees {
        0 | 90 | 180 | 270 => Ok(degrees as u16),
        other => Err(ValidationError::InvalidRotation(other)),
    }
}

/// Apply `plan` to `source`.
pub fn organize(ctx: &OperationContext, mut source: PdfDocument, plan: &OrganizePlan) -> Result<PdfDocument> {
    let page_ids = source.page_ids();
    let (sequence, deltas) = plan.resolve(page_ids.len())?;
    ctx.checkpoint()?;

    let doc = &mut source.inner;
    for (index, &delta) in deltas.iter().enumerate() {
        if delta == 0 {
            continue;
        }
        let page_id = page_ids[index];
        tree::materialize_inherited(doc, page_id)?;
        let rotation = (tree::page_rotation(doc, page_id) + delta) % 360;
        tree::page_dictionary_mut(doc, page_id)?.set("Rotate", rotation as i64);
    }

    let reordered = plan.order.is_some() || !plan.delete.is_empty();
    if reordered {
        let ordered: Vec<_> = sequence.iter().map(|&i| page_ids[i]).collect();
        tree::set_page_order(doc, &ordered)?;
        doc.prune_objects();
    }
    debug!(
        "Organized {} pages into {} (reordered: {})",
        page_ids.len(),
        sequence.len(),
        reordered
    );
    Ok(source)
}

/// Rotate `pages` (all pages when `None`) by `angle`.
pub fn rotate(
    ctx: &OperationContext,
    source: PdfDocument,
    angle: i64,
    pages: Option<&[usize]>,
) -> Result<PdfDocument> {
    normalize_rotation(angle)?;
    let targets: Vec<usize> = match pages {
        Some(pages) => pages.to_vec(),
        None => (0..source.page_count()).collect(),
    };
    let plan = targets
        .into_iter()
        .fold(OrganizePlan::new(), |plan, page| plan.with_rotation(page, angle));
    organize(ctx, source, &plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures;
    use crate::pdf::{SaveOptions, load, LoadOptions, save};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delete_then_reorder() {
        let ctx = OperationContext::detached();
        let source = fixtures::sample_document(4);
        let [a, _b, c, d] = [0, 1, 2, 3].map(fixtures::page_width);

        // [A, B, C, D] -> delete B -> [A, C, D] -> order [2, 0, 1] -> [D, A, C]
        let plan = OrganizePlan::new().with_deletions([1]).with_order(vec![2, 0, 1]);
        let result = organize(&ctx, source, &plan).unwrap();
        assert_eq!(fixtures::page_widths(&result), vec![d, a, c]);

        let mut result = result;
        let bytes = save(&mut result, &SaveOptions::compact()).unwrap();
        let reloaded = load(&bytes, &LoadOptions::default()).unwrap();
        assert_eq!(fixtures::page_widths(&reloaded), vec![d, a, c]);
    }

    #[test]
    fn test_rotation_is_additive() {
        let ctx = OperationContext::detached();
        let doc = fixtures::sample_document(2);
        let doc = rotate(&ctx, doc, 90, Some(&[0])).unwrap();
        let doc = rotate(&ctx, doc, 180, Some(&[0])).unwrap();
        assert_eq!(doc.rotations(), vec![270, 0]);

        let mut doc = doc;
        for _ in 0..4 {
            doc = rotate(&ctx, doc, 90, None).unwrap();
        }
        assert_eq!(doc.rotations(), vec![270, 0]);
    }

    #[test]
    fn test_only_quarter_turns_are_accepted() {
        assert_eq!(normalize_rotation(270), Ok(270));
        for degrees in [-90, -270, 45, 360, 450, 720] {
            assert_eq!(normalize_rotation(degrees), Err(ValidationError::InvalidRotation(degrees)));
        }

        let ctx = OperationContext::detached();
        for degrees in [-90, 360, 450] {
            let err = rotate(&ctx, fixtures::sample_document(2), degrees, Some(&[0])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            let plan = OrganizePlan::new().with_rotation(0, degrees);
            let err = organize(&ctx, fixtures::sample_document(2), &plan).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_rotations_use_original_indices() {
        let ctx = OperationContext::detached();
        let source = fixtures::sample_document(3);
        let plan = OrganizePlan::new()
            .with_deletions([0])
            .with_order(vec![1, 0])
            .with_rotation(2, 90);
        let result = organize(&ctx, source, &plan).unwrap();
        // original page 2 is now first
        assert_eq!(result.rotations(), vec![90, 0]);
        assert_eq!(result.page_size(0).unwrap().0, fixtures::page_width(2));
    }

    #[test]
    fn test_invalid_plans_are_rejected() {
        let ctx = OperationContext::detached();
        let cases = [
            OrganizePlan::new().with_rotation(0, 45),
            OrganizePlan::new().with_deletions([0, 1, 2]),
            OrganizePlan::new().with_deletions([5]),
            OrganizePlan::new().with_order(vec![0, 0, 1]),
            OrganizePlan::new().with_order(vec![0, 1]),
            OrganizePlan::new().with_deletions([1]).with_rotation(1, 90),
        ];
        for plan in cases {
            let err = organize(&ctx, fixtures::sample_document(3), &plan).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{plan:?}");
        }
    }

    #[test]
    fn test_inherited_rotation_is_respected() {
        let ctx = OperationContext::detached();
        let mut doc = fixtures::sample_document(2);
        let root = tree::pages_root(&doc.inner).unwrap();
        doc.inner.get_dictionary_mut(root).unwrap().set("Rotate", 90);
        assert_eq!(doc.rotations(), vec![90, 90]);

        let doc = rotate(&ctx, doc, 90, Some(&[1])).unwrap();
        assert_eq!(doc.rotations(), vec![90, 180]);
    }
}
