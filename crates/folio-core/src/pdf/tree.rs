//! Page tree helpers over the lopdf object table.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::collections::HashSet;
use tracing::trace;

use crate::error::PdfError;

/// Page attributes a page may inherit from its ancestors.
pub(crate) const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when neither the page nor its ancestors carry a box.
pub(crate) const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Build an empty document with a catalog and an empty page tree.
pub(crate) fn empty_document() -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

/// Object id of the root `/Pages` node.
pub(crate) fn pages_root(doc: &Document) -> Result<ObjectId, PdfError> {
    let catalog = doc
        .catalog()
        .map_err(|e| PdfError::Structure(format!("missing catalog: {e}")))?;
    catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|e| PdfError::Structure(format!("catalog has no page tree: {e}")))
}

/// Numeric value of an integer or real object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Look up an attribute on a page, walking `/Parent` links when the page
/// itself does not carry it.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut visited = HashSet::new();
    let mut current = page_id;
    while visited.insert(current) {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    trace!("Cycle in page tree parents at {:?}", current);
    None
}

/// Copy inherited attributes onto the page dictionary itself, so the page
/// no longer depends on its ancestors.
pub(crate) fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfError> {
    let missing: Vec<(&[u8], Object)> = {
        let dict = page_dictionary(doc, page_id)?;
        INHERITABLE
            .iter()
            .filter(|key| !dict.has(key))
            .filter_map(|key| inherited_attribute(doc, page_id, key).map(|value| (*key, value)))
            .collect()
    };
    if missing.is_empty() {
        return Ok(());
    }
    let dict = page_dictionary_mut(doc, page_id)?;
    for (key, value) in missing {
        dict.set(key, value);
    }
    Ok(())
}

pub(crate) fn page_dictionary(doc: &Document, page_id: ObjectId) -> Result<&Dictionary, PdfError> {
    doc.get_dictionary(page_id)
        .map_err(|e| PdfError::Structure(format!("page {page_id:?} is not a dictionary: {e}")))
}

pub(crate) fn page_dictionary_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, PdfError> {
    doc.get_dictionary_mut(page_id)
        .map_err(|e| PdfError::Structure(format!("page {page_id:?} is not a dictionary: {e}")))
}

/// Replace the page sequence with `pages`, attached directly to the root
/// `/Pages` node. Inherited attributes are materialized first so that
/// detaching pages from intermediate nodes does not change them.
pub(crate) fn set_page_order(doc: &mut Document, pages: &[ObjectId]) -> Result<(), PdfError> {
    for &page_id in pages {
        materialize_inherited(doc, page_id)?;
    }
    let root = pages_root(doc)?;
    for &page_id in pages {
        page_dictionary_mut(doc, page_id)?.set("Parent", Object::Reference(root));
    }
    let kids: Vec<Object> = pages.iter().map(|id| Object::Reference(*id)).collect();
    let root_dict = doc
        .get_dictionary_mut(root)
        .map_err(|e| PdfError::Structure(format!("page tree root: {e}")))?;
    root_dict.set("Kids", kids);
    root_dict.set("Count", pages.len() as i64);
    Ok(())
}

/// Append already-parented pages to the root `/Pages` node.
pub(crate) fn append_kids(doc: &mut Document, root: ObjectId, pages: &[ObjectId]) -> Result<(), PdfError> {
    let root_dict = doc
        .get_dictionary_mut(root)
        .map_err(|e| PdfError::Structure(format!("page tree root: {e}")))?;
    let mut kids = match root_dict.get(b"Kids") {
        Ok(Object::Array(kids)) => kids.clone(),
        _ => Vec::new(),
    };
    kids.extend(pages.iter().map(|id| Object::Reference(*id)));
    let count = root_dict
        .get(b"Count")
        .and_then(Object::as_i64)
        .unwrap_or(0)
        + pages.len() as i64;
    root_dict.set("Kids", kids);
    root_dict.set("Count", count);
    Ok(())
}

/// Effective `/Rotate` of a page, normalized to 0, 90, 180 or 270.
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let raw = inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, &obj).and_then(number))
        .unwrap_or(0.0);
    snap_rotation(raw as i64)
}

/// Round an arbitrary stored rotation to the nearest quarter turn.
pub(crate) fn snap_rotation(raw: i64) -> u16 {
    let turned = raw.rem_euclid(360);
    (((turned + 45) / 90 * 90) % 360) as u16
}

/// Visible box of a page in user space: `/CropBox`, else `/MediaBox`,
/// normalized so that the first corner is the lower-left one.
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .iter()
        .find_map(|key| inherited_attribute(doc, page_id, key).and_then(|obj| rectangle(doc, &obj)))
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

fn rectangle(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let items = resolve(doc, obj)?.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut values = [0.0f32; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = resolve(doc, item).and_then(number)?;
    }
    let [x0, y0, x1, y1] = values;
    let rect = [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)];
    (rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

/// Follow a reference to the object it points to.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    doc.dereference(obj).ok().map(|(_, resolved)| resolved)
}

/// Whether an object is a page tree node (`/Type /Page` or `/Type /Pages`).
pub(crate) fn is_page_tree_node(obj: &Object) -> bool {
    let dict = match obj {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Page") | Ok(b"Pages")
    )
}
