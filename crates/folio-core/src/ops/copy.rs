//! Deep copy of pages and their resources between documents.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::trace;

use crate::error::{PdfError, Result};
use crate::pdf::tree;

/// Copies pages from one source document into a destination.
///
/// Objects are staged until [`PageCopier::commit`], so a failed copy leaves
/// the destination untouched. References are remapped through a visited
/// map, which also breaks reference cycles. References to page tree nodes
/// that were not selected become `null` so that foreign pages are never
/// pulled in through annotations or outlines.
pub(crate) struct PageCopier<'a> {
    source: &'a Document,
    map: HashMap<ObjectId, ObjectId>,
    staged: BTreeMap<ObjectId, Object>,
    queue: VecDeque<(ObjectId, ObjectId)>,
    next_id: u32,
}

impl<'a> PageCopier<'a> {
    pub fn new(source: &'a Document, destination: &Document) -> Self {
        let used = destination.objects.keys().map(|id| id.0).max().unwrap_or(0);
        Self {
            source,
            map: HashMap::new(),
            staged: BTreeMap::new(),
            queue: VecDeque::new(),
            next_id: used.max(destination.max_id) + 1,
        }
    }

    /// Allocate destination ids for every page that will be copied, so
    /// references between selected pages stay intact.
    pub fn reserve_pages(&mut self, pages: &[ObjectId]) {
        for &page in pages {
            if !self.map.contains_key(&page) {
                self.allocate(page);
            }
        }
    }

    /// Copy one page under `parent` and return its destination id.
    pub fn copy_page(&mut self, page_id: ObjectId, parent: ObjectId) -> Result<ObjectId> {
        let source = self.source;
        // a page selected twice gets a second page object sharing resources
        let destination_id = match self.map.get(&page_id) {
            Some(id) if !self.staged.contains_key(id) => *id,
            Some(_) => self.fresh_id(),
            None => self.allocate(page_id),
        };

        let mut page = source
            .get_dictionary(page_id)
            .map_err(|e| PdfError::Structure(format!("page {page_id:?}: {e}")))?
            .clone();
        for key in tree::INHERITABLE {
            if !page.has(key) {
                if let Some(value) = tree::inherited_attribute(source, page_id, key) {
                    page.set(key, value);
                }
            }
        }
        page.remove(b"Parent");
        page.remove(b"B");

        let mut copied = self.copy_dictionary(&page);
        copied.set("Parent", Object::Reference(parent));
        self.staged.insert(destination_id, Object::Dictionary(copied));
        self.drain();
        Ok(destination_id)
    }

    /// Move the staged objects into `destination`.
    pub fn commit(self, destination: &mut Document) -> usize {
        let count = self.staged.len();
        destination.objects.extend(self.staged);
        destination.max_id = destination.max_id.max(self.next_id - 1);
        trace!("Committed {} copied objects", count);
        count
    }

    fn allocate(&mut self, source_id: ObjectId) -> ObjectId {
        let id = self.fresh_id();
        self.map.insert(source_id, id);
        id
    }

    fn fresh_id(&mut self) -> ObjectId {
        let id = (self.next_id, 0);
        self.next_id += 1;
        id
    }

    fn drain(&mut self) {
        let source = self.source;
        while let Some((source_id, destination_id)) = self.queue.pop_front() {
            let copied = match source.get_object(source_id) {
                Ok(object) => self.copy_object(object),
                Err(_) => Object::Null,
            };
            self.staged.insert(destination_id, copied);
        }
    }

    fn remap(&mut self, id: ObjectId) -> Object {
        if let Some(mapped) = self.map.get(&id) {
            return Object::Reference(*mapped);
        }
        let source = self.source;
        match source.get_object(id) {
            Ok(object) if tree::is_page_tree_node(object) => Object::Null,
            Ok(_) => {
                let destination_id = self.allocate(id);
                self.queue.push_back((id, destination_id));
                Object::Reference(destination_id)
            }
            Err(_) => {
                trace!("Dropping dangling reference {:?}", id);
                Object::Null
            }
        }
    }

    fn copy_object(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.remap(*id),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.copy_object(o)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dictionary(&stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy_object(value));
        }
        copied
    }
}

/// Copy `pages` of `source` to the end of `destination`'s page sequence.
/// Either every page is copied or `destination` is left unchanged.
pub(crate) fn append_pages(
    destination: &mut Document,
    source: &Document,
    pages: &[ObjectId],
) -> Result<Vec<ObjectId>> {
    let root = tree::pages_root(destination)?;
    let mut copier = PageCopier::new(source, destination);
    copier.reserve_pages(pages);

    let mut copied = Vec::with_capacity(pages.len());
    for &page in pages {
        copied.push(copier.copy_page(page, root)?);
    }
    copier.commit(destination);
    tree::append_kids(destination, root, &copied)?;
    Ok(copied)
}
