//! Traversal of page and form XObject resource dictionaries
//!
//! The walker visits every image XObject named in the XObject dictionary of a
//! page, descending into form XObjects to any depth. Dictionaries are held as
//! locations rather than borrows so the visitor can mutate the document and
//! the walker re-resolves the live entry for every name.

use crate::error::{Result, ShrinkError};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

const RESOURCES: &[u8] = b"Resources";
const XOBJECT: &[u8] = b"XObject";

/// Ancestors followed when looking for inherited page resources
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Location of an XObject name dictionary: the indirect object that holds it
/// plus the inline keys leading from that object to the dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDict {
    owner: ObjectId,
    path: Vec<&'static [u8]>,
}

fn holder_dict(object: &Object, id: ObjectId) -> Result<&Dictionary> {
    match object {
        Object::Dictionary(d) => Ok(d),
        Object::Stream(s) => Ok(&s.dict),
        _ => Err(ShrinkError::MalformedResources(format!(
            "{:?} is neither a dictionary nor a stream",
            id
        ))),
    }
}

impl ResourceDict {
    /// Object that stores the dictionary, directly or inline
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    fn get<'a>(&self, doc: &'a Document) -> Result<&'a Dictionary> {
        let mut dict = holder_dict(doc.get_object(self.owner)?, self.owner)?;
        for key in &self.path {
            dict = match dict.get(key)? {
                Object::Dictionary(d) => d,
                _ => return Err(self.malformed(key)),
            };
        }
        Ok(dict)
    }

    fn get_mut<'a>(&self, doc: &'a mut Document) -> Result<&'a mut Dictionary> {
        let mut dict = match doc.get_object_mut(self.owner)? {
            Object::Dictionary(d) => d,
            Object::Stream(s) => &mut s.dict,
            _ => return Err(self.malformed(b"")),
        };
        for key in &self.path {
            dict = match dict.get_mut(key)? {
                Object::Dictionary(d) => d,
                _ => return Err(self.malformed(key)),
            };
        }
        Ok(dict)
    }

    fn malformed(&self, key: &[u8]) -> ShrinkError {
        ShrinkError::MalformedResources(format!(
            "{} of {:?} is not a dictionary",
            String::from_utf8_lossy(key),
            self.owner
        ))
    }

    /// Snapshot of the names currently present
    pub fn names(&self, doc: &Document) -> Result<Vec<Vec<u8>>> {
        Ok(self.get(doc)?.iter().map(|(name, _)| name.clone()).collect())
    }

    /// Classify the live entry under `name`, `None` if the name is gone
    pub fn kind(&self, doc: &Document, name: &[u8]) -> Result<Option<XObjectKind>> {
        match self.get(doc)?.get(name) {
            Ok(value) => classify(doc, value).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Point an existing entry at another object. Names are never added.
    pub fn replace(&self, doc: &mut Document, name: &[u8], id: ObjectId) -> Result<()> {
        let dict = self.get_mut(doc)?;
        if dict.get(name).is_err() {
            return Err(ShrinkError::MalformedResources(format!(
                "No XObject named {} in {:?}",
                String::from_utf8_lossy(name),
                self.owner
            )));
        }
        dict.set(name.to_vec(), Object::Reference(id));
        Ok(())
    }
}

/// The XObject variants the walker distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    Image(ObjectId),
    Form(ObjectId),
    Other,
}

/// Classify a value of an XObject dictionary. Dangling references are errors.
pub fn classify(doc: &Document, value: &Object) -> Result<XObjectKind> {
    let id = match value {
        Object::Reference(id) => *id,
        _ => return Ok(XObjectKind::Other),
    };
    match doc.get_object(id)? {
        Object::Stream(stream) => match stream.dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) => match subtype.as_slice() {
                b"Image" => Ok(XObjectKind::Image(id)),
                b"Form" => Ok(XObjectKind::Form(id)),
                _ => Ok(XObjectKind::Other),
            },
            _ => Ok(XObjectKind::Other),
        },
        _ => Ok(XObjectKind::Other),
    }
}

/// XObject dictionary of the resources held by `holder` (a page, page tree
/// node or form XObject)
pub fn xobject_dict(doc: &Document, holder: ObjectId) -> Result<Option<ResourceDict>> {
    let holder_obj = holder_dict(doc.get_object(holder)?, holder)?;
    let (owner, mut path, resources) = match holder_obj.get(RESOURCES) {
        Err(_) | Ok(Object::Null) => return Ok(None),
        Ok(Object::Dictionary(d)) => (holder, vec![RESOURCES], d),
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Dictionary(d) => (*id, Vec::new(), d),
            Object::Null => return Ok(None),
            _ => {
                return Err(ShrinkError::MalformedResources(format!(
                    "Resources of {:?} is not a dictionary",
                    holder
                )))
            }
        },
        Ok(_) => {
            return Err(ShrinkError::MalformedResources(format!(
                "Resources of {:?} is not a dictionary",
                holder
            )))
        }
    };

    match resources.get(XOBJECT) {
        Err(_) | Ok(Object::Null) => Ok(None),
        Ok(Object::Dictionary(_)) => {
            path.push(XOBJECT);
            Ok(Some(ResourceDict { owner, path }))
        }
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Dictionary(_) => Ok(Some(ResourceDict {
                owner: *id,
                path: Vec::new(),
            })),
            Object::Null => Ok(None),
            _ => Err(ShrinkError::MalformedResources(format!(
                "XObject entry of {:?} is not a dictionary",
                owner
            ))),
        },
        Ok(_) => Err(ShrinkError::MalformedResources(format!(
            "XObject entry of {:?} is not a dictionary",
            owner
        ))),
    }
}

/// XObject dictionary of a page, following /Parent for inherited resources
pub fn page_xobject_dict(doc: &Document, page_id: ObjectId) -> Result<Option<ResourceDict>> {
    let mut node = page_id;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let dict = holder_dict(doc.get_object(node)?, node)?;
        if dict.get(RESOURCES).is_ok() {
            return xobject_dict(doc, node);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => node = *parent,
            _ => return Ok(None),
        }
    }
    Ok(None)
}

/// One image reference site: the dictionary, the name and the image it names
#[derive(Debug, Clone)]
pub struct ImageSite {
    pub dict: ResourceDict,
    pub name: Vec<u8>,
    pub image_id: ObjectId,
}

impl ImageSite {
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).to_string()
    }
}

/// Depth-first walker over XObject dictionaries.
///
/// Dictionaries and form XObjects already walked are skipped, which breaks
/// form cycles and visits resources shared between pages only once.
#[derive(Debug, Default)]
pub struct ResourceWalker {
    seen_dicts: HashSet<ResourceDict>,
    seen_forms: HashSet<ObjectId>,
}

impl ResourceWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct form XObjects entered so far
    pub fn forms_walked(&self) -> usize {
        self.seen_forms.len()
    }

    /// Walk the resources of one page
    pub fn walk_page<F>(&mut self, doc: &mut Document, page_id: ObjectId, visit: &mut F) -> Result<()>
    where
        F: FnMut(&mut Document, &ImageSite) -> Result<()>,
    {
        match page_xobject_dict(doc, page_id)? {
            Some(root) => self.walk(doc, root, visit),
            None => Ok(()),
        }
    }

    /// Walk `root` and every form XObject reachable from it, calling `visit`
    /// once per name whose entry is an image. A location already walked,
    /// inline or indirect, is skipped.
    pub fn walk<F>(&mut self, doc: &mut Document, root: ResourceDict, visit: &mut F) -> Result<()>
    where
        F: FnMut(&mut Document, &ImageSite) -> Result<()>,
    {
        if !self.seen_dicts.insert(root.clone()) {
            return Ok(());
        }

        for name in root.names(doc)? {
            match root.kind(doc, &name)? {
                Some(XObjectKind::Image(image_id)) => {
                    let site = ImageSite {
                        dict: root.clone(),
                        name,
                        image_id,
                    };
                    visit(doc, &site)?;
                }
                Some(XObjectKind::Form(form_id)) => {
                    if !self.seen_forms.insert(form_id) {
                        continue;
                    }
                    if let Some(nested) = xobject_dict(doc, form_id)? {
                        self.walk(doc, nested, visit)?;
                    }
                }
                Some(XObjectKind::Other) | None => {}
            }
        }
        Ok(())
    }
}
