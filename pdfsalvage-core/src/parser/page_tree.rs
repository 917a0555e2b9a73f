//! PDF Page Tree Parser
//!
//! Flattens the page tree (ISO 32000-1 Section 7.7.3) into the ordered list of
//! its leaf pages. The walk is depth-first and pre-order over an explicit
//! stack, so the leaves come out in document order however deep the tree is.
//!
//! A broken tree never aborts a load. An unexpected node type is reported and
//! skipped; a tree that cannot be walked at all yields no pages and an error
//! in the diagnostics.

use super::objects::{ObjectId, PdfDictionary, PdfObject};
use super::reader::PdfReader;
use super::ParseResult;
use std::collections::HashSet;

/// One leaf of the page tree.
///
/// # Fields
///
/// * `id` - Identity of the page object, `None` for a page written inline in `/Kids`
/// * `dict` - Complete page dictionary
/// * `media_box` - Page dimensions, inherited from an ancestor when the page has none
/// * `rotation` - Page rotation in degrees, inherited like `media_box`
/// * `resources` - `/Resources` of the page or its nearest ancestor that has one
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub id: Option<ObjectId>,
    pub dict: PdfDictionary,
    pub media_box: Option<[f64; 4]>,
    pub rotation: i64,
    pub resources: Option<PdfObject>,
}

impl ParsedPage {
    /// Width from the media box, 0 if there is none
    pub fn width(&self) -> f64 {
        self.media_box.map_or(0.0, |[llx, _, urx, _]| urx - llx)
    }

    /// Height from the media box, 0 if there is none
    pub fn height(&self) -> f64 {
        self.media_box.map_or(0.0, |[_, lly, _, ury]| ury - lly)
    }
}

/// Attributes a page takes from its ancestors (Table 30 of ISO 32000-1)
#[derive(Debug, Clone, Default)]
struct Inherited {
    media_box: Option<[f64; 4]>,
    rotation: Option<i64>,
    resources: Option<PdfObject>,
}

impl Inherited {
    fn update(&self, reader: &mut PdfReader, dict: &PdfDictionary) -> ParseResult<Self> {
        let mut next = self.clone();
        if let Some(media_box) = dict.get("MediaBox") {
            if let Some(rect) = rectangle(reader, media_box)? {
                next.media_box = Some(rect);
            }
        }
        if let Some(rotate) = dict.get("Rotate") {
            if let Some(rotate) = reader.resolve_object(rotate)?.as_integer() {
                next.rotation = Some(rotate);
            }
        }
        if let Some(resources) = dict.get("Resources") {
            next.resources = Some(resources.clone());
        }
        Ok(next)
    }
}

fn rectangle(reader: &mut PdfReader, obj: &PdfObject) -> ParseResult<Option<[f64; 4]>> {
    let array = match reader.resolve_object(obj)?.as_array() {
        Some(array) if array.len() == 4 => array.clone(),
        _ => return Ok(None),
    };
    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(array.iter()) {
        match reader.resolve_object(value)?.as_real() {
            Some(number) => *slot = number,
            None => return Ok(None),
        }
    }
    Ok(Some(rect))
}

/// Flatten the tree rooted at `root`, which may be the catalog, a `/Pages`
/// node or a single page.
///
/// Only failures to read an object are returned as errors.
pub fn flatten(reader: &mut PdfReader, root: &PdfObject) -> ParseResult<Vec<ParsedPage>> {
    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root.clone(), Inherited::default())];

    while let Some((node, inherited)) = stack.pop() {
        let id = node.as_reference();
        if let Some(id) = id {
            if !visited.insert(id) {
                reader.diagnostics_mut().error(
                    None,
                    format!("Page tree node {id} reached more than once, skipping it"),
                );
                continue;
            }
        }

        let dict = match reader.resolve_object(&node)?.as_dict() {
            Some(dict) => dict.clone(),
            None => return Ok(invalid_tree(reader, id, "node is not a dictionary")),
        };

        let kind = dict.get_type().map(str::to_owned);
        match kind.as_deref() {
            Some("Page") => {
                let attributes = inherited.update(reader, &dict)?;
                pages.push(ParsedPage {
                    id,
                    dict,
                    media_box: attributes.media_box,
                    rotation: attributes.rotation.unwrap_or(0),
                    resources: attributes.resources,
                });
            }
            Some("Pages") => {
                let kids = match dict.get("Kids") {
                    Some(kids) => reader.resolve_object(kids)?.as_array().cloned(),
                    None => None,
                };
                let Some(kids) = kids else {
                    return Ok(invalid_tree(reader, id, "/Kids is not an array"));
                };
                let attributes = inherited.update(reader, &dict)?;
                for kid in kids.iter().rev() {
                    stack.push((kid.clone(), attributes.clone()));
                }
            }
            Some("Catalog") => match dict.get("Pages") {
                Some(pages_root) => stack.push((pages_root.clone(), inherited)),
                None => return Ok(invalid_tree(reader, id, "catalog has no /Pages")),
            },
            other => {
                let found = other.map_or_else(|| "no /Type".to_string(), |t| format!("/{t}"));
                let node = id.map_or_else(|| "inline node".to_string(), |id| format!("object {id}"));
                reader.diagnostics_mut().error(
                    None,
                    format!("Expected /Page or /Pages dictionary, got {found} in {node}"),
                );
            }
        }
    }

    Ok(pages)
}

fn invalid_tree(reader: &mut PdfReader, id: Option<ObjectId>, problem: &str) -> Vec<ParsedPage> {
    let message = match id {
        Some(id) => format!("Invalid page tree: {problem} (object {id})"),
        None => format!("Invalid page tree: {problem}"),
    };
    reader.diagnostics_mut().error(None, message);
    Vec::new()
}
