//! Document-level structures: outline, XMP packet and form fields.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde_json::{json, Value};

use super::objects::{decode_text_simple, get, get_dict, get_name, get_text, number, text};

/// Deepest nesting followed in outline and field trees.
const MAX_TREE_DEPTH: usize = 64;

/// Outline entries as `[{title, level, page, children}]`, `None` when the
/// document has no outline or it is empty.
pub(super) fn table_of_contents(doc: &Document) -> Option<Value> {
    let catalog = doc.catalog().ok()?;
    let outlines = get_dict(doc, catalog, b"Outlines")?;
    let first = outlines.get(b"First").ok()?.as_reference().ok()?;

    let pages: HashMap<ObjectId, u32> = doc.get_pages().into_iter().map(|(n, id)| (id, n)).collect();
    let mut visited = HashSet::new();
    let entries = outline_level(doc, catalog, &pages, first, 0, &mut visited);
    (!entries.is_empty()).then(|| Value::Array(entries))
}

/// Walk one sibling chain starting at `first`.
fn outline_level(
    doc: &Document,
    catalog: &Dictionary,
    pages: &HashMap<ObjectId, u32>,
    first: ObjectId,
    level: usize,
    visited: &mut HashSet<ObjectId>,
) -> Vec<Value> {
    let mut entries = Vec::new();
    if level >= MAX_TREE_DEPTH {
        return entries;
    }

    let mut next = Some(first);
    while let Some(id) = next {
        if !visited.insert(id) {
            log::debug!("outline item {:?} visited twice, chain cut", id);
            break;
        }
        let Ok(item) = doc.get_dictionary(id) else {
            break;
        };

        let title = get_text(doc, item, b"Title").unwrap_or_default();
        let page = destination_page(doc, catalog, pages, item);
        let children = item
            .get(b"First")
            .ok()
            .and_then(|f| f.as_reference().ok())
            .map(|child| outline_level(doc, catalog, pages, child, level + 1, visited))
            .unwrap_or_default();

        entries.push(json!({
            "title": title,
            "level": level,
            "page": page,
            "children": children,
        }));

        next = item.get(b"Next").ok().and_then(|n| n.as_reference().ok());
    }
    entries
}

/// 1-based page of an outline item, from `/Dest` or a GoTo action's `/D`.
fn destination_page(
    doc: &Document,
    catalog: &Dictionary,
    pages: &HashMap<ObjectId, u32>,
    item: &Dictionary,
) -> Option<u32> {
    let dest = match get(doc, item, b"Dest") {
        Some(dest) => dest,
        None => {
            let action = get_dict(doc, item, b"A")?;
            get(doc, action, b"D")?
        }
    };
    resolve_destination(doc, catalog, pages, dest, 0)
}

fn resolve_destination(
    doc: &Document,
    catalog: &Dictionary,
    pages: &HashMap<ObjectId, u32>,
    dest: &Object,
    depth: usize,
) -> Option<u32> {
    if depth > 2 {
        return None;
    }
    match dest {
        Object::Array(arr) => match arr.first()? {
            Object::Reference(id) => pages.get(id).copied(),
            // remote-style destinations carry a 0-based page index
            Object::Integer(i) => u32::try_from(*i).ok().map(|i| i + 1),
            _ => None,
        },
        Object::Dictionary(d) => {
            let inner = get(doc, d, b"D")?;
            resolve_destination(doc, catalog, pages, inner, depth + 1)
        }
        Object::Name(name) | Object::String(name, _) => {
            let target = named_destination(doc, catalog, name)?;
            resolve_destination(doc, catalog, pages, target, depth + 1)
        }
        Object::Reference(_) => {
            let resolved = super::objects::resolve(doc, dest);
            resolve_destination(doc, catalog, pages, resolved, depth + 1)
        }
        _ => None,
    }
}

/// Look a named destination up in `/Dests` or the `/Names /Dests` tree.
fn named_destination<'a>(doc: &'a Document, catalog: &'a Dictionary, name: &[u8]) -> Option<&'a Object> {
    if let Some(dests) = get_dict(doc, catalog, b"Dests") {
        if let Some(found) = get(doc, dests, name) {
            return Some(found);
        }
    }
    let tree = get_dict(doc, catalog, b"Names").and_then(|n| get_dict(doc, n, b"Dests"))?;
    name_tree_lookup(doc, tree, name, 0)
}

fn name_tree_lookup<'a>(
    doc: &'a Document,
    node: &'a Dictionary,
    name: &[u8],
    depth: usize,
) -> Option<&'a Object> {
    if depth > MAX_TREE_DEPTH {
        return None;
    }
    if let Some(Object::Array(pairs)) = get(doc, node, b"Names") {
        for pair in pairs.chunks(2) {
            if let [Object::String(key, _), value] = pair {
                if key.as_slice() == name {
                    return Some(super::objects::resolve(doc, value));
                }
            }
        }
    }
    if let Some(Object::Array(kids)) = get(doc, node, b"Kids") {
        for kid in kids {
            if let Object::Dictionary(kid) = super::objects::resolve(doc, kid) {
                if let Some(found) = name_tree_lookup(doc, kid, name, depth + 1) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// XMP packet of the catalog `/Metadata` stream.
pub(super) fn meta_xml(doc: &Document) -> Option<String> {
    let catalog = doc.catalog().ok()?;
    match get(doc, catalog, b"Metadata")? {
        Object::Stream(stream) => {
            let bytes = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => None,
    }
}

/// `{form, language, meta_xml, table_of_contents}`.
pub(super) fn annotations(doc: &Document) -> Value {
    let catalog = doc.catalog().ok();
    let form = catalog
        .and_then(|c| get_dict(doc, c, b"AcroForm"))
        .and_then(|acro| match get(doc, acro, b"Fields") {
            Some(Object::Array(fields)) => {
                let mut visited = HashSet::new();
                Some(Value::Array(form_fields(doc, fields, 0, &mut visited)))
            }
            _ => None,
        });
    let language = catalog.and_then(|c| get_text(doc, c, b"Lang"));

    json!({
        "form": form,
        "language": language,
        "meta_xml": meta_xml(doc),
        "table_of_contents": table_of_contents(doc),
    })
}

/// Form fields as `{name, type, value, kids}` trees.
fn form_fields(
    doc: &Document,
    fields: &[Object],
    depth: usize,
    visited: &mut HashSet<ObjectId>,
) -> Vec<Value> {
    if depth >= MAX_TREE_DEPTH {
        return Vec::new();
    }
    let mut out = Vec::new();
    for field in fields {
        if let Object::Reference(id) = field {
            if !visited.insert(*id) {
                continue;
            }
        }
        let Object::Dictionary(dict) = super::objects::resolve(doc, field) else {
            continue;
        };
        let kids = match get(doc, dict, b"Kids") {
            Some(Object::Array(kids)) => form_fields(doc, kids, depth + 1, visited),
            _ => Vec::new(),
        };
        out.push(json!({
            "name": get_text(doc, dict, b"T"),
            "type": get_name(doc, dict, b"FT"),
            "value": get(doc, dict, b"V").map(field_value).unwrap_or(Value::Null),
            "kids": kids,
        }));
    }
    out
}

fn field_value(obj: &Object) -> Value {
    match obj {
        Object::String(bytes, _) => Value::from(decode_text_simple(bytes)),
        Object::Name(_) => text(obj).map(Value::from).unwrap_or(Value::Null),
        Object::Boolean(b) => Value::from(*b),
        Object::Array(items) => Value::Array(items.iter().map(field_value).collect()),
        other => number(other).map(Value::from).unwrap_or(Value::Null),
    }
}
