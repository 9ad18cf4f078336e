//! Doxygen xml reading: file loading and text extraction from compound
//! nodes.

use std::path::Path;

use roxmltree::{Document, Node, NodeType};
use tracing::trace;

use crate::diagnostics::{Diagnostics, Stage};
use crate::model::normalize_whitespace;

/// Load and parse the xml file at `path`, then hand its root element to `f`.
///
/// A file that cannot be read or parsed is reported and yields `None`; the
/// caller treats that compound (or api) as absent.
pub fn with_document<R>(
    path: &Path,
    diagnostics: &mut Diagnostics,
    f: impl FnOnce(Node<'_, '_>, &mut Diagnostics) -> R,
) -> Option<R> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            diagnostics.error(
                Stage::Load,
                None,
                format!("unable to read {}: {e}", path.display()),
            );
            return None;
        }
    };
    let document = match Document::parse(&text) {
        Ok(document) => document,
        Err(e) => {
            diagnostics.error(
                Stage::Load,
                None,
                format!("unable to parse {}: {e}", path.display()),
            );
            return None;
        }
    };
    trace!(path = %path.display(), "loaded xml");
    Some(f(document.root_element(), diagnostics))
}

/// Raw text of `node`: text runs concatenated in order, `<ref>` (and any
/// other markup) replaced by the text it wraps, `<sp/>` read as a space.
pub fn raw_text(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    append_text(node, &mut out);
    out
}

fn append_text(node: Node<'_, '_>, out: &mut String) {
    for child in node.children() {
        match child.node_type() {
            NodeType::Text => out.push_str(child.text().unwrap_or_default()),
            NodeType::Element if child.has_tag_name("sp") => out.push(' '),
            NodeType::Element => append_text(child, out),
            _ => {}
        }
    }
}

/// Whitespace-normalized text of `node`.
pub fn text(node: Node<'_, '_>) -> String {
    normalize_whitespace(&raw_text(node))
}

/// First child element named `name`.
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.has_tag_name(name))
}

/// Normalized text of the first child element named `name`, or `None` if
/// there is no such child.
pub fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).map(text)
}

/// Like [`child_text`], but an empty child also counts as missing.
pub fn non_empty_child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child_text(node, name).filter(|t| !t.is_empty())
}

/// Every `<sectiondef>/<memberdef>` of a compound, in document order.
pub fn members<'a, 'input>(compound: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    compound
        .children()
        .filter(|c| c.is_element() && c.has_tag_name("sectiondef"))
        .flat_map(|section| {
            section
                .children()
                .filter(|c| c.is_element() && c.has_tag_name("memberdef"))
        })
        .collect()
}
