//! Import SVG/XML markup into a [`Document`]

use super::{Document, Element, NodeData, NodeId};
use crate::{Error, Result};

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Parse `markup` and append its root element under `parent`.
///
/// Namespaced attributes keep their conventional prefix (`xlink:href`,
/// `xml:space`); namespace declarations themselves are dropped and written
/// back by the serializer.
pub fn parse_markup(doc: &mut Document, parent: NodeId, markup: &str) -> Result<NodeId> {
    let xml = roxmltree::Document::parse(markup)
        .map_err(|e| Error::RenderError(format!("Invalid markup: {}", e)))?;
    let root = xml.root_element();
    let id = import_element(doc, root);
    doc.append_child(parent, id)?;
    Ok(id)
}

fn import_element(doc: &mut Document, node: roxmltree::Node<'_, '_>) -> NodeId {
    let mut element = Element::new(node.tag_name().name());
    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(XLINK_NS) => format!("xlink:{}", attr.name()),
            Some(XML_NS) => format!("xml:{}", attr.name()),
            _ => attr.name().to_string(),
        };
        element.set_attr(&name, attr.value());
    }
    let id = doc.create_node(NodeData::Element(element));

    for child in node.children() {
        let child_id = if child.is_element() {
            import_element(doc, child)
        } else if let Some(text) = child.text().filter(|_| child.is_text()) {
            doc.create_text(text)
        } else {
            continue;
        };
        // both ids were just created in `doc`, so this cannot fail
        let _ = doc.append_child(id, child_id);
    }
    id
}
