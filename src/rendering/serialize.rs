/// Serialize a styled clone to a `data:image/svg+xml;base64,` payload

use std::fmt::Write as _;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::dom::parse::{SVG_NS, XLINK_NS};
use crate::dom::{Document, NodeData, NodeId};
use crate::rendering::StyledClone;

pub const SVG_DATA_PREFIX: &str = "data:image/svg+xml;base64,";

/// Base64 data URL of a serialized SVG document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPayload {
    url: String,
}

impl RasterPayload {
    pub fn from_markup(markup: &str) -> Self {
        Self {
            url: format!("{}{}", SVG_DATA_PREFIX, STANDARD.encode(markup.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The UTF-8 markup bytes carried by the URL.
    pub fn decode(&self) -> crate::Result<Vec<u8>> {
        let data = self.url.strip_prefix(SVG_DATA_PREFIX).ok_or_else(|| {
            crate::Error::DecodeError("Payload is not an SVG data URL".to_string())
        })?;
        STANDARD
            .decode(data)
            .map_err(|e| crate::Error::DecodeError(format!("Invalid base64 payload: {}", e)))
    }
}

/// Standalone XML text of the clone root, with namespace declarations added.
pub fn serialize_xml(clone: &StyledClone) -> String {
    let doc = clone.document();
    let needs_xlink = std::iter::once(clone.root())
        .chain(doc.descendants(clone.root()))
        .filter_map(|n| doc.element(n))
        .any(|e| e.attributes.keys().any(|k| k.starts_with("xlink:")));

    let mut out = String::new();
    write_node(doc, clone.root(), true, needs_xlink, &mut out);
    out
}

/// Serialize and base64-encode the clone.
pub fn serialize(clone: &StyledClone) -> RasterPayload {
    let xml = serialize_xml(clone);
    log::debug!("Serialized vector root ({} bytes of markup)", xml.len());
    RasterPayload::from_markup(&xml)
}

fn write_node(doc: &Document, node: NodeId, is_root: bool, xlink: bool, out: &mut String) {
    match doc.data(node) {
        Some(NodeData::Text(text)) => escape_into(text, false, out),
        Some(NodeData::Element(element)) => {
            out.push('<');
            out.push_str(&element.tag);
            if is_root {
                let _ = write!(out, " xmlns=\"{}\"", SVG_NS);
                if xlink {
                    let _ = write!(out, " xmlns:xlink=\"{}\"", XLINK_NS);
                }
            }
            for (name, value) in &element.attributes {
                if name == "xmlns" || name.starts_with("xmlns:") {
                    continue;
                }
                let _ = write!(out, " {}=\"", name);
                escape_into(value, true, out);
                out.push('"');
            }
            if !element.style.is_empty() {
                out.push_str(" style=\"");
                escape_into(&element.style.to_css_text(), true, out);
                out.push('"');
            }

            let children = doc.children(node);
            if children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for &child in children {
                write_node(doc, child, false, xlink, out);
            }
            let _ = write!(out, "</{}>", element.tag);
        }
        Some(NodeData::Document) | None => {}
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
