//! Capture and rasterization stages
//!
//! Each stage is a plain function or small type so it can be exercised on its
//! own; [`crate::pipeline`] sequences them.

pub mod encode;
pub mod inline;
pub mod layout;
pub mod raster;
pub mod sanitize;
pub mod serialize;

pub use encode::{ImageEncoder, SurfaceEncoder};
pub use inline::inline_styles;
pub use layout::Rect;
pub use raster::{PixelSurface, Rasterizer};
pub use sanitize::{sanitize, Exclusions};
pub use serialize::{serialize, RasterPayload};

use slotmap::SecondaryMap;

use crate::dom::{Document, NodeData, NodeId};
use crate::{Error, Result};

/// A detached copy of a live subtree.
///
/// Every clone node remembers the live node it was copied from, which lets
/// the sanitizer report what it removed in terms of the live tree.
#[derive(Debug, Clone)]
pub struct StyledClone {
    document: Document,
    root: NodeId,
    origins: SecondaryMap<NodeId, NodeId>,
}

impl StyledClone {
    /// Deep-copy `node` (elements, attributes, inline styles and text) out of `live`.
    pub fn capture(live: &Document, node: NodeId) -> Result<Self> {
        let data = live
            .data(node)
            .cloned()
            .ok_or_else(|| Error::Other("Cannot clone a node that is not in the document".into()))?;

        let mut document = Document::empty();
        let mut origins = SecondaryMap::new();
        let root = document.create_node(data);
        origins.insert(root, node);
        document.append_child(document.root(), root)?;

        let mut stack = vec![(node, root)];
        while let Some((source, target)) = stack.pop() {
            for &child in live.children(source) {
                let Some(data) = live.data(child) else { continue };
                if matches!(data, NodeData::Document) {
                    continue;
                }
                let copy = document.create_node(data.clone());
                origins.insert(copy, child);
                document.append_child(target, copy)?;
                stack.push((child, copy));
            }
        }

        Ok(Self {
            document,
            root,
            origins,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// The live node `node` was copied from.
    pub fn origin(&self, node: NodeId) -> Option<NodeId> {
        self.origins.get(node).copied()
    }

    /// Write `bbox` onto the root as its `width`/`height` attributes.
    ///
    /// The decoder only sees attributes, so a size that came from CSS would
    /// otherwise be lost and the drawing would not fill its surface.
    pub fn pin_size(&mut self, bbox: Rect) {
        let root = self.root;
        if let Some(element) = self.document.element_mut(root) {
            element.set_attr("width", &bbox.width.to_string());
            element.set_attr("height", &bbox.height.to_string());
            element.style.remove_property("width");
            element.style.remove_property("height");
        }
    }
}
