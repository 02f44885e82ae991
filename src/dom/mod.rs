//! Arena-backed document tree
//!
//! Nodes live in a generational slot map, so a [`NodeId`] that belonged to a
//! removed subtree stops resolving instead of aliasing a newer node. Both the
//! live host document and the detached clones captured from it use this type.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};

use crate::style::{StyleDeclaration, Stylesheet};
use crate::{Error, Result};

pub mod parse;
pub mod selector;

pub use selector::{SelectorList, Specificity};

new_key_type! {
    /// Handle to a node in a [`Document`]
    pub struct NodeId;
}

/// A document shared between the pipeline and the renderer it drives
pub type SharedDocument = Arc<Mutex<Document>>;

/// Lock a shared document, surfacing poisoning as an error.
pub fn lock(document: &SharedDocument) -> Result<MutexGuard<'_, Document>> {
    document
        .lock()
        .map_err(|_| Error::Other("Document lock poisoned".into()))
}

/// An element: tag, ordered attributes and its inline style declaration.
///
/// The `style` attribute is never stored in `attributes`; it is parsed into
/// `style` on import and written back on serialization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub style: StyleDeclaration,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Set an attribute; `style` is routed into the inline declaration.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if name == "style" {
            self.style = StyleDeclaration::parse(value);
        } else {
            self.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// A mutable node tree with host stylesheets
#[derive(Debug, Clone)]
pub struct Document {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    stylesheets: Vec<Stylesheet>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `html > head + body` document.
    pub fn new() -> Self {
        let mut doc = Self::empty();
        let root = doc.root;
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.attach(root, html);
        doc.attach(html, head);
        doc.attach(html, body);
        doc
    }

    /// A document holding only the document node, used for detached fragments.
    pub fn empty() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Document,
        });
        Self {
            nodes,
            root,
            stylesheets: Vec::new(),
        }
    }

    /// Convenience for hosts that share one document across runs.
    pub fn shared() -> SharedDocument {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    /// The document node (not an element).
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&id| self.element(id).map_or(false, |e| e.tag == "body"))
    }

    /// Add a host stylesheet; its rules apply to every element of the document.
    pub fn add_stylesheet(&mut self, css: &str) {
        self.stylesheets.push(Stylesheet::parse(css));
    }

    /// Host stylesheets followed by the contents of every attached `<style>` element.
    pub fn stylesheets(&self) -> Vec<Stylesheet> {
        let mut sheets = self.stylesheets.clone();
        for id in self.descendants(self.root) {
            if self.element(id).map_or(false, |e| e.tag == "style") {
                sheets.push(Stylesheet::parse(&self.text_content(id)));
            }
        }
        sheets
    }

    // --- Node creation and mutation ---

    /// Create a detached node.
    pub fn create_node(&mut self, data: NodeData) -> NodeId {
        self.nodes.insert(Node {
            parent: None,
            children: Vec::new(),
            data,
        })
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_node(NodeData::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create_node(NodeData::Text(text.to_string()))
    }

    /// Append a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return Err(Error::Other("append_child on a node that is not in the document".into()));
        }
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return Err(Error::Other("append_child would create a cycle".into()));
        }
        self.detach(child);
        self.attach(parent, child);
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let parent = match self.nodes.get_mut(id).and_then(|n| n.parent.take()) {
            Some(parent) => parent,
            None => return,
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != id);
        }
    }

    /// Detach `id` from its parent and free its whole subtree.
    ///
    /// Returns `false` when `id` no longer exists (already removed, possibly as
    /// part of an ancestor), in which case nothing happens.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.nodes.contains_key(id) {
            return false;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
        true
    }

    // --- Accessors ---

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id).map(|n| &n.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id) {
            Some(NodeData::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// The parent if it is an element (the document node is not).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings[..pos].iter().rev().copied().find(|&c| self.is_element(c))
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings[pos + 1..].iter().copied().find(|&c| self.is_element(c))
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Whether `id` is connected to this document's root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    /// Pre-order traversal of every node below `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeData::Text(t)) = self.data(id) {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            if let Some(NodeData::Text(t)) = self.data(d) {
                out.push_str(t);
            }
        }
        out
    }

    // --- Queries ---

    /// Every element below `scope` matching `selectors`, in document order.
    pub fn select(&self, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|&id| self.is_element(id) && selectors.matches(self, id))
            .collect()
    }

    pub fn query_selector_all(&self, scope: NodeId, selectors: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selectors)?;
        Ok(self.select(scope, &list))
    }

    pub fn query_selector(&self, scope: NodeId, selectors: &str) -> Result<Option<NodeId>> {
        let list = SelectorList::parse(selectors)?;
        Ok(self
            .descendants(scope)
            .find(|&id| self.is_element(id) && list.matches(self, id)))
    }

    /// First element below `scope` whose attribute `name` equals `value`.
    pub fn find_by_attribute(&self, scope: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(scope)
            .find(|&id| self.element(id).and_then(|e| e.attr(name)) == Some(value))
    }
}

/// Iterator returned by [`Document::descendants`]
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_body() {
        let doc = Document::new();
        let body = doc.body().expect("body");
        assert_eq!(doc.element(body).unwrap().tag, "body");
        assert!(doc.is_attached(body));
    }

    #[test]
    fn remove_frees_the_whole_subtree() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let g = doc.create_element("g");
        let rect = doc.create_element("rect");
        doc.append_child(body, g).unwrap();
        doc.append_child(g, rect).unwrap();

        assert!(doc.remove(g));
        assert!(!doc.contains(g));
        assert!(!doc.contains(rect));
        assert!(doc.children(body).is_empty());
        // removing a node whose ancestor is already gone is a no-op
        assert!(!doc.remove(rect));
    }

    #[test]
    fn removed_ids_do_not_alias_new_nodes() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let a = doc.create_element("a");
        doc.append_child(body, a).unwrap();
        doc.remove(a);
        let b = doc.create_element("b");
        assert_ne!(a, b);
        assert!(doc.element(a).is_none());
    }

    #[test]
    fn append_child_rejects_cycles() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let g = doc.create_element("g");
        doc.append_child(body, g).unwrap();
        assert!(doc.append_child(g, body).is_err());
    }

    #[test]
    fn descendants_are_pre_order() {
        let mut doc = Document::empty();
        let root = doc.root();
        let svg = doc.create_element("svg");
        let g = doc.create_element("g");
        let c = doc.create_element("circle");
        let r = doc.create_element("rect");
        doc.append_child(root, svg).unwrap();
        doc.append_child(svg, g).unwrap();
        doc.append_child(g, c).unwrap();
        doc.append_child(svg, r).unwrap();
        let order: Vec<_> = doc.descendants(root).collect();
        assert_eq!(order, vec![svg, g, c, r]);
    }

    #[test]
    fn style_attribute_is_parsed_into_declaration() {
        let mut el = Element::new("rect");
        el.set_attr("style", "fill: red; stroke: blue");
        el.set_attr("class", "a  b");
        assert!(el.attr("style").is_none());
        assert_eq!(el.style.get_property("fill"), Some("red"));
        assert!(el.has_class("b"));
    }

    #[test]
    fn find_by_attribute_and_query() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let div = doc.create_element("div");
        doc.element_mut(div).unwrap().set_attr("data-run", "42");
        doc.append_child(body, div).unwrap();
        assert_eq!(doc.find_by_attribute(doc.root(), "data-run", "42"), Some(div));
        assert_eq!(doc.query_selector(doc.root(), "[data-run]").unwrap(), Some(div));
        assert!(doc.query_selector(doc.root(), "[data-run=\"7\"]").unwrap().is_none());
    }
}
