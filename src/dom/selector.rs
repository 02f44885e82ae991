//! CSS selectors over the arena document
//!
//! Parsing and matching are done by the `selectors` crate; this module maps
//! the arena onto its `Element` trait. Elements are matched case-sensitively
//! (`linearGradient` is not `lineargradient`) and namespaces are not tracked,
//! so a namespace constraint only distinguishes `xlink:` and `xml:` attributes.

use std::borrow::Cow;
use std::fmt;

use cssparser::{ParseError, Parser, ParserInput, ToCss};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    matches_selector, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext,
    MatchingMode, NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, SelectorParseErrorKind};
use selectors::{NthIndexCache, OpaqueElement};

use super::parse::{XLINK_NS, XML_NS};
use super::{Document, Element, NodeData, NodeId};
use crate::{Error, Result};

/// `(ids, classes/attributes/pseudo-classes, types)`
pub type Specificity = (u32, u32, u32);

const SPECIFICITY_BITS: u32 = 10;
const SPECIFICITY_MASK: u32 = (1 << SPECIFICITY_BITS) - 1;

/// A parsed, comma separated selector list that remembers its source text.
#[derive(Clone)]
pub struct SelectorList {
    source: String,
    list: selectors::SelectorList<SvgSelectors>,
}

impl SelectorList {
    /// Parse `source`; anything unsupported is a configuration error.
    pub fn parse(source: &str) -> Result<Self> {
        let mut input = ParserInput::new(source);
        let mut parser = Parser::new(&mut input);
        parser
            .parse_entirely(Self::parse_from)
            .map_err(|e| Error::ConfigError(format!("Invalid selector `{}`: {:?}", source, e.kind)))
    }

    /// Parse a selector list from the front of `input`, as in a rule prelude.
    pub(crate) fn parse_from<'i, 't>(
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self, ParseError<'i, SelectorParseErrorKind<'i>>> {
        let start = input.position();
        let list = selectors::SelectorList::parse(&SelectorParser, input, ParseRelative::No)?;
        Ok(Self {
            source: input.slice_from(start).trim().to_string(),
            list,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = ElementRef::new(doc, node) else {
            return false;
        };
        let mut cache = NthIndexCache::default();
        let mut context = matching_context(&mut cache);
        self.list
            .0
            .iter()
            .any(|s| matches_selector(s, 0, None, &element, &mut context))
    }

    /// Highest specificity among the selectors of the list matching `node`.
    pub fn match_specificity(&self, doc: &Document, node: NodeId) -> Option<Specificity> {
        let element = ElementRef::new(doc, node)?;
        let mut cache = NthIndexCache::default();
        let mut context = matching_context(&mut cache);
        self.list
            .0
            .iter()
            .filter(|s| matches_selector(s, 0, None, &element, &mut context))
            .map(|s| unpack_specificity(s.specificity()))
            .max()
    }
}

impl fmt::Debug for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SelectorList").field(&self.source).finish()
    }
}

impl PartialEq for SelectorList {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

fn matching_context(cache: &mut NthIndexCache) -> MatchingContext<'_, SvgSelectors> {
    MatchingContext::new(
        MatchingMode::Normal,
        None,
        cache,
        QuirksMode::NoQuirks,
        NeedsSelectorFlags::No,
        IgnoreNthChildForInvalidation::No,
    )
}

fn unpack_specificity(packed: u32) -> Specificity {
    (
        (packed >> (2 * SPECIFICITY_BITS)) & SPECIFICITY_MASK,
        (packed >> SPECIFICITY_BITS) & SPECIFICITY_MASK,
        packed & SPECIFICITY_MASK,
    )
}

// --- selectors glue ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgSelectors;

struct SelectorParser;

impl<'i> selectors::parser::Parser<'i> for SelectorParser {
    type Impl = SvgSelectors;
    type Error = SelectorParseErrorKind<'i>;
}

impl selectors::SelectorImpl for SvgSelectors {
    type AttrValue = CssString;
    type Identifier = CssName;
    type LocalName = CssName;
    type NamespacePrefix = CssName;
    type NamespaceUrl = CssNamespace;
    type BorrowedNamespaceUrl = CssNamespace;
    type BorrowedLocalName = CssName;

    type NonTSPseudoClass = PseudoClass;
    type PseudoElement = PseudoElement;

    type ExtraMatchingData<'a> = ();
}

/// FNV-1a, folded to the 32 bits the bloom filter hashes use.
fn hash_str(s: &str) -> u32 {
    s.bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193))
}

/// Identifiers, local names and prefixes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssName(String);

impl<'a> From<&'a str> for CssName {
    fn from(value: &'a str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for CssName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssName {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        cssparser::serialize_identifier(&self.0, dest)
    }
}

impl PrecomputedHash for CssName {
    fn precomputed_hash(&self) -> u32 {
        hash_str(&self.0)
    }
}

/// Attribute selector values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssString(String);

impl<'a> From<&'a str> for CssString {
    fn from(value: &'a str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        cssparser::serialize_string(&self.0, dest)
    }
}

impl PrecomputedHash for CssString {
    fn precomputed_hash(&self) -> u32 {
        hash_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssNamespace(String);

impl<'a> From<&'a str> for CssNamespace {
    fn from(value: &'a str) -> Self {
        Self(value.to_owned())
    }
}

impl ToCss for CssNamespace {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        dest.write_str(&self.0)
    }
}

impl PrecomputedHash for CssNamespace {
    fn precomputed_hash(&self) -> u32 {
        hash_str(&self.0)
    }
}

/// No non-tree-structural pseudo-classes are supported; `:hover` and friends
/// fail to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {}

impl selectors::parser::NonTSPseudoClass for PseudoClass {
    type Impl = SvgSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl ToCss for PseudoClass {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoElement {}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = SvgSelectors;
}

impl ToCss for PseudoElement {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match *self {}
    }
}

/// An element node of a [`Document`] as seen by the matcher.
#[derive(Clone, Copy)]
struct ElementRef<'a> {
    doc: &'a Document,
    id: NodeId,
    element: &'a Element,
}

impl<'a> ElementRef<'a> {
    fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.element(id).map(|element| Self { doc, id, element })
    }

    /// Attribute value by stored name; `style` is rebuilt from the declaration.
    fn attribute(&self, name: &str) -> Option<Cow<'a, str>> {
        if name == "style" {
            return (!self.element.style.is_empty())
                .then(|| Cow::Owned(self.element.style.to_css_text()));
        }
        self.element.attr(name).map(Cow::Borrowed)
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("tag", &self.element.tag)
            .finish()
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = SvgSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.element)
    }

    fn parent_element(&self) -> Option<Self> {
        let parent = self.doc.parent_element(self.id)?;
        Self::new(self.doc, parent)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let sibling = self.doc.previous_element_sibling(self.id)?;
        Self::new(self.doc, sibling)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let sibling = self.doc.next_element_sibling(self.id)?;
        Self::new(self.doc, sibling)
    }

    fn first_element_child(&self) -> Option<Self> {
        let child = self
            .doc
            .children(self.id)
            .iter()
            .copied()
            .find(|&c| self.doc.is_element(c))?;
        Self::new(self.doc, child)
    }

    fn is_html_element_in_html_document(&self) -> bool {
        false
    }

    fn has_local_name(&self, local_name: &CssName) -> bool {
        self.element.tag == local_name.0
    }

    fn has_namespace(&self, _ns: &CssNamespace) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.element.tag == other.element.tag
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssNamespace>,
        local_name: &CssName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        let name = match ns {
            NamespaceConstraint::Any => {
                if self
                    .attribute(&local_name.0)
                    .is_some_and(|value| operation.eval_str(&value))
                {
                    return true;
                }
                let suffix = format!(":{}", local_name.0);
                return self
                    .element
                    .attributes
                    .iter()
                    .any(|(k, v)| k.ends_with(&suffix) && operation.eval_str(v));
            }
            NamespaceConstraint::Specific(ns) => match ns.0.as_str() {
                "" => Cow::Borrowed(local_name.0.as_str()),
                XLINK_NS => Cow::Owned(format!("xlink:{}", local_name.0)),
                XML_NS => Cow::Owned(format!("xml:{}", local_name.0)),
                _ => return false,
            },
        };
        self.attribute(&name)
            .is_some_and(|value| operation.eval_str(&value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &PseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        false
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.element
            .id()
            .is_some_and(|own| case_sensitivity.eq(id.0.as_bytes(), own.as_bytes()))
    }

    fn has_class(&self, name: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.element
            .classes()
            .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
    }

    fn imported_part(&self, _name: &CssName) -> Option<CssName> {
        None
    }

    fn is_part(&self, _name: &CssName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).iter().all(|&c| match self.doc.data(c) {
            Some(NodeData::Element(_)) => false,
            Some(NodeData::Text(text)) => text.is_empty(),
            _ => true,
        })
    }

    fn is_root(&self) -> bool {
        self.doc.parent_element(self.id).is_none()
    }
}
