//! Style declarations and computed style resolution
//!
//! The pipeline only depends on the [`StyleResolver`] trait. The default
//! [`CascadeResolver`] computes styles from the document itself; hosts with a
//! real layout engine plug in their own.

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, Delimiter, ParseError, Parser, ParserInput,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser,
};
use indexmap::IndexMap;

use crate::dom::{Document, NodeId};
use crate::rendering::layout::{self, Rect};

pub mod cascade;
pub mod sheet;

pub use cascade::CascadeResolver;
pub use sheet::{StyleRule, Stylesheet};

/// Ordered `property: value` declarations, as found in a `style` attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleDeclaration {
    properties: IndexMap<String, Declared>,
}

#[derive(Debug, Clone, PartialEq)]
struct Declared {
    value: String,
    important: bool,
}

impl StyleDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a declaration block body (`fill: red; stroke: none`).
    ///
    /// Malformed entries are skipped. Property names are lower-cased, custom
    /// properties (`--x`) keep their case.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        Self::parse_block(&mut parser)
    }

    /// Parse declarations up to the end of `input`, e.g. inside a rule's `{}`.
    pub(crate) fn parse_block(input: &mut Parser<'_, '_>) -> Self {
        let mut decl = Self::new();
        let mut declarations = DeclarationsParser;
        for item in RuleBodyParser::new(input, &mut declarations) {
            match item {
                Ok((name, value, important)) => decl.declare(name, value, important),
                Err((e, text)) => {
                    log::debug!("Skipping declaration `{}`: {:?}", text.trim(), e.kind)
                }
            }
        }
        decl
    }

    /// Later declarations win unless an earlier one is `!important` and they are not.
    fn declare(&mut self, name: String, value: String, important: bool) {
        if self.is_important(&name) && !important {
            return;
        }
        self.properties.insert(name, Declared { value, important });
    }

    /// Set a property, keeping its position if it is already declared.
    pub fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(
            name.to_string(),
            Declared {
                value: value.to_string(),
                important: false,
            },
        );
    }

    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|d| d.value.as_str())
    }

    pub fn is_important(&self, name: &str) -> bool {
        self.properties.get(name).map_or(false, |d| d.important)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        self.properties.shift_remove(name).map(|d| d.value)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, d)| (k.as_str(), d.value.as_str()))
    }

    pub(crate) fn iter_declared(&self) -> impl Iterator<Item = (&str, &str, bool)> {
        self.properties
            .iter()
            .map(|(k, d)| (k.as_str(), d.value.as_str(), d.important))
    }

    /// Serialize back to `a: b; c: d;` form.
    pub fn to_css_text(&self) -> String {
        let mut out = String::new();
        for (name, d) in &self.properties {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&d.value);
            if d.important {
                out.push_str(" !important");
            }
            out.push(';');
        }
        out
    }
}

/// One `name: value [!important]` entry of a declaration block.
struct DeclarationsParser;

type ParsedDeclaration = (String, String, bool);

impl<'i> DeclarationParser<'i> for DeclarationsParser {
    type Declaration = ParsedDeclaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<ParsedDeclaration, ParseError<'i, ()>> {
        let start = input.position();
        input.parse_until_before(Delimiter::Bang, |input| {
            while input.next().is_ok() {}
            Ok::<_, ParseError<'i, ()>>(())
        })?;
        let value = input.slice_from(start).trim().to_string();
        let important = input.try_parse(cssparser::parse_important).is_ok();
        input.expect_exhausted()?;
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }

        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        };
        Ok((name, value, important))
    }
}

impl<'i> AtRuleParser<'i> for DeclarationsParser {
    type Prelude = ();
    type AtRule = ParsedDeclaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationsParser {
    type Prelude = ();
    type QualifiedRule = ParsedDeclaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, ParsedDeclaration, ()> for DeclarationsParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

/// The fully resolved value of every known property for one element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputedStyle {
    values: IndexMap<String, String>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ComputedStyle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Resolves the visual state of a live, attached node.
///
/// Implementations must only be asked about nodes attached to `doc`; a
/// detached clone has no cascade and no geometry.
pub trait StyleResolver: Send + Sync {
    /// Cascade-resolved value of every property the resolver knows about.
    fn computed_style(&self, doc: &Document, node: NodeId) -> ComputedStyle;

    /// On-screen box of `node` in CSS pixels.
    fn bounding_box(&self, doc: &Document, node: NodeId) -> Rect {
        layout::intrinsic_box(doc, node, None, None)
    }
}

/// A known property: its initial value and whether it inherits.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDef {
    pub name: &'static str,
    pub initial: &'static str,
    pub inherited: bool,
}

const fn prop(name: &'static str, initial: &'static str, inherited: bool) -> PropertyDef {
    PropertyDef {
        name,
        initial,
        inherited,
    }
}

/// The properties reported by [`CascadeResolver`], all of which are also
/// SVG presentation attributes.
pub const PROPERTIES: &[PropertyDef] = &[
    prop("color", "rgb(0, 0, 0)", true),
    prop("display", "inline", false),
    prop("visibility", "visible", true),
    prop("opacity", "1", false),
    prop("fill", "rgb(0, 0, 0)", true),
    prop("fill-opacity", "1", true),
    prop("fill-rule", "nonzero", true),
    prop("stroke", "none", true),
    prop("stroke-width", "1px", true),
    prop("stroke-opacity", "1", true),
    prop("stroke-linecap", "butt", true),
    prop("stroke-linejoin", "miter", true),
    prop("stroke-miterlimit", "4", true),
    prop("stroke-dasharray", "none", true),
    prop("stroke-dashoffset", "0px", true),
    prop("clip-rule", "nonzero", true),
    prop("clip-path", "none", false),
    prop("mask", "none", false),
    prop("filter", "none", false),
    prop("stop-color", "rgb(0, 0, 0)", false),
    prop("stop-opacity", "1", false),
    prop("flood-color", "rgb(0, 0, 0)", false),
    prop("flood-opacity", "1", false),
    prop("font-family", "serif", true),
    prop("font-size", "16px", true),
    prop("font-style", "normal", true),
    prop("font-weight", "400", true),
    prop("text-anchor", "start", true),
    prop("dominant-baseline", "auto", true),
    prop("letter-spacing", "normal", true),
    prop("word-spacing", "0px", true),
    prop("shape-rendering", "auto", true),
    prop("image-rendering", "auto", true),
    prop("paint-order", "normal", true),
    prop("mix-blend-mode", "normal", false),
    prop("isolation", "auto", false),
];

pub fn property(name: &str) -> Option<&'static PropertyDef> {
    PROPERTIES.iter().find(|p| p.name == name)
}
