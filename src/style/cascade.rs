//! Default style resolver: a small CSS cascade over the arena document

use std::collections::HashMap;

use crate::dom::{Document, NodeId, Specificity};
use crate::rendering::layout::{self, Rect};
use crate::style::{ComputedStyle, Stylesheet, StyleResolver, PROPERTIES};

/// Where a declaration came from, lowest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    PresentationAttribute,
    Stylesheet,
    Inline,
}

/// Cascade priority; the greatest key wins.
type Priority = (bool, Origin, Specificity, usize);

/// Computes styles from presentation attributes, host stylesheets, `<style>`
/// elements and inline declarations, then applies inheritance and initial
/// values for every entry of [`PROPERTIES`].
#[derive(Debug, Clone, Default)]
pub struct CascadeResolver;

impl CascadeResolver {
    pub fn new() -> Self {
        CascadeResolver
    }

    /// Winning declared value for every property set on `node` itself.
    fn declared(
        &self,
        doc: &Document,
        node: NodeId,
        sheets: &[Stylesheet],
    ) -> HashMap<String, String> {
        let mut winners: HashMap<String, (Priority, String)> = HashMap::new();
        let mut offer = |name: &str, value: &str, priority: Priority| {
            let replace = winners
                .get(name)
                .map_or(true, |(current, _)| *current <= priority);
            if replace {
                winners.insert(name.to_string(), (priority, value.to_string()));
            }
        };

        let element = match doc.element(node) {
            Some(e) => e,
            None => return HashMap::new(),
        };

        for def in PROPERTIES {
            if let Some(value) = element.attr(def.name) {
                offer(
                    def.name,
                    value.trim(),
                    (false, Origin::PresentationAttribute, (0, 0, 0), 0),
                );
            }
        }

        let mut order = 0usize;
        for sheet in sheets {
            for rule in sheet.rules() {
                order += 1;
                let Some(specificity) = rule.selectors.match_specificity(doc, node) else {
                    continue;
                };
                for (name, value, important) in rule.declarations.iter_declared() {
                    offer(name, value, (important, Origin::Stylesheet, specificity, order));
                }
            }
        }

        for (name, value, important) in element.style.iter_declared() {
            offer(name, value, (important, Origin::Inline, (0, 0, 0), usize::MAX));
        }

        winners
            .into_iter()
            .map(|(name, (_, value))| (name, value))
            .collect()
    }

    fn compute(&self, doc: &Document, node: NodeId, sheets: &[Stylesheet]) -> ComputedStyle {
        let parent = match doc.parent_element(node) {
            Some(p) => Some(self.compute(doc, p, sheets)),
            None => None,
        };
        if !doc.is_element(node) {
            return parent.unwrap_or_else(initial_style);
        }

        let declared = self.declared(doc, node, sheets);
        let mut style = ComputedStyle::new();
        for def in PROPERTIES {
            let inherited = parent.as_ref().and_then(|s| s.get(def.name));
            let fallback = if def.inherited {
                inherited.unwrap_or(def.initial)
            } else {
                def.initial
            };
            let value = match declared.get(def.name).map(|v| v.as_str()) {
                None => fallback,
                Some(v) if v.eq_ignore_ascii_case("inherit") => inherited.unwrap_or(def.initial),
                Some(v) if v.eq_ignore_ascii_case("initial") => def.initial,
                Some(v) if v.eq_ignore_ascii_case("unset") => fallback,
                Some(v) => v,
            };
            // `color` comes first in the table, so it is already resolved here
            let value = if value.eq_ignore_ascii_case("currentcolor") {
                if def.name == "color" {
                    inherited.unwrap_or(def.initial).to_string()
                } else {
                    style.get("color").unwrap_or(def.initial).to_string()
                }
            } else {
                value.to_string()
            };
            style.set(def.name, &value);
        }
        style
    }
}

fn initial_style() -> ComputedStyle {
    PROPERTIES.iter().map(|p| (p.name, p.initial)).collect()
}

impl StyleResolver for CascadeResolver {
    fn computed_style(&self, doc: &Document, node: NodeId) -> ComputedStyle {
        let sheets = doc.stylesheets();
        self.compute(doc, node, &sheets)
    }

    fn bounding_box(&self, doc: &Document, node: NodeId) -> Rect {
        let sheets = doc.stylesheets();
        let declared = self.declared(doc, node, &sheets);
        layout::intrinsic_box(
            doc,
            node,
            declared.get("width").map(|s| s.as_str()),
            declared.get("height").map(|s| s.as_str()),
        )
    }
}
