/// Copy computed styles from the live tree onto the clone

use crate::dom::{Document, NodeId};
use crate::rendering::{Exclusions, StyledClone};
use crate::style::StyleResolver;
use crate::{Error, Result};

/// Never copied: the working container is hidden while a capture runs.
pub const SKIPPED_PROPERTY: &str = "visibility";

/// Walk `source` (live) and the clone root in lock-step, writing every
/// computed property except `visibility` into the clone's inline style.
///
/// Pairing is by element-child position, pre-order, after dropping the live
/// children listed in `exclusions`. Differing child counts at any level mean
/// the clone does not mirror the live tree and fail with
/// [`Error::StructuralMismatch`].
pub fn inline_styles(
    live: &Document,
    source: NodeId,
    resolver: &dyn StyleResolver,
    clone: &mut StyledClone,
    exclusions: &Exclusions,
) -> Result<()> {
    let root_tag = live
        .element(source)
        .map(|e| e.tag.clone())
        .unwrap_or_default();
    let mut stack = vec![(source, clone.root(), root_tag)];
    let mut copied = 0usize;

    while let Some((source, target, path)) = stack.pop() {
        let computed = resolver.computed_style(live, source);
        let element = clone
            .document_mut()
            .element_mut(target)
            .ok_or_else(|| Error::Other(format!("Clone node at {} is not an element", path)))?;
        for (name, value) in computed.iter() {
            if name == SKIPPED_PROPERTY {
                continue;
            }
            element.style.set_property(name, value);
        }
        copied += 1;

        let source_children: Vec<NodeId> = live
            .element_children(source)
            .into_iter()
            .filter(|&c| !exclusions.contains(c))
            .collect();
        let target_children = clone.document().element_children(target);
        if source_children.len() != target_children.len() {
            return Err(Error::StructuralMismatch {
                path,
                source_children: source_children.len(),
                target_children: target_children.len(),
            });
        }

        for (i, pair) in source_children
            .into_iter()
            .zip(target_children)
            .enumerate()
            .rev()
        {
            stack.push((pair.0, pair.1, format!("{}/{}", path, i)));
        }
    }

    log::debug!("Inlined computed styles on {} element(s)", copied);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse::parse_markup;
    use crate::dom::SelectorList;
    use crate::rendering::sanitize;
    use crate::style::{CascadeResolver, ComputedStyle};

    struct FixedResolver;

    impl StyleResolver for FixedResolver {
        fn computed_style(&self, doc: &Document, node: NodeId) -> ComputedStyle {
            let tag = doc.element(node).map(|e| e.tag.as_str()).unwrap_or("");
            [("fill", tag), ("visibility", "hidden"), ("opacity", "0.5")]
                .into_iter()
                .collect()
        }
    }

    fn live() -> (Document, NodeId) {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let svg = parse_markup(
            &mut doc,
            body,
            r#"<svg><g><circle/><rect class="x"/></g><path/></svg>"#,
        )
        .unwrap();
        (doc, svg)
    }

    fn styles(clone: &StyledClone) -> Vec<String> {
        let doc = clone.document();
        std::iter::once(clone.root())
            .chain(doc.descendants(clone.root()))
            .filter_map(|n| doc.element(n).map(|e| e.style.to_css_text()))
            .collect()
    }

    #[test]
    fn copies_everything_but_visibility() {
        let (live, svg) = live();
        let mut clone = StyledClone::capture(&live, svg).unwrap();
        inline_styles(&live, svg, &FixedResolver, &mut clone, &Exclusions::default()).unwrap();
        assert_eq!(
            styles(&clone),
            vec![
                "fill: svg; opacity: 0.5;",
                "fill: g; opacity: 0.5;",
                "fill: circle; opacity: 0.5;",
                "fill: rect; opacity: 0.5;",
                "fill: path; opacity: 0.5;",
            ]
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let (live, svg) = live();
        let resolver = CascadeResolver::new();
        let mut first = StyledClone::capture(&live, svg).unwrap();
        let mut second = StyledClone::capture(&live, svg).unwrap();
        inline_styles(&live, svg, &resolver, &mut first, &Exclusions::default()).unwrap();
        inline_styles(&live, svg, &resolver, &mut second, &Exclusions::default()).unwrap();
        assert_eq!(styles(&first), styles(&second));
        assert!(styles(&first).iter().all(|s| !s.contains("visibility")));
    }

    #[test]
    fn exclusions_keep_pairs_aligned() {
        let (live, svg) = live();
        let mut clone = StyledClone::capture(&live, svg).unwrap();
        let excl = sanitize(&mut clone, &[SelectorList::parse(".x").unwrap()]);
        inline_styles(&live, svg, &FixedResolver, &mut clone, &excl).unwrap();
        assert_eq!(styles(&clone).len(), 4);
        assert_eq!(styles(&clone)[3], "fill: path; opacity: 0.5;");
    }

    #[test]
    fn mismatch_is_reported_with_path() {
        let (live, svg) = live();
        let mut clone = StyledClone::capture(&live, svg).unwrap();
        let root = clone.root();
        let g = clone.document().element_children(root)[0];
        let circle = clone.document().element_children(g)[0];
        clone.document_mut().remove(circle);

        let err = inline_styles(&live, svg, &FixedResolver, &mut clone, &Exclusions::default())
            .unwrap_err();
        match err {
            Error::StructuralMismatch {
                path,
                source_children,
                target_children,
            } => {
                assert_eq!(path, "svg/0");
                assert_eq!((source_children, target_children), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
