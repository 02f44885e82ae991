/// Exclusion policy: strip elements matching caller selectors from a clone

use std::collections::HashSet;

use crate::dom::{NodeId, SelectorList};
use crate::rendering::StyledClone;

/// Live nodes whose clones were removed by [`sanitize`].
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    removed: HashSet<NodeId>,
}

impl Exclusions {
    pub fn contains(&self, live: NodeId) -> bool {
        self.removed.contains(&live)
    }

    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Remove every descendant of the clone root matching any of `selectors`.
///
/// All matches are collected against the unmodified clone before anything is
/// detached, so the removed set does not depend on selector order. A match
/// inside an already removed subtree is skipped.
pub fn sanitize(clone: &mut StyledClone, selectors: &[SelectorList]) -> Exclusions {
    let root = clone.root();
    let matched: Vec<NodeId> = selectors
        .iter()
        .flat_map(|s| clone.document().select(root, s))
        .collect();

    let mut exclusions = Exclusions::default();
    for node in matched {
        let origin = clone.origin(node);
        if clone.document_mut().remove(node) {
            if let Some(origin) = origin {
                exclusions.removed.insert(origin);
            }
        }
    }
    if !exclusions.is_empty() {
        log::debug!("Sanitizer removed {} element(s)", exclusions.len());
    }
    exclusions
}
