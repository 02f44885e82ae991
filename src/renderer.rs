//! The renderer seam: whatever turns a UI description into an `<svg>` element

use async_trait::async_trait;

use crate::dom::parse::parse_markup;
use crate::dom::{self, Document, NodeId, SharedDocument};
use crate::Result;

/// Where a renderer mounts its output for one pipeline run.
///
/// The document is shared, so a renderer must not hold the lock across an
/// await point; [`MountPoint::with_document`] makes that the easy path.
#[derive(Debug, Clone)]
pub struct MountPoint {
    document: SharedDocument,
    container: NodeId,
    marker: String,
}

impl MountPoint {
    pub(crate) fn new(document: SharedDocument, container: NodeId, marker: String) -> Self {
        Self {
            document,
            container,
            marker,
        }
    }

    /// The temporary container the output must be appended to.
    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Unique value of the container's marker attribute for this run.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Run `f` with the document locked and the container id.
    pub fn with_document<T>(&self, f: impl FnOnce(&mut Document, NodeId) -> T) -> Result<T> {
        let mut doc = dom::lock(&self.document)?;
        Ok(f(&mut doc, self.container))
    }

    /// Parse `markup` and append it to the container.
    pub fn mount_markup(&self, markup: &str) -> Result<NodeId> {
        self.with_document(|doc, container| parse_markup(doc, container, markup))?
    }
}

/// Renders a UI description into a [`MountPoint`].
///
/// Resolving means the output is in place; an error is reported to the
/// caller as [`crate::Error::RenderError`].
#[async_trait]
pub trait Renderer: Send + Sync {
    /// The UI description this renderer understands.
    type Ui: ?Sized + Sync;

    async fn render(&self, ui: &Self::Ui, mount: &MountPoint) -> anyhow::Result<()>;
}

/// Mounts literal SVG markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupRenderer;

#[async_trait]
impl Renderer for MarkupRenderer {
    type Ui = str;

    async fn render(&self, ui: &str, mount: &MountPoint) -> anyhow::Result<()> {
        mount.mount_markup(ui)?;
        Ok(())
    }
}
