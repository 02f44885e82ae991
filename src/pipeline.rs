//! Orchestrator for a single capture: container, render, normalize, rasterize, encode
//!
//! A run walks `acquire → render → sanitize → inline → serialize → rasterize →
//! encode` and releases its container on every exit, including when the
//! returned future is dropped early.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::dom::{self, Document, NodeId, SelectorList, SharedDocument};
use crate::renderer::{MountPoint, Renderer};
use crate::rendering::encode::{encode_blob, encode_data_url};
use crate::rendering::{
    inline_styles, sanitize, serialize, ImageEncoder, RasterPayload, Rasterizer, Rect,
    StyledClone, SurfaceEncoder,
};
use crate::style::{CascadeResolver, StyleResolver};
use crate::{
    Error, ErrorKind, ImageFormat, OutputKind, RasterConfig, RenderArtifact, RenderOptions,
    Result,
};

/// Attribute carrying the per-run identifier of a temporary container.
pub const MARKER_ATTRIBUTE: &str = "data-svgshot-id";

/// Keeps the container out of view while the renderer works in it.
const CONTAINER_STYLE: &str = "position: absolute; left: -9999px; top: 0; visibility: hidden";

/// Validated form of [`RenderOptions`].
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub format: ImageFormat,
    pub output: OutputKind,
    pub inject: SelectorList,
    pub ignore: Vec<SelectorList>,
    pub scale: f32,
    pub quality: f32,
    pub render_timeout_ms: Option<u64>,
}

impl Plan {
    /// Check every option. Nothing here touches a document.
    pub(crate) fn compile(options: &RenderOptions) -> Result<Self> {
        if !options.scale.is_finite() || options.scale <= 0.0 {
            return Err(Error::ConfigError(format!(
                "scale must be a finite number greater than 0, got {}",
                options.scale
            )));
        }
        if options.format.is_lossy() && !(0.0..=1.0).contains(&options.quality) {
            return Err(Error::ConfigError(format!(
                "quality must be within [0, 1], got {}",
                options.quality
            )));
        }
        let inject = SelectorList::parse(&options.inject_selector)?;
        let ignore = options
            .ignore_all_selectors
            .iter()
            .map(|s| SelectorList::parse(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            format: options.format,
            output: options.output,
            inject,
            ignore,
            scale: options.scale,
            quality: options.quality,
            render_timeout_ms: options.render_timeout_ms,
        })
    }
}

/// The temporary, uniquely tagged element a run renders into.
///
/// Removed by [`Container::release`] or, failing that, on drop.
struct Container {
    document: SharedDocument,
    node: NodeId,
    marker: String,
    released: bool,
}

impl Container {
    /// Create the container under the first match of `inject`.
    ///
    /// An unresolvable target is reported before anything is inserted.
    fn acquire(document: &SharedDocument, inject: &SelectorList) -> Result<Self> {
        let mut doc = dom::lock(document)?;
        let root = doc.root();
        let parent = doc.select(root, inject).into_iter().next().ok_or_else(|| {
            Error::ConfigError(format!(
                "inject selector `{}` matches no element",
                inject.as_str()
            ))
        })?;

        let marker = Uuid::new_v4().to_string();
        let node = doc.create_element("div");
        if let Some(element) = doc.element_mut(node) {
            element.set_attr(MARKER_ATTRIBUTE, &marker);
            element.set_attr("style", CONTAINER_STYLE);
        }
        doc.append_child(parent, node)?;
        log::debug!("Acquired container {}", marker);

        Ok(Self {
            document: document.clone(),
            node,
            marker,
            released: false,
        })
    }

    fn mount_point(&self) -> MountPoint {
        MountPoint::new(self.document.clone(), self.node, self.marker.clone())
    }

    /// Detach the container. Only the first call has an effect.
    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let mut doc = dom::lock(&self.document)?;
        if !doc.remove(self.node) {
            log::warn!("Container {} was already gone on release", self.marker);
        }
        log::debug!("Released container {}", self.marker);
        Ok(())
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("Failed to release container {}: {}", self.marker, e);
        }
    }
}

/// Turns rendered SVG trees into raster images.
///
/// A pipeline owns its renderer and shares the host document; any number of
/// runs may be in flight at once.
pub struct Pipeline<R: Renderer> {
    renderer: R,
    document: SharedDocument,
    resolver: Arc<dyn StyleResolver>,
    encoder: Arc<dyn SurfaceEncoder>,
    rasterizer: Rasterizer,
}

impl<R: Renderer> Pipeline<R> {
    /// Pipeline with the default resolver, encoder and raster configuration.
    pub fn new(renderer: R, document: SharedDocument) -> Self {
        Self::with_config(renderer, document, &RasterConfig::default())
    }

    pub fn with_config(renderer: R, document: SharedDocument, config: &RasterConfig) -> Self {
        Self {
            renderer,
            document,
            resolver: Arc::new(CascadeResolver::new()),
            encoder: Arc::new(ImageEncoder::new()),
            rasterizer: Rasterizer::new(config),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn StyleResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn SurfaceEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Render `ui` and return it as an image.
    ///
    /// Configuration errors are always returned. Any other failure is returned
    /// when `options.throw_errors` is set, and otherwise logged and replaced by
    /// [`RenderArtifact::empty`].
    pub async fn render_vector_as_image(
        &self,
        ui: &R::Ui,
        options: &RenderOptions,
    ) -> Result<RenderArtifact> {
        let plan = Plan::compile(options)?;
        match self.run(ui, &plan).await {
            Ok(artifact) => Ok(artifact),
            Err(err) if options.throw_errors || err.kind() == ErrorKind::Config => Err(err),
            Err(err) => {
                log::error!("Vector capture failed: {}", err);
                Ok(RenderArtifact::empty())
            }
        }
    }

    async fn run(&self, ui: &R::Ui, plan: &Plan) -> Result<RenderArtifact> {
        let mut container = Container::acquire(&self.document, &plan.inject)?;
        let result = self.capture(ui, plan, &container).await;
        let released = container.release();
        let artifact = result?;
        released?;
        Ok(artifact)
    }

    async fn capture(
        &self,
        ui: &R::Ui,
        plan: &Plan,
        container: &Container,
    ) -> Result<RenderArtifact> {
        let mount = container.mount_point();
        let render = self.renderer.render(ui, &mount);
        match plan.render_timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), render)
                .await
                .map_err(|_| Error::Timeout(ms))??,
            None => render.await?,
        }
        log::debug!("Renderer committed into container {}", container.marker);

        let (payload, bbox) = self.snapshot(container, plan)?;
        let surface = self.rasterizer.rasterize(payload, bbox, plan.scale).await?;

        let artifact = match plan.output {
            OutputKind::DataUrl => RenderArtifact::DataUrl(encode_data_url(
                self.encoder.as_ref(),
                &surface,
                plan.format,
                plan.quality,
            )?),
            OutputKind::Blob => RenderArtifact::Blob(
                encode_blob(self.encoder.clone(), surface, plan.format, plan.quality).await?,
            ),
        };
        log::debug!("Encoded {} {:?} artifact", plan.format, plan.output);
        Ok(artifact)
    }

    /// Clone, sanitize, inline and serialize the rendered root under one lock.
    fn snapshot(&self, container: &Container, plan: &Plan) -> Result<(RasterPayload, Rect)> {
        let live = dom::lock(&self.document)?;
        let svg = find_vector_root(&live, container.node).ok_or_else(|| {
            Error::MissingOutput(format!(
                "container {} holds no <svg> element",
                container.marker
            ))
        })?;

        let bbox = self.resolver.bounding_box(&live, svg);
        let mut clone = StyledClone::capture(&live, svg)?;
        let exclusions = sanitize(&mut clone, &plan.ignore);
        inline_styles(&live, svg, self.resolver.as_ref(), &mut clone, &exclusions)?;
        clone.pin_size(bbox);
        Ok((serialize(&clone), bbox))
    }
}

/// First `<svg>` element under `container`, in document order.
fn find_vector_root(doc: &Document, container: NodeId) -> Option<NodeId> {
    doc.descendants(container)
        .find(|&n| doc.element(n).is_some_and(|e| e.tag == "svg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarkupRenderer;

    fn options() -> RenderOptions {
        RenderOptions::default()
    }

    #[test]
    fn compile_rejects_bad_numbers_and_selectors() {
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let o = RenderOptions { scale, ..options() };
            assert_eq!(Plan::compile(&o).unwrap_err().kind(), ErrorKind::Config);
        }
        for quality in [-0.1, 1.5, f32::NAN] {
            let o = RenderOptions {
                format: ImageFormat::Jpeg,
                quality,
                ..options()
            };
            assert_eq!(Plan::compile(&o).unwrap_err().kind(), ErrorKind::Config);
        }
        let o = RenderOptions {
            ignore_all_selectors: vec![".ok".into(), "[[".into()],
            ..options()
        };
        assert_eq!(Plan::compile(&o).unwrap_err().kind(), ErrorKind::Config);
        assert!(Plan::compile(&options()).is_ok());
    }

    #[test]
    fn quality_is_ignored_for_lossless_output() {
        let o = RenderOptions {
            format: ImageFormat::Png,
            quality: 1.5,
            ..options()
        };
        assert!(Plan::compile(&o).is_ok());
        let o = RenderOptions {
            format: ImageFormat::Webp,
            ..o
        };
        assert_eq!(Plan::compile(&o).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn container_is_tagged_hidden_and_released_once() {
        let shared = Document::shared();
        let inject = SelectorList::parse("body").unwrap();
        let mut container = Container::acquire(&shared, &inject).unwrap();
        let marker = container.marker.clone();
        {
            let doc = shared.lock().unwrap();
            let root = doc.root();
            let node = doc.find_by_attribute(root, MARKER_ATTRIBUTE, &marker).unwrap();
            let style = &doc.element(node).unwrap().style;
            assert_eq!(style.get_property("visibility"), Some("hidden"));
        }
        container.release().unwrap();
        container.release().unwrap();
        drop(container);
        let doc = shared.lock().unwrap();
        assert!(doc.find_by_attribute(doc.root(), MARKER_ATTRIBUTE, &marker).is_none());
    }

    #[test]
    fn unresolvable_inject_target_leaves_document_untouched() {
        let shared = Document::shared();
        let before = shared.lock().unwrap().len();
        let inject = SelectorList::parse("#missing").unwrap();
        let err = Container::acquire(&shared, &inject).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(shared.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn config_errors_surface_even_when_swallowing() {
        let pipeline = Pipeline::with_config(
            MarkupRenderer,
            Document::shared(),
            &RasterConfig {
                load_system_fonts: false,
                ..Default::default()
            },
        );
        let o = RenderOptions {
            inject_selector: "main".into(),
            throw_errors: false,
            ..options()
        };
        let err = pipeline
            .render_vector_as_image("<svg/>", &o)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
