//! svgshot
//!
//! Capture a rendered SVG tree together with its computed styles and turn it
//! into a raster image, returned either as a self-contained data URL or as a
//! binary blob.
//!
//! # Pipeline
//!
//! - **Container**: a hidden, uniquely tagged element is created under the
//!   inject root of a shared [`dom::Document`]
//! - **Render**: the injected [`Renderer`] mounts the UI description into it
//! - **Clone / sanitize / inline**: the `<svg>` it produced is cloned, excluded
//!   elements are removed and every computed style is written inline
//! - **Serialize / rasterize / encode**: the clone becomes a
//!   `data:image/svg+xml` payload, is drawn at the requested scale and encoded
//!   as PNG, JPEG or WebP
//!
//! The container is removed on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use svgshot::{dom::Document, MarkupRenderer, Pipeline, RenderOptions};
//!
//! # async fn run() -> svgshot::Result<()> {
//! let pipeline = Pipeline::new(MarkupRenderer, Document::shared());
//! let options = RenderOptions {
//!     scale: 2.0,
//!     ..Default::default()
//! };
//! let artifact = pipeline
//!     .render_vector_as_image(r#"<svg width="10" height="10"><rect width="10" height="10"/></svg>"#, &options)
//!     .await?;
//! println!("{}", artifact.as_data_url().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

pub mod error;
pub use error::{Error, ErrorKind, Result};

// Arena document model, selectors and markup import
pub mod dom;

// Computed style resolution
pub mod style;

// Sanitize, inline, serialize, rasterize and encode stages
pub mod rendering;

// Renderer seam and mount point handed to it
pub mod renderer;

// Orchestrator that sequences a single run
pub mod pipeline;

pub use pipeline::Pipeline;
pub use renderer::{MarkupRenderer, MountPoint, Renderer};
pub use style::{CascadeResolver, ComputedStyle, StyleResolver};

/// Raster format of the produced image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ImageFormat {
    /// Lossless PNG
    #[default]
    Png,
    /// Lossy JPEG, honours `quality`
    Jpeg,
    /// WebP
    Webp,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }

    /// Whether the quality parameter means anything for this format
    pub fn is_lossy(&self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::Webp)
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" | "image/jpeg" => Ok(ImageFormat::Jpeg),
            "webp" | "image/webp" => Ok(ImageFormat::Webp),
            other => Err(Error::ConfigError(format!(
                "Unsupported image format `{}` (expected png, jpeg or webp)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ImageFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Representation of the produced artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputKind {
    /// `data:<mime>;base64,...` string
    #[default]
    DataUrl,
    /// Raw encoded bytes
    Blob,
}

impl FromStr for OutputKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data-url" | "dataurl" | "data_url" | "string" => Ok(OutputKind::DataUrl),
            "blob" | "binary" => Ok(OutputKind::Blob),
            other => Err(Error::ConfigError(format!(
                "Unsupported output kind `{}` (expected data-url or blob)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for OutputKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Options for a single `render_vector_as_image` call
///
/// The defaults match the common case: a PNG data URL at 1x, mounted under
/// `body`, errors propagated to the caller.
///
/// # Examples
///
/// ```
/// let opts = svgshot::RenderOptions::default();
/// assert_eq!(opts.format, svgshot::ImageFormat::Png);
/// assert!(opts.throw_errors);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Raster format of the result
    pub format: ImageFormat,
    /// Data URL or binary blob
    pub output: OutputKind,
    /// Selector of the element the temporary container is appended to
    pub inject_selector: String,
    /// Elements matching any of these selectors are left out of the capture
    pub ignore_all_selectors: Vec<String>,
    /// Pixel density multiplier, must be finite and positive
    pub scale: f32,
    /// Encoder quality in `[0, 1]`, only used by lossy formats
    pub quality: f32,
    /// When false, failures are logged and an empty data URL is returned
    pub throw_errors: bool,
    /// Upper bound for the renderer call; `None` waits indefinitely
    pub render_timeout_ms: Option<u64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            output: OutputKind::DataUrl,
            inject_selector: "body".to_string(),
            ignore_all_selectors: Vec::new(),
            scale: 1.0,
            quality: 0.97,
            throw_errors: true,
            render_timeout_ms: None,
        }
    }
}

impl RenderOptions {
    /// Check every option without touching any document.
    pub fn validate(&self) -> Result<()> {
        pipeline::Plan::compile(self).map(|_| ())
    }
}

/// Pipeline-wide rasterizer configuration
#[derive(Debug, Clone)]
pub struct RasterConfig {
    /// Load installed system fonts so `<text>` can be drawn
    pub load_system_fonts: bool,
    /// Family used when a text element names none that is available
    pub default_font_family: String,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            load_system_fonts: cfg!(feature = "system-fonts"),
            default_font_family: "Times New Roman".to_string(),
        }
    }
}

/// Encoded image bytes tagged with their format
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }
}

/// Final output of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum RenderArtifact {
    /// Self-contained `data:` URL
    DataUrl(String),
    /// Binary encoding
    Blob(Blob),
}

impl RenderArtifact {
    /// The value returned when a failure is swallowed (`throw_errors = false`)
    pub fn empty() -> Self {
        RenderArtifact::DataUrl(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RenderArtifact::DataUrl(s) => s.is_empty(),
            RenderArtifact::Blob(b) => b.bytes.is_empty(),
        }
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            RenderArtifact::DataUrl(_) => OutputKind::DataUrl,
            RenderArtifact::Blob(_) => OutputKind::Blob,
        }
    }

    pub fn as_data_url(&self) -> Option<&str> {
        match self {
            RenderArtifact::DataUrl(s) => Some(s),
            RenderArtifact::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            RenderArtifact::Blob(b) => Some(b),
            RenderArtifact::DataUrl(_) => None,
        }
    }
}
