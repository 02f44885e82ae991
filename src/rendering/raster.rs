/// Decode an SVG payload and draw it onto a scaled pixel surface

use std::sync::Arc;

use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;

use crate::rendering::{RasterPayload, Rect};
use crate::{Error, RasterConfig, Result};

/// Largest device-pixel side a surface may have.
pub const MAX_SURFACE_SIDE: u32 = 32_767;

/// A drawn RGBA surface.
///
/// `width`/`height` are device pixels; `logical_size` is the unscaled box the
/// surface was sized from.
#[derive(Clone)]
pub struct PixelSurface {
    pixmap: Pixmap,
    logical_size: Rect,
}

impl PixelSurface {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn logical_size(&self) -> Rect {
        self.logical_size
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight (non-premultiplied) RGBA8 pixels, row major.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }
}

impl std::fmt::Debug for PixelSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("logical_size", &self.logical_size)
            .finish()
    }
}

/// Turns serialized payloads into pixel surfaces.
///
/// The font database is loaded once and shared by every run.
#[derive(Clone)]
pub struct Rasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    font_family: String,
}

impl Rasterizer {
    pub fn new(config: &RasterConfig) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        if config.load_system_fonts {
            fontdb.load_system_fonts();
            log::debug!("Loaded {} system font faces", fontdb.len());
        }
        Self {
            fontdb: Arc::new(fontdb),
            font_family: config.default_font_family.clone(),
        }
    }

    /// Decode `payload` off the async executor and draw it at `scale`.
    ///
    /// The surface is `ceil(bbox * scale)` pixels on each axis and the scale is
    /// applied as a transform, so detail is rasterized at full density.
    pub async fn rasterize(
        &self,
        payload: RasterPayload,
        bbox: Rect,
        scale: f32,
    ) -> Result<PixelSurface> {
        let rasterizer = self.clone();
        tokio::task::spawn_blocking(move || rasterizer.rasterize_blocking(&payload, bbox, scale))
            .await?
    }

    /// Synchronous body of [`Rasterizer::rasterize`].
    pub fn rasterize_blocking(
        &self,
        payload: &RasterPayload,
        bbox: Rect,
        scale: f32,
    ) -> Result<PixelSurface> {
        let data = payload.decode()?;
        let mut options = usvg::Options::default();
        options.fontdb = self.fontdb.clone();
        options.font_family = self.font_family.clone();

        let tree = usvg::Tree::from_data(&data, &options)
            .map_err(|e| Error::DecodeError(e.to_string()))?;

        let (width, height) = bbox.scaled_size(scale);
        if width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
            return Err(Error::ConfigError(format!(
                "A {}x{} surface exceeds the {}px limit; lower the scale",
                width, height, MAX_SURFACE_SIDE
            )));
        }
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            Error::ConfigError(format!("Cannot allocate a {}x{} surface", width, height))
        })?;
        resvg::render(
            &tree,
            Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );
        log::debug!(
            "Rasterized {}x{} box at scale {} into {}x{} pixels",
            bbox.width,
            bbox.height,
            scale,
            width,
            height
        );

        Ok(PixelSurface {
            pixmap,
            logical_size: bbox,
        })
    }
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("font_faces", &self.fontdb.len())
            .field("font_family", &self.font_family)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(&RasterConfig {
            load_system_fonts: false,
            ..Default::default()
        })
    }

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="#ff0000"/></svg>"##;

    #[tokio::test]
    async fn scales_surface_and_content() {
        let payload = RasterPayload::from_markup(SQUARE);
        let surface = rasterizer()
            .rasterize(payload, Rect::new(10.0, 10.0), 2.5)
            .await
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (25, 25));
        assert_eq!(surface.logical_size(), Rect::new(10.0, 10.0));

        // the far corner is covered, so the rect was scaled rather than drawn small
        let rgba = surface.to_rgba();
        let last = &rgba[rgba.len() - 4..];
        assert_eq!(last, &[255, 0, 0, 255]);
    }

    #[test]
    fn undecodable_payload_is_a_decode_error() {
        let r = rasterizer();
        let bad = RasterPayload::from_markup("<svg xmlns=\"http://www.w3.org/2000/svg\"");
        let err = r.rasterize_blocking(&bad, Rect::new(1.0, 1.0), 1.0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Decode);

        let empty = RasterPayload::from_markup(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="0" height="0"/>"#,
        );
        let err = r.rasterize_blocking(&empty, Rect::new(0.0, 0.0), 1.0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Decode);
    }

    #[test]
    fn oversized_surface_is_a_config_error() {
        let r = rasterizer();
        let payload = RasterPayload::from_markup(SQUARE);
        let err = r
            .rasterize_blocking(&payload, Rect::new(10.0, 10.0), 10_000.0)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);

        // a valid document with an empty box cannot get a surface either
        let err = r
            .rasterize_blocking(&payload, Rect::new(0.0, 10.0), 1.0)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }
}
