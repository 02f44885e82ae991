/// Encode a pixel surface as PNG, JPEG or WebP

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder as _};

use crate::rendering::PixelSurface;
use crate::{Blob, Error, ImageFormat, Result};

/// Converts a drawn surface into encoded image bytes.
pub trait SurfaceEncoder: Send + Sync {
    /// `quality` is in `[0, 1]` and only meaningful for lossy formats.
    fn encode(&self, surface: &PixelSurface, format: ImageFormat, quality: f32) -> Result<Vec<u8>>;
}

/// Default encoder backed by the `image` crate.
///
/// WebP output is lossless; `quality` is ignored for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEncoder;

impl ImageEncoder {
    pub fn new() -> Self {
        ImageEncoder
    }
}

/// Map `[0, 1]` onto the JPEG encoder's `1..=100` scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

impl SurfaceEncoder for ImageEncoder {
    fn encode(&self, surface: &PixelSurface, format: ImageFormat, quality: f32) -> Result<Vec<u8>> {
        let (width, height) = (surface.width(), surface.height());
        let mut out = Vec::new();
        let result = match format {
            ImageFormat::Png => PngEncoder::new(&mut out).write_image(
                &surface.to_rgba(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            ImageFormat::Jpeg => {
                // premultiplied channels without alpha: composited over black
                let rgb: Vec<u8> = surface
                    .pixmap()
                    .data()
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality)).write_image(
                    &rgb,
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
            ImageFormat::Webp => {
                if quality < 1.0 {
                    log::warn!("WebP output is lossless, quality {} ignored", quality);
                }
                WebPEncoder::new_lossless(&mut out).write_image(
                    &surface.to_rgba(),
                    width,
                    height,
                    ExtendedColorType::Rgba8,
                )
            }
        };
        result.map_err(|e| Error::EncodeError(e.to_string()))?;
        Ok(out)
    }
}

/// Encode to a `data:<mime>;base64,` URL.
pub fn encode_data_url(
    encoder: &dyn SurfaceEncoder,
    surface: &PixelSurface,
    format: ImageFormat,
    quality: f32,
) -> Result<String> {
    let bytes = encoder.encode(surface, format, quality)?;
    if bytes.is_empty() {
        return Err(Error::EncodeError("could not encode".to_string()));
    }
    Ok(format!("data:{};base64,{}", format.mime(), STANDARD.encode(bytes)))
}

/// Encode to a binary blob on the blocking pool.
pub async fn encode_blob(
    encoder: Arc<dyn SurfaceEncoder>,
    surface: PixelSurface,
    format: ImageFormat,
    quality: f32,
) -> Result<Blob> {
    let bytes =
        tokio::task::spawn_blocking(move || encoder.encode(&surface, format, quality)).await??;
    if bytes.is_empty() {
        return Err(Error::EncodeError("could not encode".to_string()));
    }
    Ok(Blob { format, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::{RasterPayload, Rasterizer, Rect};
    use crate::RasterConfig;

    fn surface() -> PixelSurface {
        let payload = RasterPayload::from_markup(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="4"><rect width="4" height="4" fill="#00ff00"/></svg>"##,
        );
        Rasterizer::new(&RasterConfig {
            load_system_fonts: false,
            ..Default::default()
        })
        .rasterize_blocking(&payload, Rect::new(8.0, 4.0), 1.0)
        .unwrap()
    }

    struct Empty;

    impl SurfaceEncoder for Empty {
        fn encode(&self, _: &PixelSurface, _: ImageFormat, _: f32) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn quality_mapping() {
        assert_eq!(jpeg_quality(0.97), 97);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(1.0), 100);
    }

    #[test]
    fn data_urls_carry_the_format_signature() {
        let s = surface();
        let png = encode_data_url(&ImageEncoder, &s, ImageFormat::Png, 1.0).unwrap();
        assert!(png.starts_with("data:image/png;base64,iVBORw0KGgo"));

        let jpeg = encode_data_url(&ImageEncoder, &s, ImageFormat::Jpeg, 0.5).unwrap();
        assert!(jpeg.starts_with("data:image/jpeg;base64,/9j/"));

        let webp = encode_data_url(&ImageEncoder, &s, ImageFormat::Webp, 0.8).unwrap();
        assert!(webp.starts_with("data:image/webp;base64,UklGR"));
    }

    #[test]
    fn png_round_trips_pixels() {
        let s = surface();
        let bytes = ImageEncoder.encode(&s, ImageFormat::Png, 1.0).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(img.get_pixel(7, 0).0[3], 0);
    }

    #[tokio::test]
    async fn blob_and_empty_result() {
        let blob = encode_blob(Arc::new(ImageEncoder), surface(), ImageFormat::Png, 1.0)
            .await
            .unwrap();
        assert_eq!(blob.mime(), "image/png");
        assert!(!blob.bytes.is_empty());

        let err = encode_blob(Arc::new(Empty), surface(), ImageFormat::Png, 1.0)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Could not encode image: could not encode");
    }
}
