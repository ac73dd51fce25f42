use crate::config::ResizerConfig;
use crate::image_key::OutputFormat;
use crate::query::RequestedSize;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Failed to load image: {0}")]
    Decode(String),

    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
}

/// Decode bytes in any supported format (sniffed from the content)
pub fn decode(image_bytes: &[u8]) -> Result<DynamicImage, ProcessingError> {
    image::load_from_memory(image_bytes).map_err(|e| ProcessingError::Decode(e.to_string()))
}

/// Sizes involved in one resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub requested: RequestedSize,
    pub source: (u32, u32),
    /// Bounding box: componentwise min(requested, source)
    pub target: (u32, u32),
}

impl ResizeSpec {
    pub fn new(requested: RequestedSize, source: (u32, u32)) -> Self {
        Self {
            requested,
            source,
            target: (
                source.0.min(requested.width),
                source.1.min(requested.height),
            ),
        }
    }

    /// Final pixel size: the source scaled to fit inside `target`
    pub fn output_size(&self) -> (u32, u32) {
        fit_inside(self.source, self.target)
    }
}

/// Largest aspect-preserving size that fits in `bounds` without enlarging.
/// Each side is at least 1px.
pub fn fit_inside(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return (src_w, src_h);
    }

    let scale = (bounds.0 as f64 / src_w as f64)
        .min(bounds.1 as f64 / src_h as f64)
        .min(1.0);

    let new_w = ((src_w as f64 * scale).round() as u32).clamp(1, bounds.0.max(1));
    let new_h = ((src_h as f64 * scale).round() as u32).clamp(1, bounds.1.max(1));
    (new_w, new_h)
}

/// Resize with Lanczos3 and encode to the output format
pub fn resize_and_encode(
    img: &DynamicImage,
    spec: &ResizeSpec,
    format: OutputFormat,
    config: &ResizerConfig,
) -> Result<Vec<u8>, ProcessingError> {
    let (width, height) = spec.output_size();

    let resized;
    let output = if (width, height) == spec.source {
        img
    } else {
        resized = img.resize_exact(width, height, FilterType::Lanczos3);
        &resized
    };

    match format {
        OutputFormat::Jpeg => encode_jpeg(output, config.jpeg_quality).map_err(|e| {
            ProcessingError::Encode {
                format: format.name(),
                message: e.to_string(),
            }
        }),
        OutputFormat::WebP => encode_webp(output, config.webp_quality),
    }
}

/// Encode as baseline JPEG; alpha is dropped
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.to_rgb8().write_with_encoder(encoder)?;
    Ok(buf)
}

/// Encode as lossy WebP, keeping alpha when the source has it
pub fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Vec<u8>, ProcessingError> {
    // libwebp only takes 8-bit RGB/RGBA
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let encoder = webp::Encoder::from_image(&img).map_err(|e| ProcessingError::Encode {
        format: OutputFormat::WebP.name(),
        message: e.to_string(),
    })?;

    Ok(encoder.encode(quality).to_vec())
}
