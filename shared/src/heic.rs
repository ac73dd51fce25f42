use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("HEIC support is not compiled in")]
    Unavailable,

    #[error("HEIC decode failed: {0}")]
    Decode(String),

    #[error("JPEG encode failed: {0}")]
    Encode(String),
}

/// Converts HEIC bytes into JPEG bytes the image pipeline can decode
#[async_trait]
pub trait HeicConverter: Send + Sync {
    /// `quality` is on a 0..=1 scale
    async fn convert(&self, bytes: &[u8], quality: f32) -> Result<Vec<u8>, ConversionError>;
}

/// Map a 0..=1 quality hint onto the JPEG encoder's 1..=100 range
pub fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_nan() { 1.0 } else { quality.clamp(0.0, 1.0) };
    ((quality * 100.0).round() as u8).max(1)
}

/// Fallback for builds with `--no-default-features`.
/// Every HEIC request then resolves to the not-found response.
pub struct UnavailableHeicConverter;

#[async_trait]
impl HeicConverter for UnavailableHeicConverter {
    async fn convert(&self, _bytes: &[u8], _quality: f32) -> Result<Vec<u8>, ConversionError> {
        Err(ConversionError::Unavailable)
    }
}

#[cfg(feature = "heic")]
pub use libheif::LibHeifConverter;

#[cfg(feature = "heic")]
mod libheif {
    use super::{jpeg_quality, ConversionError, HeicConverter};
    use crate::image_processing::encode_jpeg;
    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    /// libheif-backed converter
    pub struct LibHeifConverter {
        lib: LibHeif,
    }

    impl LibHeifConverter {
        pub fn new() -> Self {
            Self { lib: LibHeif::new() }
        }

        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ConversionError> {
            let decode_err = |e: libheif_rs::HeifError| ConversionError::Decode(e.to_string());

            let ctx = HeifContext::read_from_bytes(bytes).map_err(decode_err)?;
            let handle = ctx.primary_image_handle().map_err(decode_err)?;
            let heif_image = self
                .lib
                .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
                .map_err(decode_err)?;

            let planes = heif_image.planes();
            let plane = planes
                .interleaved
                .ok_or_else(|| ConversionError::Decode("missing interleaved RGB plane".to_string()))?;

            // Rows may be padded past width * 3
            let row_len = plane.width as usize * 3;
            let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
            for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
                pixels.extend_from_slice(&row[..row_len]);
            }

            RgbImage::from_raw(plane.width, plane.height, pixels)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| ConversionError::Decode("pixel buffer size mismatch".to_string()))
        }
    }

    impl Default for LibHeifConverter {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl HeicConverter for LibHeifConverter {
        async fn convert(&self, bytes: &[u8], quality: f32) -> Result<Vec<u8>, ConversionError> {
            let img = self.decode(bytes)?;
            encode_jpeg(&img, jpeg_quality(quality))
                .map_err(|e| ConversionError::Encode(e.to_string()))
        }
    }
}

/// Converter chosen for this build
pub fn default_converter() -> Arc<dyn HeicConverter> {
    #[cfg(feature = "heic")]
    {
        Arc::new(LibHeifConverter::new())
    }
    #[cfg(not(feature = "heic"))]
    {
        tracing::warn!("Built with HEIC support disabled; .heic requests will return 404");
        Arc::new(UnavailableHeicConverter)
    }
}


/// Builds small HEIC files with libheif's own encoder
#[cfg(all(test, feature = "heic"))]
pub(crate) mod testing {
    use libheif_rs::{
        Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
        RgbChroma,
    };

    pub fn encode_heic(width: u32, height: u32) -> Vec<u8> {
        let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::C444)).unwrap();
        for channel in [Channel::R, Channel::G, Channel::B] {
            image.create_plane(channel, width, height, 8).unwrap();
        }

        let planes = image.planes_mut();
        for (plane, value) in [(planes.r, 200u8), (planes.g, 120), (planes.b, 40)] {
            plane.unwrap().data.fill(value);
        }

        let lib = LibHeif::new();
        let mut context = HeifContext::new().unwrap();
        let mut encoder = lib.encoder_for_format(CompressionFormat::Hevc).unwrap();
        encoder.set_quality(EncoderQuality::Lossy(90)).unwrap();
        context.encode_image(&image, &mut encoder, None).unwrap();
        context.write_to_bytes().unwrap()
    }
}
