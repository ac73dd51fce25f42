use crate::config::ResizerConfig;
use crate::heic::{ConversionError, HeicConverter};
use crate::image_key::{ImageKey, OutputFormat};
use crate::image_processing::{self, ProcessingError, ResizeSpec};
use crate::query::RequestedSize;
use crate::storage::{ObjectStore, StorageError};
use crate::types::{BodyEncoding, CloudFrontRequest, CloudFrontResponse};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::GenericImageView;
use std::sync::Arc;

const HEIC_EXTENSION: &str = "heic";

/// Anything that can go wrong after the extension check.
/// All of these surface to the client as the same 404.
#[derive(Debug, thiserror::Error)]
pub enum ResizeFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

/// Result of one request, before it is written into the edge response
#[derive(Debug)]
pub enum ResizeOutcome {
    Resized {
        format: OutputFormat,
        bytes: Vec<u8>,
    },
    UnsupportedFormat {
        extension: String,
    },
    ProcessingFailure {
        uri: String,
        cause: ResizeFailure,
    },
}

impl ResizeOutcome {
    pub fn status(&self) -> u16 {
        match self {
            Self::Resized { .. } => 200,
            Self::UnsupportedFormat { .. } => 500,
            Self::ProcessingFailure { .. } => 404,
        }
    }

    fn status_description(&self) -> &'static str {
        match self {
            Self::Resized { .. } => "OK",
            Self::UnsupportedFormat { .. } => "Internal Server Error",
            Self::ProcessingFailure { .. } => "Not Found",
        }
    }

    /// Write the outcome over the origin response.
    /// Headers and fields this handler does not own are kept.
    pub fn render(self, mut response: CloudFrontResponse) -> CloudFrontResponse {
        response.status = self.status().to_string();
        response.status_description = Some(self.status_description().to_string());

        match self {
            Self::Resized { format, bytes } => {
                response.set_header("Content-Type", format.content_type());
                response.body = Some(STANDARD.encode(bytes));
                response.body_encoding = Some(BodyEncoding::Base64);
            }
            Self::UnsupportedFormat { extension } => {
                response.set_header("Content-Type", "text/plain");
                response.body = Some(format!("{} is not allowed", extension));
                response.body_encoding = Some(BodyEncoding::Text);
            }
            Self::ProcessingFailure { uri, .. } => {
                response.set_header("Content-Type", "text/plain");
                response.body = Some(format!("{} is not found.", uri));
                response.body_encoding = Some(BodyEncoding::Text);
            }
        }

        response
    }
}

/// Turns an edge request for an original image into a resized response.
///
/// Holds only read-only handles, so one instance serves every invocation
/// of a warm container.
pub struct ImageResponder {
    store: Arc<dyn ObjectStore>,
    converter: Arc<dyn HeicConverter>,
    config: ResizerConfig,
}

impl ImageResponder {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        converter: Arc<dyn HeicConverter>,
        config: ResizerConfig,
    ) -> Self {
        Self {
            store,
            converter,
            config,
        }
    }

    /// Handle one request and populate the response exactly once
    pub async fn handle(
        &self,
        request: &CloudFrontRequest,
        response: CloudFrontResponse,
    ) -> CloudFrontResponse {
        self.resize(request).await.render(response)
    }

    pub async fn resize(&self, request: &CloudFrontRequest) -> ResizeOutcome {
        let requested = RequestedSize::from_querystring(&request.querystring, &self.config);

        let key = match ImageKey::parse(&request.uri) {
            Some(key) if self.config.is_allowed(&key.extension) => key,
            Some(key) => {
                tracing::warn!("Rejected {}: extension {:?} not allowed", request.uri, key.extension);
                return ResizeOutcome::UnsupportedFormat {
                    extension: key.extension,
                };
            }
            None => {
                tracing::warn!("Rejected {}: no extension", request.uri);
                return ResizeOutcome::UnsupportedFormat {
                    extension: String::new(),
                };
            }
        };

        let format = key.output_format();
        match self.process(&key, requested, format).await {
            Ok(bytes) => ResizeOutcome::Resized { format, bytes },
            Err(cause) => {
                tracing::warn!("Failed to resize {}: {}", request.uri, cause);
                ResizeOutcome::ProcessingFailure {
                    uri: request.uri.clone(),
                    cause,
                }
            }
        }
    }

    async fn process(
        &self,
        key: &ImageKey,
        requested: RequestedSize,
        format: OutputFormat,
    ) -> Result<Vec<u8>, ResizeFailure> {
        let storage_key = key.storage_key();
        let original = self.store.get_object(&storage_key).await?;

        let input = if key.extension == HEIC_EXTENSION {
            self.converter
                .convert(&original, self.config.heic_quality)
                .await?
        } else {
            original
        };

        let img = image_processing::decode(&input)?;
        let spec = ResizeSpec::new(requested, img.dimensions());
        let (width, height) = spec.output_size();

        tracing::info!(
            "Resizing {} from {}x{} to {}x{} as {}",
            storage_key,
            spec.source.0,
            spec.source.1,
            width,
            height,
            format.name()
        );

        Ok(image_processing::resize_and_encode(
            &img,
            &spec,
            format,
            &self.config,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heic::UnavailableHeicConverter;
    use crate::storage::testing::MemoryStore;
    use crate::types::HeaderEntry;
    use async_trait::async_trait;
    use image::{DynamicImage, GenericImageView, ImageFormat};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Returns a fixed JPEG and records the quality it was asked for
    struct FakeHeicConverter {
        jpeg: Vec<u8>,
        calls: Mutex<Vec<f32>>,
    }

    impl FakeHeicConverter {
        fn new(width: u32, height: u32) -> Self {
            Self {
                jpeg: encode(DynamicImage::new_rgb8(width, height), ImageFormat::Jpeg),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<f32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HeicConverter for FakeHeicConverter {
        async fn convert(&self, _bytes: &[u8], quality: f32) -> Result<Vec<u8>, ConversionError> {
            self.calls.lock().unwrap().push(quality);
            Ok(self.jpeg.clone())
        }
    }

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode(DynamicImage::new_rgb8(width, height), ImageFormat::Png)
    }

    fn webp(width: u32, height: u32) -> Vec<u8> {
        image_processing::encode_webp(&DynamicImage::new_rgb8(width, height), 80.0).unwrap()
    }

    fn responder(store: Arc<MemoryStore>, converter: Arc<dyn HeicConverter>) -> ImageResponder {
        ImageResponder::new(store, converter, ResizerConfig::default())
    }

    async fn respond(responder: &ImageResponder, uri: &str, query: &str) -> CloudFrontResponse {
        responder
            .handle(&CloudFrontRequest::new(uri, query), CloudFrontResponse::default())
            .await
    }

    fn decode_body(response: &CloudFrontResponse, format: ImageFormat) -> DynamicImage {
        assert_eq!(response.body_encoding, Some(BodyEncoding::Base64));
        let bytes = STANDARD.decode(response.body.as_deref().unwrap()).unwrap();
        image::load_from_memory_with_format(&bytes, format).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_extension_without_fetch() {
        let store = Arc::new(MemoryStore::default().with_object("docs/a.gif", png(10, 10)));
        let responder = responder(store.clone(), Arc::new(UnavailableHeicConverter));

        for (uri, extension) in [("/docs/a.gif", "gif"), ("/docs/a.JPG", "JPG"), ("/docs/a.", "")] {
            let response = respond(&responder, uri, "w=10").await;
            assert_eq!(response.status, "500");
            assert_eq!(response.header("Content-Type"), Some("text/plain"));
            assert_eq!(response.body, Some(format!("{} is not allowed", extension)));
            assert_eq!(response.body_encoding, Some(BodyEncoding::Text));
        }
        assert_eq!(store.fetches(), 0);
    }

    #[tokio::test]
    async fn test_uri_without_extension_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let responder = responder(store.clone(), Arc::new(UnavailableHeicConverter));

        let response = respond(&responder, "/photos/cat", "").await;
        assert_eq!(response.status, "500");
        assert_eq!(response.body.as_deref(), Some(" is not allowed"));
        assert_eq!(store.fetches(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let responder = responder(store.clone(), Arc::new(UnavailableHeicConverter));

        let response = respond(&responder, "/path/foo.png", "").await;
        assert_eq!(response.status, "404");
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.body.as_deref(), Some("/path/foo.png is not found."));
        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_object_is_not_found() {
        let store = Arc::new(MemoryStore::default().with_object("path/broken.jpg", b"nope".to_vec()));
        let responder = responder(store, Arc::new(UnavailableHeicConverter));

        let outcome = responder
            .resize(&CloudFrontRequest::new("/path/broken.jpg", ""))
            .await;
        assert!(matches!(
            outcome,
            ResizeOutcome::ProcessingFailure {
                cause: ResizeFailure::Processing(ProcessingError::Decode(_)),
                ..
            }
        ));
        assert_eq!(outcome.status(), 404);
    }

    #[tokio::test]
    async fn test_heic_conversion_failure_is_not_found() {
        let store = Arc::new(MemoryStore::default().with_object("photos/cat.heic", vec![0; 16]));
        let responder = responder(store, Arc::new(UnavailableHeicConverter));

        let response = respond(&responder, "/photos/cat.heic", "").await;
        assert_eq!(response.status, "404");
        assert_eq!(response.body.as_deref(), Some("/photos/cat.heic is not found."));
    }

    #[tokio::test]
    async fn test_heic_is_converted_then_served_as_jpeg() {
        let store = Arc::new(MemoryStore::default().with_object("photos/cat.heic", vec![0; 16]));
        let converter = Arc::new(FakeHeicConverter::new(1800, 1200));
        let responder = responder(store, converter.clone());

        let response = respond(&responder, "/photos/cat.heic", "").await;
        assert_eq!(response.status, "200");
        assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
        assert_eq!(converter.calls(), vec![1.0]);

        let out = decode_body(&response, ImageFormat::Jpeg);
        assert_eq!(out.dimensions(), (1500, 1000));
    }

    #[cfg(feature = "heic")]
    #[tokio::test]
    async fn test_real_heic_is_served_as_jpeg() {
        use crate::heic::{testing::encode_heic, LibHeifConverter};

        let store = Arc::new(MemoryStore::default().with_object("photos/cat.heic", encode_heic(300, 200)));
        let responder = responder(store, Arc::new(LibHeifConverter::new()));

        let response = respond(&responder, "/photos/cat.heic", "w=150").await;
        assert_eq!(response.status, "200");
        assert_eq!(response.header("Content-Type"), Some("image/jpeg"));

        let out = decode_body(&response, ImageFormat::Jpeg);
        assert_eq!(out.dimensions(), (150, 100));
    }

    #[tokio::test]
    async fn test_webp_stays_webp() {
        let store = Arc::new(MemoryStore::default().with_object("icons/logo.webp", webp(200, 200)));
        let converter = Arc::new(FakeHeicConverter::new(1, 1));
        let responder = responder(store, converter.clone());

        let response = respond(&responder, "/icons/logo.webp", "w=50&h=50").await;
        assert_eq!(response.status, "200");
        assert_eq!(response.header("Content-Type"), Some("image/webp"));
        assert!(converter.calls().is_empty());

        let out = decode_body(&response, ImageFormat::WebP);
        assert_eq!(out.dimensions(), (50, 50));
    }

    #[tokio::test]
    async fn test_png_becomes_jpeg_without_upscaling() {
        let store = Arc::new(MemoryStore::default().with_object("small.png", png(120, 80)));
        let responder = responder(store, Arc::new(UnavailableHeicConverter));

        let response = respond(&responder, "/small.png", "w=1000&h=1000").await;
        assert_eq!(response.header("Content-Type"), Some("image/jpeg"));

        let out = decode_body(&response, ImageFormat::Jpeg);
        assert_eq!(out.dimensions(), (120, 80));
    }

    #[tokio::test]
    async fn test_oversized_and_invalid_bounds_fall_back_to_max() {
        let store = Arc::new(
            MemoryStore::default()
                .with_object("wide.jpg", encode(DynamicImage::new_rgb8(2000, 400), ImageFormat::Jpeg))
                .with_object("tall.jpeg", png(100, 1600)),
        );
        let responder = responder(store, Arc::new(UnavailableHeicConverter));

        let response = respond(&responder, "/wide.jpg", "w=5000").await;
        let out = decode_body(&response, ImageFormat::Jpeg);
        assert_eq!(out.dimensions(), (1500, 300));

        let response = respond(&responder, "/tall.jpeg", "w=abc&h=-4").await;
        let out = decode_body(&response, ImageFormat::Jpeg);
        assert_eq!(out.dimensions(), (94, 1500));
    }

    #[tokio::test]
    async fn test_identical_requests_are_byte_identical() {
        let store = Arc::new(MemoryStore::default().with_object("a/b.png", png(300, 200)));
        let responder = responder(store, Arc::new(UnavailableHeicConverter));

        let first = respond(&responder, "/a/b.png", "w=100").await;
        let second = respond(&responder, "/a/b.png", "w=100").await;
        assert_eq!(first.status, "200");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_keeps_unrelated_origin_fields() {
        let store = Arc::new(MemoryStore::default().with_object("a/b.png", png(10, 10)));
        let responder = responder(store, Arc::new(UnavailableHeicConverter));

        let mut base = CloudFrontResponse {
            status: "403".to_string(),
            status_description: Some("Forbidden".to_string()),
            ..Default::default()
        };
        base.set_header("X-Amz-Request-Id", "ABC");
        base.set_header("Content-Type", "application/xml");

        let response = responder
            .handle(&CloudFrontRequest::new("/a/b.png", ""), base)
            .await;
        assert_eq!(response.status, "200");
        assert_eq!(response.status_description.as_deref(), Some("OK"));
        assert_eq!(response.header("x-amz-request-id"), Some("ABC"));
        assert_eq!(
            response.headers.get("content-type"),
            Some(&vec![HeaderEntry {
                key: Some("Content-Type".to_string()),
                value: "image/jpeg".to_string(),
            }])
        );
    }
}
