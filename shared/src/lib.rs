pub mod config;
pub mod heic;
pub mod image_key;
pub mod image_processing;
pub mod query;
pub mod responder;
pub mod storage;
pub mod types;

use aws_sdk_s3::Client as S3Client;
use config::ResizerConfig;
use heic::HeicConverter;
use responder::ImageResponder;
use std::sync::Arc;
use storage::S3ObjectStore;

/// Shared application state, built once per container
pub struct AppState {
    pub responder: ImageResponder,
}

impl AppState {
    pub fn new(
        s3_client: S3Client,
        converter: Arc<dyn HeicConverter>,
        config: ResizerConfig,
    ) -> Arc<Self> {
        let store = S3ObjectStore::new(s3_client, config.bucket.clone());
        Arc::new(Self {
            responder: ImageResponder::new(Arc::new(store), converter, config),
        })
    }
}
