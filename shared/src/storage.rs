use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage error: {0}")]
    Backend(String),
}

/// Read-only access to original images
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// S3 bucket holding the originals
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Backend(format!("Failed to get object from S3: {}", service_error))
                }
            })?;

        let body_bytes = result
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read S3 body: {}", e)))?
            .into_bytes();

        Ok(body_bytes.to_vec())
    }
}
