//! S3-compatible blob store

use super::{BlobMetadata, BlobObject, BlobStore};
use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use axum::body::Body;
use bytes::Bytes;
use futures::stream;

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Build a client from configuration. Static credentials are used when
    /// both keys are set; otherwise the default provider chain applies.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "compendium-config",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(bucket = %config.bucket, endpoint = ?config.endpoint, "S3 blob store configured");

        Ok(Self::with_client(Client::from_conf(builder.build()), config.bucket.clone()))
    }

    /// Create with an existing client
    pub fn with_client(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn head(&self, key: &str) -> Result<Option<BlobMetadata>> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => Ok(Some(BlobMetadata {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                content_type: output.content_type().map(String::from),
                etag: output.e_tag().map(String::from),
            })),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(AppError::BlobStore {
                        message: format!("head {} failed: {}", key, DisplayErrorContext(&service_err)),
                    })
                }
            }
        }
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::BlobStore {
                message: format!("put {} failed: {}", key, DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<BlobObject>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(AppError::BlobStore {
                    message: format!("get {} failed: {}", key, DisplayErrorContext(&service_err)),
                });
            }
        };

        let metadata = BlobMetadata {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(String::from),
            etag: output.e_tag().map(String::from),
        };

        // Hand chunks to the response as they arrive from the store
        let chunks = stream::unfold(output.body, |mut body| async move {
            body.next().await.map(|chunk| (chunk, body))
        });

        Ok(Some(BlobObject {
            metadata,
            body: Body::from_stream(chunks),
        }))
    }
}
