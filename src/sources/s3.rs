//! S3 backend: source paths map directly to object keys in the configured
//! bucket. The client is built lazily on first use so startup never blocks
//! on credential resolution.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tokio::sync::OnceCell;

use super::{FetchedImage, Source};
use crate::config::S3SourceConfig;
use crate::error::PipelineError;

#[derive(Debug)]
pub struct S3Source {
    config: S3SourceConfig,
    client: OnceCell<Client>,
}

impl S3Source {
    pub fn new(config: S3SourceConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::from_env();
                if let Some(region) = &self.config.region {
                    loader = loader.region(aws_config::Region::new(region.clone()));
                }
                let shared = loader.load().await;

                let mut builder = aws_sdk_s3::config::Builder::from(&shared);
                if let Some(endpoint) = &self.config.endpoint {
                    // Path-style addressing for MinIO and other compatible stores
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Client::from_conf(builder.build())
            })
            .await
    }
}

#[async_trait]
impl Source for S3Source {
    fn name(&self) -> &str {
        "s3"
    }

    async fn fetch(&self, path: &str) -> Result<FetchedImage, PipelineError> {
        let response = self
            .client()
            .await
            .get_object()
            .bucket(&self.config.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    PipelineError::NotFound
                } else {
                    PipelineError::upstream(format!("s3 get_object: {}", service_error))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::upstream(format!("s3 body read: {}", e)))?;

        Ok(FetchedImage::new(data.into_bytes()))
    }
}
