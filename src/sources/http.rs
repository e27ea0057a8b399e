//! HTTP fetch plumbing shared by the external and social backends.
//!
//! Every remote fetch validates the response content type against the
//! recognized input image formats before the body is accepted; a remote
//! that answers with HTML or JSON surfaces as a 502 rather than a decode
//! failure deeper in the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use super::{FetchedImage, Source};
use crate::codec::format;
use crate::error::PipelineError;

/// Shared HTTP client for all remote backends.
pub fn build_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))
}

/// Fetch image bytes from a URL, mapping status and content type onto the
/// pipeline error taxonomy.
pub(crate) async fn fetch_image_url(
    client: &reqwest::Client,
    url: &str,
) -> Result<Bytes, PipelineError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::upstream(format!("request to {}: {}", url, e)))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(PipelineError::NotFound);
    }
    if !status.is_success() {
        return Err(PipelineError::upstream(format!(
            "{} answered {}",
            url, status
        )));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !is_image_content_type(&content_type) {
        return Err(PipelineError::InvalidContentType { content_type });
    }

    response
        .bytes()
        .await
        .map_err(|e| PipelineError::upstream(format!("body read from {}: {}", url, e)))
}

/// `image/<subtype>` where the subtype is a recognized input format.
/// Parameters after a `;` are ignored.
fn is_image_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.strip_prefix("image/") {
        Some(subtype) => format::is_valid_input_subtype(subtype),
        None => false,
    }
}

/// A configured remote backend: the source path is appended to a fixed URL
/// prefix.
#[derive(Debug)]
pub struct ExternalSource {
    name: String,
    prefix: String,
    client: reqwest::Client,
}

impl ExternalSource {
    pub fn new(name: String, prefix: String, client: reqwest::Client) -> Self {
        Self {
            name,
            prefix,
            client,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.prefix.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Source for ExternalSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, path: &str) -> Result<FetchedImage, PipelineError> {
        let url = self.url_for(path);
        let bytes = fetch_image_url(&self.client, &url).await?;
        Ok(FetchedImage::new(bytes))
    }
}
