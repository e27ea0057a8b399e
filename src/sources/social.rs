//! Social thumbnail backends.
//!
//! These backends treat the image name as an account or video id and fetch
//! the platform's thumbnail. Upstream content can change under the same id,
//! so every social fetch carries the short cache-lifetime override.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;

use super::http::fetch_image_url;
use super::{FetchedImage, Source};
use crate::error::PipelineError;

/// Everything before the last `.`, so `some.user.jpg` reads as `some.user`.
fn id_with_dots(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Everything before the first `.`.
fn id_before_dot(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Profile pictures from the Facebook Graph API.
#[derive(Debug)]
pub struct FacebookSource {
    client: reqwest::Client,
    expiry_seconds: u64,
}

impl FacebookSource {
    pub fn new(client: reqwest::Client, expiry_seconds: u64) -> Self {
        Self {
            client,
            expiry_seconds,
        }
    }
}

#[async_trait]
impl Source for FacebookSource {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn fetch(&self, path: &str) -> Result<FetchedImage, PipelineError> {
        // Account names may themselves contain dots
        let uid = id_with_dots(path);
        let url = format!("https://graph.facebook.com/{}/picture?type=large", uid);
        let bytes = fetch_image_url(&self.client, &url).await?;
        Ok(FetchedImage::with_expiry(bytes, self.expiry_seconds))
    }
}

/// Video thumbnails from the YouTube static image host.
#[derive(Debug)]
pub struct YoutubeSource {
    client: reqwest::Client,
    expiry_seconds: u64,
}

impl YoutubeSource {
    pub fn new(client: reqwest::Client, expiry_seconds: u64) -> Self {
        Self {
            client,
            expiry_seconds,
        }
    }
}

#[async_trait]
impl Source for YoutubeSource {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn fetch(&self, path: &str) -> Result<FetchedImage, PipelineError> {
        let video_id = id_before_dot(path);
        let url = format!("http://img.youtube.com/vi/{}/hqdefault.jpg", video_id);
        let bytes = fetch_image_url(&self.client, &url).await?;
        Ok(FetchedImage::with_expiry(bytes, self.expiry_seconds))
    }
}

#[derive(Debug, Deserialize)]
struct VimeoVideo {
    thumbnail_large: String,
}

/// Video thumbnails via the Vimeo v2 API. The id-to-thumbnail-URL lookup is
/// cached so repeated requests for the same video skip the API round trip.
#[derive(Debug)]
pub struct VimeoSource {
    client: reqwest::Client,
    expiry_seconds: u64,
    thumbnail_urls: Cache<String, String>,
}

impl VimeoSource {
    pub fn new(client: reqwest::Client, expiry_seconds: u64) -> Self {
        let thumbnail_urls = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(expiry_seconds))
            .build();
        Self {
            client,
            expiry_seconds,
            thumbnail_urls,
        }
    }

    async fn resolve_thumbnail_url(&self, video_id: &str) -> Result<String, PipelineError> {
        if let Some(cached) = self.thumbnail_urls.get(video_id).await {
            return Ok(cached);
        }

        let api_url = format!("http://vimeo.com/api/v2/video/{}.json", video_id);
        let response = self
            .client
            .get(&api_url)
            .send()
            .await
            .map_err(|e| PipelineError::upstream(format!("vimeo api: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound);
        }
        if !response.status().is_success() {
            return Err(PipelineError::upstream(format!(
                "vimeo api answered {}",
                response.status()
            )));
        }

        let videos: Vec<VimeoVideo> = response
            .json()
            .await
            .map_err(|e| PipelineError::upstream(format!("vimeo api body: {}", e)))?;
        let video = videos.first().ok_or(PipelineError::NotFound)?;

        // Stripping the size suffix yields the full-resolution image
        let url = video.thumbnail_large.replace("_640.jpg", "");

        self.thumbnail_urls
            .insert(video_id.to_string(), url.clone())
            .await;
        Ok(url)
    }
}

#[async_trait]
impl Source for VimeoSource {
    fn name(&self) -> &str {
        "vimeo"
    }

    async fn fetch(&self, path: &str) -> Result<FetchedImage, PipelineError> {
        let video_id = id_before_dot(path);
        let url = self.resolve_thumbnail_url(video_id).await?;
        let bytes = fetch_image_url(&self.client, &url).await?;
        Ok(FetchedImage::with_expiry(bytes, self.expiry_seconds))
    }
}
