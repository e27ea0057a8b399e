//! Image source backends
//!
//! A source turns a canonical source path into raw image bytes. Backends are
//! registered once at startup; the registry resolves the directive's source
//! override (or the configured default) to a backend, enforcing the exclusion
//! list before any fetch is attempted.

pub mod http;
pub mod local;
pub mod s3;
pub mod social;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::Config;
use crate::error::PipelineError;

/// Raw bytes from a backend, plus an optional cache-lifetime override for
/// backends whose upstream content mutates.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub expiry_override: Option<u64>,
}

impl FetchedImage {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            expiry_override: None,
        }
    }

    pub fn with_expiry(bytes: Bytes, seconds: u64) -> Self {
        Self {
            bytes,
            expiry_override: Some(seconds),
        }
    }
}

/// A backend that can produce image bytes for a source path.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    async fn fetch(&self, path: &str) -> Result<FetchedImage, PipelineError>;
}

/// Name-to-backend mapping built from configuration, frozen after startup.
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
    default: String,
    excluded: Vec<String>,
}

impl SourceRegistry {
    /// Wire up every configured backend. The social backends are always
    /// available; `s3` only exists when a bucket is configured.
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let mut sources: HashMap<String, Arc<dyn Source>> = HashMap::new();

        let local_root = config
            .sources
            .local
            .as_ref()
            .map(|l| l.root.clone())
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        sources.insert(
            "local".to_string(),
            Arc::new(local::LocalSource::new(local_root)),
        );

        if let Some(s3_config) = &config.sources.s3 {
            sources.insert(
                "s3".to_string(),
                Arc::new(s3::S3Source::new(s3_config.clone())),
            );
        }

        let client = http::build_client()?;
        let short_expiry = config.images.expiry_seconds_short;

        sources.insert(
            "facebook".to_string(),
            Arc::new(social::FacebookSource::new(client.clone(), short_expiry)),
        );
        sources.insert(
            "youtube".to_string(),
            Arc::new(social::YoutubeSource::new(client.clone(), short_expiry)),
        );
        sources.insert(
            "vimeo".to_string(),
            Arc::new(social::VimeoSource::new(client.clone(), short_expiry)),
        );

        for (name, prefix) in &config.sources.external {
            sources.insert(
                name.clone(),
                Arc::new(http::ExternalSource::new(
                    name.clone(),
                    prefix.clone(),
                    client.clone(),
                )),
            );
        }

        Ok(Self {
            sources,
            default: config.sources.default.clone(),
            excluded: config.sources.excluded.clone(),
        })
    }

    /// Resolve a backend for the request. The exclusion list is consulted
    /// before existence so a blocked name never reveals whether it is
    /// configured.
    pub fn resolve(&self, requested: Option<&str>) -> Result<Arc<dyn Source>, PipelineError> {
        let name = requested.unwrap_or(&self.default);

        if self.excluded.iter().any(|e| e == name) {
            return Err(PipelineError::Forbidden {
                source: name.to_string(),
            });
        }

        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidSource {
                source: name.to_string(),
            })
    }

    pub fn default_source(&self) -> &str {
        &self.default
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.name().to_string(), source);
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.sources.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("SourceRegistry")
            .field("sources", &names)
            .field("default", &self.default)
            .field("excluded", &self.excluded)
            .finish()
    }
}
