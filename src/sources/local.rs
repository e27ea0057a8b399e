//! Filesystem backend: source paths resolve under a configured root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{FetchedImage, Source};
use crate::error::PipelineError;

#[derive(Debug)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

/// Reject any path that could escape the root. Parent components are never
/// legitimate in a request path, so they read as a missing image rather
/// than an error that confirms the guess.
fn escapes_root(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

#[async_trait]
impl Source for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, path: &str) -> Result<FetchedImage, PipelineError> {
        if escapes_root(path) {
            return Err(PipelineError::NotFound);
        }

        let full = self.root.join(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(FetchedImage::new(Bytes::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PipelineError::NotFound),
            Err(e) => {
                // A path that resolves to a directory is a client mistake,
                // not a backend failure.
                match tokio::fs::metadata(&full).await {
                    Ok(meta) if !meta.is_file() => Err(PipelineError::NotFound),
                    _ => Err(PipelineError::upstream(format!(
                        "local read {}: {}",
                        full.display(),
                        e
                    ))),
                }
            }
        }
    }
}
