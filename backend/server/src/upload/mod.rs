//! # Image Upload
//!
//! Every image host sits behind [`UploadBackend`]. Two strategies are built on top.
//!
//! ## Fallback chain
//! 1. Primary image host ([`cloudinary`])
//! 2. Secondary free host ([`imgbb`])
//! 3. Inline `data:` URL ([`inline`]), kept small since it ends up stored as text
//! 4. Placeholder image
//!
//! Each backend gets exactly one attempt. A failure is logged and the next backend is tried, so
//! a save never fails because of its image. Unconfigured hosts are simply left out of the chain.
//!
//! ## Single storage
//! One object storage bucket ([`storage`]) and no fallback. Its error codes are translated into
//! messages for the admin and returned as errors.
//!
//! Both strategies refuse anything that is not `image/*` or is over the configured size before
//! any backend is called.
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;
use tracing::{info, warn};

pub mod cloudinary;
pub mod imgbb;
pub mod inline;
pub mod storage;

use storage::StorageErrorCode;

pub const MB: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Selected file must be an image (got {0})")]
    NotAnImage(String),

    #[error("File must not be larger than {limit_mb} MB")]
    TooLarge { limit_mb: usize },

    #[error("Image upload failed: {0}")]
    Rejected(String),

    #[error("Image host unreachable: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected response from image host: {0}")]
    Malformed(String),

    #[error("{}", .0.message())]
    Storage(StorageErrorCode),
}

impl UploadError {
    /// Rejected before reaching any backend.
    pub fn is_rejected_locally(&self) -> bool {
        matches!(self, Self::NotAnImage(_) | Self::TooLarge { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn check(&self, limit: usize) -> Result<(), UploadError> {
        if !self.is_image() {
            return Err(UploadError::NotAnImage(self.content_type.clone()));
        }

        if self.bytes.len() > limit {
            return Err(UploadError::TooLarge {
                limit_mb: limit.div_ceil(MB),
            });
        }

        Ok(())
    }

    /// Extension from the file name, otherwise from the MIME subtype.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .filter(|extension| !extension.is_empty() && extension.chars().all(char::is_alphanumeric));

        let from_mime = || {
            self.content_type
                .split_once('/')
                .map(|(_, subtype)| subtype.split(['+', ';']).next().unwrap_or(subtype))
                .filter(|subtype| !subtype.is_empty())
                .unwrap_or("bin")
        };

        from_name.unwrap_or_else(from_mime).to_ascii_lowercase()
    }
}

#[async_trait]
pub trait UploadBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Largest accepted file in bytes.
    fn max_size(&self) -> usize;

    /// Returns a URL the storefront can display.
    async fn upload(&self, image: &ImageFile) -> Result<String, UploadError>;
}

pub struct UploadChain {
    backends: Vec<Arc<dyn UploadBackend>>,
    placeholder: String,
}

impl UploadChain {
    pub fn new(backends: Vec<Arc<dyn UploadBackend>>, placeholder: String) -> Self {
        Self {
            backends,
            placeholder,
        }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }

    /// Only a non-image file is an error, every backend failure ends in the placeholder.
    pub async fn upload(&self, image: &ImageFile) -> Result<String, UploadError> {
        if !image.is_image() {
            return Err(UploadError::NotAnImage(image.content_type.clone()));
        }

        for backend in &self.backends {
            info!("Trying {} upload...", backend.name());

            let attempt = match image.check(backend.max_size()) {
                Ok(()) => backend.upload(image).await,
                Err(e) => Err(e),
            };

            match attempt {
                Ok(url) => {
                    info!("{} upload successful", backend.name());
                    return Ok(url);
                }
                Err(e) => warn!("{} upload failed: {e}", backend.name()),
            }
        }

        warn!("All upload methods failed. Using placeholder image.");
        Ok(self.placeholder.clone())
    }
}

enum Strategy {
    Chain(UploadChain),
    Single(Arc<dyn UploadBackend>),
}

pub struct Uploader {
    strategy: Strategy,
    max_size: usize,
}

impl Uploader {
    pub fn fallback(chain: UploadChain, max_size: usize) -> Self {
        Self {
            strategy: Strategy::Chain(chain),
            max_size,
        }
    }

    pub fn single(backend: Arc<dyn UploadBackend>, max_size: usize) -> Self {
        Self {
            strategy: Strategy::Single(backend),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub async fn upload(&self, image: &ImageFile) -> Result<String, UploadError> {
        image.check(self.max_size)?;

        match &self.strategy {
            Strategy::Chain(chain) => chain.upload(image).await,
            Strategy::Single(backend) => {
                image.check(backend.max_size())?;
                let url = backend.upload(image).await?;
                info!("{} upload successful", backend.name());

                Ok(url)
            }
        }
    }
}
