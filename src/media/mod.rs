//! Image hosting behind the `MediaStore` trait.
//!
//! Stored records only keep the public URL of each image. The storage identifier needed for
//! deletion is recovered from that URL with [`public_id_from_url`].

pub mod cloudinary;
pub mod memory;

use async_trait::async_trait;
use axum::body::Bytes;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{MediaConfig, MediaProvider};

pub use cloudinary::CloudinaryMediaStore;
pub use memory::MemoryMediaStore;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media service rejected the request: {0}")]
    Rejected(String),

    #[error("media service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected media service response: {0}")]
    InvalidResponse(String),
}

/// An image received from a client, already size- and type-checked.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub public_id: String,
    pub secure_url: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores an image under `folder`. A `public_id` pins the storage name; otherwise the
    /// service picks one.
    async fn upload(&self, image: &ImageUpload, folder: &str, public_id: Option<&str>) -> Result<MediaAsset, MediaError>;

    /// Removes the image identified by `folder/name`.
    async fn delete(&self, public_id: &str) -> Result<(), MediaError>;
}

/// Builds the configured media store.
pub fn open_media(config: &MediaConfig) -> Result<Arc<dyn MediaStore>, MediaError> {
    match config.provider {
        MediaProvider::Cloudinary => Ok(Arc::new(CloudinaryMediaStore::new(config)?)),
        MediaProvider::Memory => {
            tracing::warn!("Using the in-memory media store; uploaded images are not persisted");
            Ok(Arc::new(MemoryMediaStore::new()))
        }
    }
}

/// Recovers the storage name from a hosted URL: last path segment without its extension.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    let file_name = path.rsplit('/').next()?;
    let stem = file_name.split('.').next()?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Deletes every image in `urls` from `folder`, logging failures instead of returning them.
pub async fn delete_best_effort(media: &dyn MediaStore, folder: &str, urls: &[String]) {
    for url in urls {
        let Some(name) = public_id_from_url(url) else {
            continue;
        };
        let public_id = format!("{}/{}", folder, name);
        if let Err(e) = media.delete(&public_id).await {
            tracing::warn!("Failed to delete media '{}': {}", public_id, e);
        }
    }
}

/// Uploads `images` one after another. On the first failure the images this call already
/// stored are deleted best-effort and the error is returned.
pub async fn upload_all(media: &dyn MediaStore, folder: &str, images: &[ImageUpload]) -> Result<Vec<MediaAsset>, MediaError> {
    let mut stored = Vec::with_capacity(images.len());
    for image in images {
        match media.upload(image, folder, None).await {
            Ok(asset) => stored.push(asset),
            Err(e) => {
                discard(media, &stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

/// Best-effort removal of assets uploaded by a request that did not complete.
pub async fn discard(media: &dyn MediaStore, assets: &[MediaAsset]) {
    for asset in assets {
        if let Err(e) = media.delete(&asset.public_id).await {
            tracing::warn!("Failed to discard media '{}': {}", asset.public_id, e);
        }
    }
}
