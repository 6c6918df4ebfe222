use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ImageUpload, MediaAsset, MediaError, MediaStore};

const BASE_URL: &str = "https://media.local";

/// Keeps uploaded images in memory. Used when no media provider is configured, and by tests
/// (which can force failures to exercise the best-effort paths).
pub struct MemoryMediaStore {
    objects: RwLock<HashMap<String, usize>>,
    deleted: RwLock<Vec<String>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
    /// Uploads still allowed before failing; `usize::MAX` means unlimited.
    upload_budget: AtomicUsize,
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self {
            objects: RwLock::default(),
            deleted: RwLock::default(),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            upload_budget: AtomicUsize::new(usize::MAX),
        }
    }
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Lets the next `count` uploads succeed and fails the ones after.
    pub fn fail_uploads_after(&self, count: usize) {
        self.upload_budget.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, public_id: &str) -> bool {
        self.objects.read().await.contains_key(public_id)
    }

    pub async fn stored_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Public ids passed to `delete`, in call order, including failed attempts.
    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, image: &ImageUpload, folder: &str, public_id: Option<&str>) -> Result<MediaAsset, MediaError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(MediaError::Rejected("uploads are disabled".to_string()));
        }
        let budget = self
            .upload_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            });
        if budget.is_err() {
            return Err(MediaError::Rejected("upload quota exhausted".to_string()));
        }

        let name = public_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let public_id = format!("{}/{}", folder, name);
        let secure_url = format!("{}/{}.{}", BASE_URL, public_id, extension_for(&image.content_type));

        self.objects.write().await.insert(public_id.clone(), image.data.len());
        Ok(MediaAsset { public_id, secure_url })
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        self.deleted.write().await.push(public_id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MediaError::Rejected("deletes are disabled".to_string()));
        }
        self.objects.write().await.remove(public_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{delete_best_effort, public_id_from_url, upload_all};
    use axum::body::Bytes;

    fn png() -> ImageUpload {
        ImageUpload {
            file_name: "photo.png".into(),
            content_type: "image/png".into(),
            data: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[tokio::test]
    async fn uploaded_url_maps_back_to_public_id() {
        let media = MemoryMediaStore::new();
        let asset = media.upload(&png(), "findit/items", None).await.unwrap();
        assert!(asset.secure_url.ends_with(".png"));

        let name = public_id_from_url(&asset.secure_url).unwrap();
        assert_eq!(format!("findit/items/{}", name), asset.public_id);
        assert!(media.contains(&asset.public_id).await);
    }

    #[tokio::test]
    async fn best_effort_delete_swallows_failures() {
        let media = MemoryMediaStore::new();
        let asset = media.upload(&png(), "findit/profiles", Some("profile-1")).await.unwrap();
        media.set_fail_deletes(true);

        delete_best_effort(&media, "findit/profiles", &[asset.secure_url.clone()]).await;

        assert_eq!(media.deleted().await, vec!["findit/profiles/profile-1".to_string()]);
        assert!(media.contains("findit/profiles/profile-1").await);
    }

    #[tokio::test]
    async fn partial_batch_failure_discards_stored_images() {
        let media = MemoryMediaStore::new();
        media.fail_uploads_after(2);

        let err = upload_all(&media, "findit/items", &[png(), png(), png()]).await.unwrap_err();
        assert!(err.to_string().contains("quota"));
        assert_eq!(media.stored_count().await, 0);
        assert_eq!(media.deleted().await.len(), 2);
    }
}
