use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::{User, UserChanges};
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::media::{self, ImageUpload, MediaStore};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Not authorized to {0} this user")]
    NotSelf(&'static str),

    #[error("Name must be at least 2 characters")]
    NameTooShort,

    #[error("No valid fields to update")]
    NothingToUpdate,

    #[error("{label} image upload failed: {message}")]
    Upload { label: &'static str, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => ApiError::not_found(err.to_string()),
            UserError::NotSelf(_) => ApiError::forbidden(err.to_string()),
            UserError::Store(e) => ApiError::from(e),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

/// Self-service profile edit as submitted.
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profileimg: Option<ImageUpload>,
    pub coverimg: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct UserService {
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    media: Arc<dyn MediaStore>,
}

impl UserService {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn Store>, media: Arc<dyn MediaStore>) -> Self {
        Self { config, store, media }
    }

    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        Ok(self.store.list_users().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, UserError> {
        self.store.find_user(id).await?.ok_or(UserError::NotFound)
    }

    pub async fn update(&self, caller: Uuid, id: Uuid, input: UserInput) -> Result<User, UserError> {
        if caller != id {
            return Err(UserError::NotSelf("update"));
        }

        let name = match input.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.chars().count() < 2 {
                    return Err(UserError::NameTooShort);
                }
                Some(name)
            }
            None => None,
        };
        let mut changes = UserChanges {
            name,
            bio: input.bio,
            link: input.link,
            ..Default::default()
        };

        if input.profileimg.is_some() || input.coverimg.is_some() {
            let current = self.store.find_user(id).await?.ok_or(UserError::NotFound)?;
            let folders = &self.config.media;
            if let Some(image) = &input.profileimg {
                let url = self
                    .replace_image(image, &folders.profiles_folder, &format!("profile-{}", id), &current.profileimg)
                    .await
                    .map_err(|message| UserError::Upload {
                        label: "Profile",
                        message,
                    })?;
                changes.profileimg = Some(url);
            }
            if let Some(image) = &input.coverimg {
                let url = self
                    .replace_image(image, &folders.covers_folder, &format!("cover-{}", id), &current.coverimg)
                    .await
                    .map_err(|message| UserError::Upload { label: "Cover", message })?;
                changes.coverimg = Some(url);
            }
        }

        if changes.is_empty() {
            return Err(UserError::NothingToUpdate);
        }
        self.store.update_user(id, changes).await?.ok_or(UserError::NotFound)
    }

    /// Hard delete. The user's item reports stay behind.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), UserError> {
        if caller != id {
            return Err(UserError::NotSelf("delete"));
        }
        if !self.store.delete_user(id).await? {
            return Err(UserError::NotFound);
        }
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    /// Deletes the previous image best-effort, then uploads under a fixed public id.
    async fn replace_image(&self, image: &ImageUpload, folder: &str, public_id: &str, old_url: &str) -> Result<String, String> {
        if !old_url.is_empty() {
            media::delete_best_effort(self.media.as_ref(), folder, &[old_url.to_string()]).await;
        }
        self.media
            .upload(image, folder, Some(public_id))
            .await
            .map(|asset| asset.secure_url)
            .map_err(|e| e.to_string())
    }
}
