use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub rating: f64,
    pub profileimg: String,
    pub coverimg: String,
    pub bio: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            rating: 0.0,
            profileimg: String::new(),
            coverimg: String::new(),
            bio: String::new(),
            link: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Self-service profile changes. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profileimg: Option<String>,
    pub coverimg: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.bio.is_none()
            && self.link.is_none()
            && self.profileimg.is_none()
            && self.coverimg.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(bio) = &self.bio {
            user.bio = bio.clone();
        }
        if let Some(link) = &self.link {
            user.link = link.clone();
        }
        if let Some(profileimg) = &self.profileimg {
            user.profileimg = profileimg.clone();
        }
        if let Some(coverimg) = &self.coverimg {
            user.coverimg = coverimg.clone();
        }
        user.updated_at = Utc::now();
    }
}

/// Running-average reputation update applied when a reporter resolves a claim.
pub fn averaged_rating(current: f64, given: f64) -> f64 {
    (current + given) / 2.0
}
