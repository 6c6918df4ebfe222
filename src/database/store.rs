use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::{Item, ItemChanges, ItemFilter, NewItem, Page, SearchQuery, User, UserChanges};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate record: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence for users and items.
///
/// Every conditional operation (`claim_item`, `unclaim_item`, `resolve_item`, ...) applies its
/// guard and its write as one step and returns `None` when the guard no longer holds, so a
/// concurrent writer can never overwrite a transition it did not observe.
#[async_trait]
pub trait Store: Send + Sync {
    // Users

    /// Fails with `StoreError::Conflict` when the (already normalized) email is taken.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError>;
    /// Atomically sets `rating = (rating + given) / 2`.
    async fn apply_rating(&self, id: Uuid, given: f64) -> Result<Option<User>, StoreError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    // Items

    async fn insert_item(&self, item: NewItem) -> Result<Item, StoreError>;
    /// Raw lookup, soft-deleted items included.
    async fn find_item(&self, id: Uuid) -> Result<Option<Item>, StoreError>;
    /// Increments the view counter of a live item and returns it.
    async fn view_item(&self, id: Uuid) -> Result<Option<Item>, StoreError>;
    /// Newest first, with the total number of matches ignoring the page.
    async fn list_items(&self, filter: &ItemFilter, page: Page) -> Result<(Vec<Item>, u64), StoreError>;
    async fn search_items(&self, query: &SearchQuery, limit: u64) -> Result<Vec<Item>, StoreError>;
    async fn items_by_reporter(&self, reporter: Uuid) -> Result<Vec<Item>, StoreError>;

    async fn update_item(&self, id: Uuid, reporter: Uuid, changes: ItemChanges) -> Result<Option<Item>, StoreError>;
    /// Sets the claimant if the item is live, unresolved and unclaimed.
    async fn claim_item(&self, id: Uuid, claimant: Uuid) -> Result<Option<Item>, StoreError>;
    /// Clears the claimant if it is still `claimant` and the item is unresolved.
    async fn unclaim_item(&self, id: Uuid, claimant: Uuid) -> Result<Option<Item>, StoreError>;
    /// Marks resolved if the item is live, reported by `reporter` and has a claimant.
    async fn resolve_item(&self, id: Uuid, reporter: Uuid) -> Result<Option<Item>, StoreError>;
    async fn verify_item(&self, id: Uuid) -> Result<Option<Item>, StoreError>;
    async fn soft_delete_item(&self, id: Uuid, reporter: Uuid) -> Result<bool, StoreError>;
}
