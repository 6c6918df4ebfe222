use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    averaged_rating, Item, ItemChanges, ItemFilter, NewItem, Page, SearchQuery, User, UserChanges,
};
use super::store::{Store, StoreError};

/// In-process store used in development and tests. Each write holds the lock for the
/// duration of its guard check, which gives the same compare-and-set semantics as the
/// conditional SQL updates.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    // Insertion order is kept so equal timestamps still sort newest first.
    items: RwLock<Vec<Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut items: Vec<Item>) -> Vec<Item> {
    items.reverse();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Conflict(format!("email {}", user.email)));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            changes.apply(user);
            user.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn apply_rating(&self, id: Uuid, given: f64) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.rating = averaged_rating(user.rating, given);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn insert_item(&self, item: NewItem) -> Result<Item, StoreError> {
        let item = item.into_item();
        self.items.write().await.push(item.clone());
        Ok(item)
    }

    async fn find_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        Ok(self.items.read().await.iter().find(|i| i.id == id).cloned())
    }

    async fn view_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter_mut()
            .find(|i| i.id == id && !i.is_deleted)
            .map(|item| {
                item.views += 1;
                item.clone()
            }))
    }

    async fn list_items(&self, filter: &ItemFilter, page: Page) -> Result<(Vec<Item>, u64), StoreError> {
        let matching: Vec<Item> = self
            .items
            .read()
            .await
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let page_items = newest_first(matching)
            .into_iter()
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .collect();
        Ok((page_items, total))
    }

    async fn search_items(&self, query: &SearchQuery, limit: u64) -> Result<Vec<Item>, StoreError> {
        let matching: Vec<Item> = self
            .items
            .read()
            .await
            .iter()
            .filter(|i| query.matches(i))
            .cloned()
            .collect();
        Ok(newest_first(matching).into_iter().take(limit as usize).collect())
    }

    async fn items_by_reporter(&self, reporter: Uuid) -> Result<Vec<Item>, StoreError> {
        let matching: Vec<Item> = self
            .items
            .read()
            .await
            .iter()
            .filter(|i| i.reported_by == reporter && !i.is_deleted)
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn update_item(&self, id: Uuid, reporter: Uuid, changes: ItemChanges) -> Result<Option<Item>, StoreError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter_mut()
            .find(|i| i.id == id && i.reported_by == reporter)
            .map(|item| {
                changes.apply(item);
                item.clone()
            }))
    }

    async fn claim_item(&self, id: Uuid, claimant: Uuid) -> Result<Option<Item>, StoreError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter_mut()
            .find(|i| i.id == id && !i.is_deleted && !i.is_resolved && i.claimed_by.is_none())
            .map(|item| {
                item.claimed_by = Some(claimant);
                item.updated_at = Utc::now();
                item.clone()
            }))
    }

    async fn unclaim_item(&self, id: Uuid, claimant: Uuid) -> Result<Option<Item>, StoreError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter_mut()
            .find(|i| i.id == id && !i.is_deleted && !i.is_resolved && i.claimed_by == Some(claimant))
            .map(|item| {
                item.claimed_by = None;
                item.updated_at = Utc::now();
                item.clone()
            }))
    }

    async fn resolve_item(&self, id: Uuid, reporter: Uuid) -> Result<Option<Item>, StoreError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter_mut()
            .find(|i| i.id == id && !i.is_deleted && i.reported_by == reporter && i.claimed_by.is_some())
            .map(|item| {
                item.is_resolved = true;
                item.updated_at = Utc::now();
                item.clone()
            }))
    }

    async fn verify_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter_mut()
            .find(|i| i.id == id && !i.is_deleted)
            .map(|item| {
                item.is_verified = true;
                item.updated_at = Utc::now();
                item.clone()
            }))
    }

    async fn soft_delete_item(&self, id: Uuid, reporter: Uuid) -> Result<bool, StoreError> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|i| i.id == id && i.reported_by == reporter) {
            Some(item) => {
                item.is_deleted = true;
                item.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
