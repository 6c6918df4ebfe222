//! Public JSON shapes for items and users.
//!
//! Items reference people by id in storage. On the way out those ids are replaced by small
//! user cards, the way listings and detail pages expect them.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::{Item, User};

/// Users referenced by a batch of items, keyed by id.
pub type People = HashMap<Uuid, User>;

/// Controls which references are replaced by cards.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardOptions {
    pub with_claimant: bool,
    /// Adds the reporter's `bio`, used on detail pages.
    pub reporter_bio: bool,
}

impl CardOptions {
    pub fn listing() -> Self {
        Self {
            with_claimant: true,
            reporter_bio: false,
        }
    }

    pub fn detail() -> Self {
        Self {
            with_claimant: true,
            reporter_bio: true,
        }
    }

    /// Search results carry the reporter card only.
    pub fn reporter_only() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

fn reporter_card(user: &User, with_bio: bool) -> Value {
    let mut card = json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "profileimg": user.profileimg,
        "rating": user.rating,
    });
    if with_bio {
        card["bio"] = json!(user.bio);
    }
    card
}

fn claimant_card(user: &User) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "profileimg": user.profileimg,
    })
}

/// Serializes an item and swaps `reportedBy` / `claimedBy` for cards. A reference to a user
/// that no longer exists becomes `null`.
pub fn item_to_api_value(item: &Item, people: &People, options: CardOptions) -> Value {
    let mut value = match serde_json::to_value(item) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Failed to serialize item {}: {}", item.id, e);
            return Value::Null;
        }
    };

    value["reportedBy"] = people
        .get(&item.reported_by)
        .map(|user| reporter_card(user, options.reporter_bio))
        .unwrap_or(Value::Null);

    if options.with_claimant {
        value["claimedBy"] = item
            .claimed_by
            .and_then(|id| people.get(&id))
            .map(claimant_card)
            .unwrap_or(Value::Null);
    }

    value
}

pub fn items_to_api_values(items: &[Item], people: &People, options: CardOptions) -> Vec<Value> {
    items
        .iter()
        .map(|item| item_to_api_value(item, people, options))
        .collect()
}

/// Ids of every user an item batch refers to, without duplicates.
pub fn referenced_people(items: &[Item], with_claimant: bool) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for item in items {
        if !ids.contains(&item.reported_by) {
            ids.push(item.reported_by);
        }
        if with_claimant {
            if let Some(claimant) = item.claimed_by {
                if !ids.contains(&claimant) {
                    ids.push(claimant);
                }
            }
        }
    }
    ids
}
