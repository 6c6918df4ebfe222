use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::api::{items_to_api_values, item_to_api_value, referenced_people, CardOptions, People};
use crate::config::AppConfig;
use crate::database::models::{
    Category, ContactMethod, Item, ItemChanges, ItemFilter, ItemType, Location, NewItem, Page, SearchQuery,
};
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::media::{self, ImageUpload, MediaStore};

pub const MIN_SEARCH_CHARS: usize = 2;

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Item not found")]
    NotFound,

    #[error("Not authorized to {0} this item")]
    NotAuthorized(&'static str),

    #[error("Item is already resolved")]
    AlreadyResolved,

    #[error("Item is already claimed")]
    AlreadyClaimed,

    #[error("Item is not claimed")]
    NotClaimed,

    #[error("No one has claimed this item yet")]
    NoClaimant,

    #[error("You cannot claim your own item")]
    SelfClaim,

    #[error("Not authorized to verify items")]
    NotVerifier,

    #[error("Missing required fields")]
    MissingFields,

    #[error("Type must be 'lost' or 'found'")]
    InvalidType,

    #[error("{0}")]
    Invalid(String),

    #[error("Search query must be at least 2 characters")]
    QueryTooShort,

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ItemError> for ApiError {
    fn from(err: ItemError) -> Self {
        match err {
            ItemError::NotFound => ApiError::not_found(err.to_string()),
            ItemError::NotAuthorized(_) | ItemError::SelfClaim | ItemError::NotVerifier => {
                ApiError::forbidden(err.to_string())
            }
            ItemError::Store(e) => ApiError::from(e),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

// Workflow guards. Each one mirrors the condition of the matching conditional write in the
// store, so a failed write can be explained by re-reading the item and running its guard.

pub fn check_claim(item: &Item, caller: Uuid, allow_self_claim: bool) -> Result<(), ItemError> {
    if item.is_deleted {
        return Err(ItemError::NotFound);
    }
    if item.is_resolved {
        return Err(ItemError::AlreadyResolved);
    }
    if item.claimed_by.is_some() {
        return Err(ItemError::AlreadyClaimed);
    }
    if !allow_self_claim && item.reported_by == caller {
        return Err(ItemError::SelfClaim);
    }
    Ok(())
}

pub fn check_unclaim(item: &Item, caller: Uuid) -> Result<(), ItemError> {
    if item.is_deleted {
        return Err(ItemError::NotFound);
    }
    match item.claimed_by {
        None => Err(ItemError::NotClaimed),
        Some(claimant) if claimant != caller => Err(ItemError::NotAuthorized("unclaim")),
        Some(_) if item.is_resolved => Err(ItemError::AlreadyResolved),
        Some(_) => Ok(()),
    }
}

pub fn check_resolve(item: &Item, caller: Uuid) -> Result<(), ItemError> {
    if item.is_deleted {
        return Err(ItemError::NotFound);
    }
    if item.reported_by != caller {
        return Err(ItemError::NotAuthorized("resolve"));
    }
    if item.claimed_by.is_none() {
        return Err(ItemError::NoClaimant);
    }
    Ok(())
}

pub fn check_verify(item: &Item, caller: Uuid, verifiers: &[Uuid]) -> Result<(), ItemError> {
    if item.is_deleted {
        return Err(ItemError::NotFound);
    }
    if !verifiers.is_empty() && !verifiers.contains(&caller) {
        return Err(ItemError::NotVerifier);
    }
    Ok(())
}

/// Update and delete only look at ownership; they do not check the deleted flag.
pub fn check_owner(item: &Item, caller: Uuid, action: &'static str) -> Result<(), ItemError> {
    if item.reported_by != caller {
        return Err(ItemError::NotAuthorized(action));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocationInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl LocationInput {
    fn into_location(self) -> Option<Location> {
        let name = self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
        Some(Location {
            name,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Item fields as submitted, before parsing. Used for both create and update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    #[validate(length(max = 120, message = "Title cannot exceed 120 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub category: Option<String>,
    pub location: Option<LocationInput>,
    pub date_occurred: Option<String>,
    pub contact_method: Option<String>,
    #[serde(skip)]
    pub images: Vec<ImageUpload>,
}

impl ItemInput {
    /// Trims text fields and drops the ones left empty.
    fn normalized(mut self) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.title = clean(self.title);
        self.description = clean(self.description);
        self.item_type = clean(self.item_type);
        self.category = clean(self.category);
        self.date_occurred = clean(self.date_occurred);
        self.contact_method = clean(self.contact_method);
        self
    }

    fn check_lengths(&self) -> Result<(), ItemError> {
        self.validate().map_err(|errors| {
            ItemError::Invalid(ApiError::from_validation(&errors, &["title", "description"]).message().to_string())
        })
    }
}

fn parse_field<T>(value: Option<&str>) -> Result<Option<T>, ItemError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| v.parse::<T>().map_err(|e| ItemError::Invalid(capitalize(&e.to_string()))))
        .transpose()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Accepts an RFC 3339 timestamp, a zone-less `YYYY-MM-DDTHH:MM:SS` (taken as UTC) or a
/// plain `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date_occurred(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Listing query string. Values stay raw so malformed numbers fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub category: Option<String>,
    pub is_resolved: Option<String>,
    pub is_verified: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        Self {
            total,
            page,
            limit,
            pages: total.div_ceil(limit.max(1)),
        }
    }
}

/// Rating sent with a resolve. Numbers and numeric strings are accepted; zero, non-finite or
/// anything else counts as "no rating".
pub fn given_rating(value: Option<&Value>) -> Option<f64> {
    let rating = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (rating.is_finite() && rating != 0.0).then_some(rating)
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// A query-string filter naming no known variant. Nothing can match it.
#[derive(Debug, PartialEq, Eq)]
struct NoMatch;

/// Blank values mean "no filter"; unknown ones match nothing instead of failing the request.
fn filter_value<T: std::str::FromStr>(raw: Option<&String>) -> Result<Option<T>, NoMatch> {
    match non_empty(raw) {
        None => Ok(None),
        Some(text) => text.parse::<T>().map(Some).map_err(|_| {
            tracing::debug!("Filter value '{}' matches no items", text);
            NoMatch
        }),
    }
}

/// Item lifecycle: report, browse, claim, resolve, verify.
#[derive(Clone)]
pub struct ItemService {
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    media: Arc<dyn MediaStore>,
}

impl ItemService {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn Store>, media: Arc<dyn MediaStore>) -> Self {
        Self { config, store, media }
    }

    pub async fn create(&self, caller: Uuid, input: ItemInput) -> Result<Item, ItemError> {
        let input = input.normalized();
        let (Some(title), Some(description), Some(type_text), Some(date_text)) = (
            input.title.clone(),
            input.description.clone(),
            input.item_type.clone(),
            input.date_occurred.clone(),
        ) else {
            return Err(ItemError::MissingFields);
        };
        let location = input
            .location
            .clone()
            .and_then(LocationInput::into_location)
            .ok_or(ItemError::MissingFields)?;

        let item_type: ItemType = type_text.parse().map_err(|_| ItemError::InvalidType)?;
        input.check_lengths()?;
        let category = parse_field::<Category>(input.category.as_deref())?.unwrap_or_default();
        let contact_method = parse_field::<ContactMethod>(input.contact_method.as_deref())?.unwrap_or_default();
        let date_occurred =
            parse_date_occurred(&date_text).ok_or_else(|| ItemError::Invalid("Invalid dateOccurred".to_string()))?;

        let folder = &self.config.media.items_folder;
        let assets = media::upload_all(self.media.as_ref(), folder, &input.images)
            .await
            .map_err(|e| ItemError::Upload(e.to_string()))?;

        let new_item = NewItem {
            reported_by: caller,
            item_type,
            title,
            description,
            category,
            location,
            date_occurred,
            images: assets.iter().map(|a| a.secure_url.clone()).collect(),
            contact_method,
        };

        match self.store.insert_item(new_item).await {
            Ok(item) => {
                tracing::info!("Item {} reported by {}", item.id, caller);
                Ok(item)
            }
            Err(e) => {
                media::discard(self.media.as_ref(), &assets).await;
                Err(e.into())
            }
        }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<(Vec<Value>, Pagination), ItemError> {
        let page = query
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let mut limit = query
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<u64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(u64::from(self.config.api.default_page_limit));
        if let Some(max) = self.config.api.max_page_limit {
            limit = limit.min(u64::from(max.max(1)));
        }

        let (Ok(item_type), Ok(category)) = (
            filter_value(query.item_type.as_ref()),
            filter_value(query.category.as_ref()),
        ) else {
            return Ok((Vec::new(), Pagination::new(0, page, limit)));
        };
        let filter = ItemFilter {
            item_type,
            category,
            is_resolved: query.is_resolved.as_deref().map(|v| v == "true"),
            is_verified: query.is_verified.as_deref().map(|v| v == "true"),
        };

        let (items, total) = self.store.list_items(&filter, Page::from_page(page, limit)).await?;
        let people = self.people_for(&items, true).await?;
        Ok((
            items_to_api_values(&items, &people, CardOptions::listing()),
            Pagination::new(total, page, limit),
        ))
    }

    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Value>, ItemError> {
        let text = params.q.as_deref().map(str::trim).unwrap_or_default();
        if text.chars().count() < MIN_SEARCH_CHARS {
            return Err(ItemError::QueryTooShort);
        }
        let (Ok(item_type), Ok(category)) = (
            filter_value(params.item_type.as_ref()),
            filter_value(params.category.as_ref()),
        ) else {
            return Ok(Vec::new());
        };
        let query = SearchQuery {
            text: text.to_string(),
            item_type,
            category,
        };

        let items = self
            .store
            .search_items(&query, u64::from(self.config.api.search_limit))
            .await?;
        let people = self.people_for(&items, false).await?;
        Ok(items_to_api_values(&items, &people, CardOptions::reporter_only()))
    }

    pub async fn by_reporter(&self, reporter: Uuid) -> Result<Vec<Value>, ItemError> {
        let items = self.store.items_by_reporter(reporter).await?;
        let people = self.people_for(&items, true).await?;
        Ok(items_to_api_values(&items, &people, CardOptions::listing()))
    }

    /// Counts a view and returns the populated item.
    pub async fn detail(&self, id: Uuid) -> Result<Value, ItemError> {
        let item = self.store.view_item(id).await?.ok_or(ItemError::NotFound)?;
        let people = self.people_for(std::slice::from_ref(&item), true).await?;
        Ok(item_to_api_value(&item, &people, CardOptions::detail()))
    }

    pub async fn update(&self, caller: Uuid, id: Uuid, input: ItemInput) -> Result<Item, ItemError> {
        let item = self.store.find_item(id).await?.ok_or(ItemError::NotFound)?;
        check_owner(&item, caller, "update")?;

        let input = input.normalized();
        input.check_lengths()?;
        let location = match input.location.clone() {
            Some(location) => Some(
                location
                    .into_location()
                    .ok_or_else(|| ItemError::Invalid("Location name is required".to_string()))?,
            ),
            None => None,
        };
        let mut changes = ItemChanges {
            title: input.title.clone(),
            description: input.description.clone(),
            category: parse_field(input.category.as_deref())?,
            location,
            contact_method: parse_field(input.contact_method.as_deref())?,
            images: None,
        };

        let folder = &self.config.media.items_folder;
        let assets = media::upload_all(self.media.as_ref(), folder, &input.images)
            .await
            .map_err(|e| ItemError::Upload(e.to_string()))?;
        if !assets.is_empty() {
            changes.images = Some(assets.iter().map(|a| a.secure_url.clone()).collect());
        }

        let updated = match self.store.update_item(id, caller, changes).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                media::discard(self.media.as_ref(), &assets).await;
                return Err(ItemError::NotFound);
            }
            Err(e) => {
                media::discard(self.media.as_ref(), &assets).await;
                return Err(e.into());
            }
        };

        if !assets.is_empty() {
            media::delete_best_effort(self.media.as_ref(), folder, &item.images).await;
        }
        Ok(updated)
    }

    pub async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), ItemError> {
        let item = self.store.find_item(id).await?.ok_or(ItemError::NotFound)?;
        check_owner(&item, caller, "delete")?;

        media::delete_best_effort(self.media.as_ref(), &self.config.media.items_folder, &item.images).await;

        if !self.store.soft_delete_item(id, caller).await? {
            return Err(ItemError::NotFound);
        }
        tracing::info!("Item {} deleted by {}", id, caller);
        Ok(())
    }

    pub async fn claim(&self, caller: Uuid, id: Uuid) -> Result<Item, ItemError> {
        let allow_self = self.config.items.allow_self_claim;
        let guard = |item: &Item| check_claim(item, caller, allow_self);

        let item = self.store.find_item(id).await?.ok_or(ItemError::NotFound)?;
        guard(&item)?;

        match self.store.claim_item(id, caller).await? {
            Some(item) => {
                tracing::info!("Item {} claimed by {}", id, caller);
                Ok(item)
            }
            None => Err(self.lost_race(id, guard, ItemError::AlreadyClaimed).await),
        }
    }

    pub async fn unclaim(&self, caller: Uuid, id: Uuid) -> Result<Item, ItemError> {
        let guard = |item: &Item| check_unclaim(item, caller);

        let item = self.store.find_item(id).await?.ok_or(ItemError::NotFound)?;
        guard(&item)?;

        match self.store.unclaim_item(id, caller).await? {
            Some(item) => Ok(item),
            None => Err(self.lost_race(id, guard, ItemError::NotClaimed).await),
        }
    }

    /// Marks the item resolved and, when a rating is given, folds it into the claimant's
    /// rating. Resolving again is allowed and applies the rating again.
    pub async fn resolve(&self, caller: Uuid, id: Uuid, rating: Option<f64>) -> Result<Item, ItemError> {
        let guard = |item: &Item| check_resolve(item, caller);

        let item = self.store.find_item(id).await?.ok_or(ItemError::NotFound)?;
        guard(&item)?;

        let resolved = match self.store.resolve_item(id, caller).await? {
            Some(item) => item,
            None => return Err(self.lost_race(id, guard, ItemError::NoClaimant).await),
        };

        if let (Some(given), Some(claimant)) = (rating, resolved.claimed_by) {
            match self.store.apply_rating(claimant, given).await? {
                Some(user) => tracing::debug!("Rating of {} is now {}", claimant, user.rating),
                None => tracing::warn!("Claimant {} of item {} no longer exists", claimant, id),
            }
        }
        Ok(resolved)
    }

    pub async fn verify(&self, caller: Uuid, id: Uuid) -> Result<Item, ItemError> {
        let verifiers = &self.config.security.verifier_ids;
        let guard = |item: &Item| check_verify(item, caller, verifiers);

        let item = self.store.find_item(id).await?.ok_or(ItemError::NotFound)?;
        guard(&item)?;

        match self.store.verify_item(id).await? {
            Some(item) => Ok(item),
            None => Err(self.lost_race(id, guard, ItemError::NotFound).await),
        }
    }

    /// Explains a conditional write that matched nothing: re-reads the item and reports the
    /// guard that now fails.
    async fn lost_race<F>(&self, id: Uuid, guard: F, fallback: ItemError) -> ItemError
    where
        F: Fn(&Item) -> Result<(), ItemError>,
    {
        match self.store.find_item(id).await {
            Ok(Some(item)) => guard(&item).err().unwrap_or(fallback),
            Ok(None) => ItemError::NotFound,
            Err(e) => e.into(),
        }
    }

    async fn people_for(&self, items: &[Item], with_claimant: bool) -> Result<People, ItemError> {
        let ids = referenced_people(items, with_claimant);
        if ids.is_empty() {
            return Ok(People::new());
        }
        let users = self.store.find_users(&ids).await?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }
}
