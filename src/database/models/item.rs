use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Lost,
    Found,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Documents,
    Clothing,
    Accessories,
    Books,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContactMethod {
    #[default]
    InApp,
    Email,
    Phone,
}

/// Returned when a stored or submitted string is not a known enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(ItemType, "item type", { Lost => "lost", Found => "found" });
string_enum!(Category, "category", {
    Electronics => "electronics",
    Documents => "documents",
    Clothing => "clothing",
    Accessories => "accessories",
    Books => "books",
    Other => "other",
});
string_enum!(ContactMethod, "contact method", {
    InApp => "in-app",
    Email => "email",
    Phone => "phone",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub reported_by: Uuid,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: Location,
    pub date_occurred: DateTime<Utc>,
    pub images: Vec<String>,
    pub contact_method: ContactMethod,
    pub claimed_by: Option<Uuid>,
    pub is_resolved: bool,
    pub is_verified: bool,
    pub views: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}


/// Validated report ready to be stored. The reporter comes from the caller identity.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub reported_by: Uuid,
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: Location,
    pub date_occurred: DateTime<Utc>,
    pub images: Vec<String>,
    pub contact_method: ContactMethod,
}

impl NewItem {
    pub fn into_item(self) -> Item {
        let now = Utc::now();
        Item {
            id: Uuid::new_v4(),
            reported_by: self.reported_by,
            item_type: self.item_type,
            title: self.title,
            description: self.description,
            category: self.category,
            location: self.location,
            date_occurred: self.date_occurred,
            images: self.images,
            contact_method: self.contact_method,
            claimed_by: None,
            is_resolved: false,
            is_verified: false,
            views: 0,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reporter-editable fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub contact_method: Option<ContactMethod>,
    pub images: Option<Vec<String>>,
}

impl ItemChanges {
    pub fn apply(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(location) = &self.location {
            item.location = location.clone();
        }
        if let Some(contact_method) = self.contact_method {
            item.contact_method = contact_method;
        }
        if let Some(images) = &self.images {
            item.images = images.clone();
        }
        item.updated_at = Utc::now();
    }
}

/// Listing filter. Soft-deleted items are always excluded regardless of these fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub item_type: Option<ItemType>,
    pub category: Option<Category>,
    pub is_resolved: Option<bool>,
    pub is_verified: Option<bool>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        !item.is_deleted
            && self.item_type.map_or(true, |t| item.item_type == t)
            && self.category.map_or(true, |c| item.category == c)
            && self.is_resolved.map_or(true, |r| item.is_resolved == r)
            && self.is_verified.map_or(true, |v| item.is_verified == v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl Page {
    /// Translates a 1-based page number into skip/limit. Out-of-range pages saturate.
    pub fn from_page(page: u64, limit: u64) -> Self {
        let page = page.max(1);
        Self {
            skip: (page - 1).saturating_mul(limit),
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub item_type: Option<ItemType>,
    pub category: Option<Category>,
}

impl SearchQuery {
    /// Case-insensitive substring match on title or description.
    pub fn matches(&self, item: &Item) -> bool {
        let needle = self.text.to_lowercase();
        !item.is_deleted
            && self.item_type.map_or(true, |t| item.item_type == t)
            && self.category.map_or(true, |c| item.category == c)
            && (item.title.to_lowercase().contains(&needle)
                || item.description.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Item {
        NewItem {
            reported_by: Uuid::new_v4(),
            item_type: ItemType::Found,
            title: "Blue Umbrella".into(),
            description: "Left near the library entrance".into(),
            category: Category::Accessories,
            location: Location { name: "Library".into(), latitude: None, longitude: None },
            date_occurred: Utc::now(),
            images: vec![],
            contact_method: ContactMethod::InApp,
        }
        .into_item()
    }

    #[test]
    fn enum_strings_round_trip_through_serde_names() {
        assert_eq!("in-app".parse::<ContactMethod>().unwrap(), ContactMethod::InApp);
        assert_eq!(serde_json::to_value(ContactMethod::InApp).unwrap(), "in-app");
        assert_eq!(serde_json::to_value(Category::Books).unwrap(), "books");
        assert!("misc".parse::<Category>().is_err());
        assert!("LOST".parse::<ItemType>().is_err());
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let item = sample();
        let query = |text: &str| SearchQuery { text: text.into(), item_type: None, category: None };
        assert!(query("umbrella").matches(&item));
        assert!(query("LIBRARY").matches(&item));
        assert!(!query("wallet").matches(&item));
    }

    #[test]
    fn filters_exclude_deleted_items() {
        let mut item = sample();
        assert!(ItemFilter::default().matches(&item));
        item.is_deleted = true;
        assert!(!ItemFilter::default().matches(&item));
    }

    #[test]
    fn page_translates_to_skip() {
        assert_eq!(Page::from_page(2, 2), Page { skip: 2, limit: 2 });
        assert_eq!(Page::from_page(0, 20), Page { skip: 0, limit: 20 });
        assert_eq!(Page::from_page(u64::MAX, 20), Page { skip: u64::MAX, limit: 20 });
    }

    #[test]
    fn serializes_with_camel_case_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["type"], "found");
        assert_eq!(value["contactMethod"], "in-app");
        assert!(value["claimedBy"].is_null());
        assert_eq!(value["isResolved"], false);
    }
}
