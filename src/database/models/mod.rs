pub mod item;
pub mod user;

pub use item::{
    Category, ContactMethod, Item, ItemChanges, ItemFilter, ItemType, Location, NewItem, Page,
    SearchQuery, UnknownVariant,
};
pub use user::{averaged_rating, User, UserChanges};
