pub mod format;

pub use format::{item_to_api_value, items_to_api_values, referenced_people, CardOptions, People, UserSummary};
