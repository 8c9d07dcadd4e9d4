//! Items flowing through the content pipeline.

mod types;

pub use types::{item_id_for_url, Item, ItemStatus};
