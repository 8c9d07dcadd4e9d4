//! Item sources.
//!
//! A source produces the raw items for one pipeline run. Fetching is
//! blocking network I/O, so the executor always runs it on the offload pool.

mod parser;

pub use parser::{ParserClient, ParserSource};

use crate::item::Item;
use crate::stage::StageError;

/// A named producer of raw items.
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the current batch of items. Blocking.
    fn fetch(&self) -> Result<Vec<Item>, StageError>;
}
