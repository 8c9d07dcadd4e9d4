//! Stage contract for the content pipeline.
//!
//! A stage is a blocking, stateless step: it receives an item and either
//! returns it (possibly enriched), returns `None` to skip it, or fails.
//! Stages that call external services declare `SideEffect::External` and
//! are always run through the offload pool.

mod error;
mod traits;

pub use error::StageError;
pub use traits::{SideEffect, Stage, StageDescriptor};
