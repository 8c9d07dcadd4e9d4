//! Pipeline executor: runs the stage chain over one source's items.
//!
//! External stages go through the offload pool, so every stage call in a
//! run is a yield point for the execution context. One item's failure
//! never aborts the batch.

mod executor;
mod types;

pub use executor::PipelineExecutor;
pub use types::{PipelineError, RunEvent, RunReport};
