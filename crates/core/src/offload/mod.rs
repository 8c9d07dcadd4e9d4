//! Bounded offload pool for blocking calls.
//!
//! The execution context never runs blocking I/O itself. Blocking calls are
//! submitted here, executed on tokio's blocking threads, and their results
//! come back through the awaited join handle. Awaiting an offloaded call is
//! a yield point: the execution context is free to service other events
//! while the call is in flight.

mod config;
mod pool;

pub use config::OffloadConfig;
pub(crate) use pool::describe_panic;
pub use pool::{OffloadError, OffloadPool, PoolStatus};
