//! Failure notification plumbing.
//!
//! Every reported error becomes a [`FailureNotice`] pushed through a
//! [`NotifyHandle`]. A background [`NotifyWriter`] forwards notices to the
//! configured [`Notifier`](crate::channel::Notifier). Delivery is best-effort:
//! a full channel or a failing notifier never blocks or fails the caller.

mod handle;
mod notice;
mod writer;

pub use handle::NotifyHandle;
pub use notice::FailureNotice;
pub use writer::{create_notify_system, NotifyWriter};
