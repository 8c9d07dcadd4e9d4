//! External surfaces: publishing, reviewer interaction, failure alerts.
//!
//! The traits are the seams the pipeline and resolver talk to. The Telegram
//! adapter implements all three; the log-only adapters are used when no
//! messaging backend is configured.

mod error;
mod log;
mod telegram;
mod traits;

pub use error::ChannelError;
pub use log::{LogNotifier, LogReviewSurface, UnconfiguredPublisher};
pub use telegram::{TelegramClient, TelegramPublisher};
pub use traits::{describe_resolution, Notifier, PublishResult, Publisher, ReviewSurface};
