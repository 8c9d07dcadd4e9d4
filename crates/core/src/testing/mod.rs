//! Testing utilities and mock implementations.
//!
//! Mocks for every external surface (publisher, reviewer, notifier, store,
//! sources and stages) so the approval flow can be exercised end to end
//! without a network or a chat service.
//!
//! # Example
//!
//! ```rust,ignore
//! use newsroom_core::testing::{fixtures, MockPublisher, StaticSource};
//!
//! let publisher = MockPublisher::new();
//! let source = StaticSource::new("static", vec![fixtures::item("https://example.com/a")]);
//!
//! // Wire into an Orchestrator...
//! assert_eq!(publisher.published_count(), 0);
//! ```

mod flaky_store;
mod fn_stage;
mod mock_notifier;
mod mock_publisher;
mod mock_review;
mod static_source;

pub use flaky_store::FlakyStore;
pub use fn_stage::FnStage;
pub use mock_notifier::MockNotifier;
pub use mock_publisher::MockPublisher;
pub use mock_review::MockReviewSurface;
pub use static_source::StaticSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::approval::PendingApproval;
    use crate::item::Item;

    /// An item as it looks after the full stage chain.
    pub fn item(url: &str) -> Item {
        let slug = url.rsplit('/').next().unwrap_or(url);
        Item::new("fixture", url)
            .with_field("title", format!("Story {}", slug))
            .with_field("text", format!("Body of story {}.", slug))
            .with_field("post_text", format!("<b>Story {}</b>\n\nBody.", slug))
            .with_field("creative_type", "none")
            .with_field("creative_url", "none")
    }

    /// A fresh pending record for [`item`].
    pub fn pending(url: &str) -> PendingApproval {
        PendingApproval::from_item(&item(url))
    }
}
