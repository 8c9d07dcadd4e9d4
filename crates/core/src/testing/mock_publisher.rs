//! Mock publisher for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::channel::{ChannelError, PublishResult, Publisher};
use crate::item::Item;

/// Records published items.
///
/// Each publish gets a sequential message id and a `https://t.me/mock/<n>`
/// URL. `fail_next` makes exactly one publish fail.
#[derive(Debug, Default)]
pub struct MockPublisher {
    published: Mutex<Vec<Item>>,
    fail_next: AtomicBool,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Item> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, item: &Item) -> Result<PublishResult, ChannelError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ChannelError::Api {
                method: "sendMessage".to_string(),
                description: "mock failure".to_string(),
            });
        }

        let mut published = self
            .published
            .lock()
            .map_err(|_| ChannelError::Http("mock publisher poisoned".to_string()))?;
        published.push(item.clone());
        let message_id = published.len() as i64;
        Ok(PublishResult {
            url: format!("https://t.me/mock/{}", message_id),
            message_id,
        })
    }
}
