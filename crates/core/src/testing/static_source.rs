//! Fixed-content source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::item::Item;
use crate::source::Source;
use crate::stage::StageError;

/// Returns the same items (or the same error) on every fetch.
#[derive(Debug)]
pub struct StaticSource {
    name: String,
    items: Vec<Item>,
    error: Option<String>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: &str, items: Vec<Item>) -> Self {
        Self {
            name: name.to_string(),
            items,
            error: None,
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::new(name, Vec::new())
        }
    }

    /// Block for `delay` inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<Item>, StageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match &self.error {
            Some(message) => Err(StageError::failed(format!("fetch:{}", self.name), message.clone())),
            None => Ok(self.items.clone()),
        }
    }
}
