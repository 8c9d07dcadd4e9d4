//! Closure-backed stage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::item::Item;
use crate::stage::{SideEffect, Stage, StageError};

type StageFn = dyn Fn(Item) -> Result<Option<Item>, StageError> + Send + Sync;

/// A stage whose behavior is a closure. Clones share the call counter.
#[derive(Clone)]
pub struct FnStage {
    name: String,
    side_effect: SideEffect,
    func: Arc<StageFn>,
    calls: Arc<AtomicUsize>,
}

impl FnStage {
    fn new<F>(name: &str, side_effect: SideEffect, func: F) -> Self
    where
        F: Fn(Item) -> Result<Option<Item>, StageError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            side_effect,
            func: Arc::new(func),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pure<F>(name: &str, func: F) -> Self
    where
        F: Fn(Item) -> Result<Option<Item>, StageError> + Send + Sync + 'static,
    {
        Self::new(name, SideEffect::Pure, func)
    }

    pub fn external<F>(name: &str, func: F) -> Self
    where
        F: Fn(Item) -> Result<Option<Item>, StageError> + Send + Sync + 'static,
    {
        Self::new(name, SideEffect::External, func)
    }

    /// Number of times the stage ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn side_effect(&self) -> SideEffect {
        self.side_effect
    }

    fn execute(&self, item: Item) -> Result<Option<Item>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.func)(item)
    }
}
