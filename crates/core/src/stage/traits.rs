//! Stage trait definition.

use serde::{Deserialize, Serialize};

use crate::item::Item;

use super::StageError;

/// Declared side-effect class of a stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Local computation only, safe to run on the execution context.
    Pure,
    /// Performs blocking I/O against an external service.
    External,
}

impl SideEffect {
    /// Whether calls must go through the offload pool.
    pub fn requires_offload(&self) -> bool {
        matches!(self, SideEffect::External)
    }
}

/// Named, ordered reference to a stage plus its side-effect class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: String,
    pub side_effect: SideEffect,
}

/// A single pipeline step.
pub trait Stage: Send + Sync {
    /// Stage name used in logs and failure notices.
    fn name(&self) -> &str;

    /// Declared side-effect class.
    fn side_effect(&self) -> SideEffect;

    /// Apply the stage. `Ok(None)` means skip the item.
    ///
    /// May block; callers decide where to run it based on `side_effect`.
    fn execute(&self, item: Item) -> Result<Option<Item>, StageError>;

    /// Descriptor for status reporting.
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor {
            name: self.name().to_string(),
            side_effect: self.side_effect(),
        }
    }
}
