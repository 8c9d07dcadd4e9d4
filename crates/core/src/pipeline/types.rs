use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::approval::PendingApproval;
use crate::item::Item;
use crate::stage::StageError;

/// Sent from a running pipeline to the execution context.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A new pending record was stored and shown to the reviewer.
    AwaitingApproval(PendingApproval),
}

/// Outcome of running one source.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: String,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Items that reached `pending_approval`.
    pub awaiting: Vec<Item>,
    pub duration: Duration,
}

impl RunReport {
    pub fn new(source: impl Into<String>, fetched: usize) -> Self {
        Self {
            source: source.into(),
            fetched,
            skipped: 0,
            failed: 0,
            awaiting: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Errors that end a source's run before any item is processed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("source '{source_name}' fetch failed: {error}")]
    Fetch {
        source_name: String,
        error: StageError,
    },
}
