//! Pipeline executor implementation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::approval::{ApprovalStore, PendingApproval, RetryPolicy};
use crate::channel::ReviewSurface;
use crate::item::{Item, ItemStatus};
use crate::metrics;
use crate::notify::{FailureNotice, NotifyHandle};
use crate::offload::{describe_panic, OffloadPool};
use crate::source::Source;
use crate::stage::{SideEffect, Stage, StageError};

use super::{PipelineError, RunEvent, RunReport};

/// What happened to an item that finished the stage chain.
enum Emission {
    Awaiting(Item),
    /// The store already holds a resolved record for this item.
    AlreadyResolved,
}

/// Runs stage chains and emits survivors to the approval surface.
pub struct PipelineExecutor {
    pool: OffloadPool,
    store: Arc<dyn ApprovalStore>,
    review: Arc<dyn ReviewSurface>,
    notifier: NotifyHandle,
    retry: RetryPolicy,
}

impl PipelineExecutor {
    pub fn new(
        pool: OffloadPool,
        store: Arc<dyn ApprovalStore>,
        review: Arc<dyn ReviewSurface>,
        notifier: NotifyHandle,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            pool,
            store,
            review,
            notifier,
            retry,
        }
    }

    pub fn pool(&self) -> &OffloadPool {
        &self.pool
    }

    /// Fetch from `source` and run every item through `stages`.
    ///
    /// Each item that completes the chain is stored as a pending record,
    /// presented to the reviewer and reported on `events`.
    pub async fn run(
        &self,
        source: Arc<dyn Source>,
        stages: &[Arc<dyn Stage>],
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let name = source.name().to_string();
        info!(source = %name, stages = stages.len(), "Pipeline run started");

        let label = format!("fetch:{}", name);
        let fetcher = Arc::clone(&source);
        let fetched = self
            .pool
            .offload(&label, move || fetcher.fetch())
            .await
            .map_err(StageError::from)
            .and_then(|r| r);

        let items = match fetched {
            Ok(items) => items,
            Err(error) => {
                metrics::SOURCE_FAILURES.with_label_values(&[&name]).inc();
                self.notifier.notify(
                    FailureNotice::new("fetch", error.to_string()).with_stage(error.stage_name()),
                );
                return Err(PipelineError::Fetch {
                    source_name: name,
                    error,
                });
            }
        };

        let mut report = RunReport::new(&name, items.len());
        for mut item in items {
            item.status = ItemStatus::Processing;
            let id = item.id.clone();

            match self.run_chain(item, stages).await {
                Ok(Some(item)) => match self.emit(item, events).await {
                    Ok(Emission::Awaiting(item)) => {
                        metrics::ITEMS_TOTAL
                            .with_label_values(&["awaiting_approval"])
                            .inc();
                        report.awaiting.push(item);
                    }
                    Ok(Emission::AlreadyResolved) => {
                        metrics::ITEMS_TOTAL.with_label_values(&["skipped"]).inc();
                        report.skipped += 1;
                    }
                    Err(notice) => {
                        metrics::ITEMS_TOTAL.with_label_values(&["failed"]).inc();
                        report.failed += 1;
                        self.notifier.notify(notice);
                    }
                },
                Ok(None) => {
                    metrics::ITEMS_TOTAL.with_label_values(&["skipped"]).inc();
                    report.skipped += 1;
                }
                Err(error) => {
                    metrics::ITEMS_TOTAL.with_label_values(&["failed"]).inc();
                    report.failed += 1;
                    warn!(item_id = %id, stage = %error.stage_name(), error = %error, "Item failed");
                    self.notifier.notify(FailureNotice::stage_failure(&id, &error));
                }
            }
        }

        report.duration = started.elapsed();
        info!(
            source = %name,
            fetched = report.fetched,
            awaiting = report.awaiting.len(),
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "Pipeline run finished"
        );
        Ok(report)
    }

    /// Apply `stages` to one item in order. `Ok(None)` means a stage skipped it.
    pub async fn run_chain(
        &self,
        mut item: Item,
        stages: &[Arc<dyn Stage>],
    ) -> Result<Option<Item>, StageError> {
        for stage in stages {
            let id = item.id.clone();
            let next = match stage.side_effect() {
                SideEffect::Pure => run_inline(stage.as_ref(), item)?,
                SideEffect::External => {
                    let call = Arc::clone(stage);
                    self.pool
                        .offload(stage.name(), move || call.execute(item))
                        .await??
                }
            };

            match next {
                Some(next) => item = next,
                None => {
                    debug!(item_id = %id, stage = %stage.name(), "Item skipped");
                    return Ok(None);
                }
            }
        }
        Ok(Some(item))
    }

    async fn emit(
        &self,
        mut item: Item,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> Result<Emission, FailureNotice> {
        item.status = ItemStatus::PendingApproval;
        let record = PendingApproval::from_item(&item);

        let store = Arc::clone(&self.store);
        let stored = self
            .retry
            .run_offloaded(&self.pool, "upsert", move || store.upsert(&record))
            .await
            .map_err(|e| FailureNotice::store_failure("upsert", &item.id, e.to_string()))?;

        if stored.status.is_terminal() {
            debug!(item_id = %item.id, status = %stored.status, "Item already resolved");
            return Ok(Emission::AlreadyResolved);
        }

        self.review.present(&stored).await.map_err(|e| {
            FailureNotice::new("present", e.to_string()).with_item(&item.id)
        })?;

        info!(item_id = %item.id, title = %item.title(), "Awaiting approval");
        if events.send(RunEvent::AwaitingApproval(stored)).is_err() {
            debug!(item_id = %item.id, "Execution context gone, record not cached");
        }
        Ok(Emission::Awaiting(item))
    }
}

/// Run a pure stage on the current task, turning a panic into a stage error.
fn run_inline(stage: &dyn Stage, item: Item) -> Result<Option<Item>, StageError> {
    catch_unwind(AssertUnwindSafe(|| stage.execute(item))).unwrap_or_else(|payload| {
        Err(StageError::failed(
            stage.name(),
            format!("panicked: {}", describe_panic(payload.as_ref())),
        ))
    })
}
