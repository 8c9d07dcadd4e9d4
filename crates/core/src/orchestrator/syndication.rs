//! Re-publication of approved items to a secondary channel.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::Publisher;
use crate::item::Item;
use crate::notify::{FailureNotice, NotifyHandle};
use crate::pipeline::PipelineExecutor;
use crate::stage::Stage;

/// Secondary stage chain plus the publisher it feeds.
///
/// Runs after a successful primary publish, detached from the resolution:
/// its failures are notified and never change the approval outcome.
pub struct Syndication {
    stages: Vec<Arc<dyn Stage>>,
    publisher: Arc<dyn Publisher>,
}

impl Syndication {
    pub fn new(stages: Vec<Arc<dyn Stage>>, publisher: Arc<dyn Publisher>) -> Self {
        Self { stages, publisher }
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run the chain over `item` and publish the result.
    ///
    /// Returns the secondary post URL, `None` when a stage skipped the item.
    pub async fn syndicate(
        &self,
        executor: &PipelineExecutor,
        item: Item,
    ) -> Result<Option<String>, FailureNotice> {
        let id = item.id.clone();
        let Some(item) = executor
            .run_chain(item, &self.stages)
            .await
            .map_err(|e| FailureNotice::stage_failure(&id, &e))?
        else {
            debug!(item_id = %id, "Syndication skipped by stage");
            return Ok(None);
        };

        let published = self
            .publisher
            .publish(&item)
            .await
            .map_err(|e| FailureNotice::new("syndicate", e.to_string()).with_item(&id))?;
        info!(item_id = %id, url = %published.url, "Syndicated to secondary channel");
        Ok(Some(published.url))
    }

    /// Spawn [`syndicate`](Self::syndicate) as a detached task.
    pub fn spawn(
        self: &Arc<Self>,
        executor: Arc<PipelineExecutor>,
        notifier: NotifyHandle,
        item: Item,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(notice) = this.syndicate(&executor, item).await {
                warn!(operation = %notice.operation, error = %notice.message, "Syndication failed");
                notifier.notify(notice);
            }
        })
    }
}
