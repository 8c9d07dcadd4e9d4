//! Shared harness for execution context integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use newsroom_core::orchestrator::ExecutionContext;
use newsroom_core::testing::{FlakyStore, MockPublisher, MockReviewSurface};
use newsroom_core::{
    ApprovalResolver, FailureNotice, NotifyHandle, OffloadConfig, OffloadPool, Orchestrator,
    OrchestratorConfig, OrchestratorHandle, OrchestratorStatus, PipelineExecutor, RetryPolicy,
    Source, SqliteApprovalStore, Stage, Syndication,
};

pub use newsroom_core::testing::fixtures;

/// Mocks plus an on-disk store shared by every orchestrator built from it.
pub struct TestHarness {
    pub store: Arc<FlakyStore>,
    pub publisher: Arc<MockPublisher>,
    pub review: Arc<MockReviewSurface>,
    pub notices: mpsc::Receiver<FailureNotice>,
    pub notify: NotifyHandle,
    pub pool: OffloadPool,
    pub db_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_offload(OffloadConfig::default())
    }

    pub fn with_offload(offload: OffloadConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("approvals.db");
        let store = SqliteApprovalStore::new(&db_path).expect("Failed to open store");
        let (tx, notices) = mpsc::channel(64);

        Self {
            store: Arc::new(FlakyStore::new(store)),
            publisher: Arc::new(MockPublisher::new()),
            review: Arc::new(MockReviewSurface::new()),
            notices,
            notify: NotifyHandle::new(tx),
            pool: OffloadPool::new(offload),
            db_path,
            _temp_dir: temp_dir,
        }
    }

    pub fn retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1))
    }

    pub fn executor(&self) -> Arc<PipelineExecutor> {
        Arc::new(PipelineExecutor::new(
            self.pool.clone(),
            self.store.clone(),
            self.review.clone(),
            self.notify.clone(),
            Self::retry(),
        ))
    }

    pub fn orchestrator(
        &self,
        config: OrchestratorConfig,
        sources: Vec<Arc<dyn Source>>,
        stages: Vec<Arc<dyn Stage>>,
    ) -> Orchestrator {
        let resolver = ApprovalResolver::new(
            self.store.clone(),
            self.pool.clone(),
            self.publisher.clone(),
            Self::retry(),
        );
        Orchestrator::new(
            config,
            self.executor(),
            resolver,
            self.review.clone(),
            self.notify.clone(),
        )
        .with_sources(sources)
        .with_stages(stages)
    }

    /// Spawn a loop with the given sources and stages.
    pub fn start(
        &self,
        config: OrchestratorConfig,
        sources: Vec<Arc<dyn Source>>,
        stages: Vec<Arc<dyn Stage>>,
    ) -> Running {
        Running::spawn(self.orchestrator(config, sources, stages))
    }

    pub fn start_with_syndication(
        &self,
        config: OrchestratorConfig,
        syndication: Syndication,
    ) -> Running {
        Running::spawn(self.orchestrator(config, Vec::new(), Vec::new()).with_syndication(syndication))
    }

    /// Drain every notice queued so far.
    pub fn drain_notices(&mut self) -> Vec<FailureNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

/// A spawned loop and its handle.
pub struct Running {
    pub handle: OrchestratorHandle,
    task: JoinHandle<ExecutionContext>,
}

impl Running {
    pub fn spawn(orchestrator: Orchestrator) -> Self {
        let handle = orchestrator.handle();
        let task = tokio::spawn(orchestrator.run());
        Self { handle, task }
    }

    /// Signal shutdown and wait for the loop to return its context.
    pub async fn stop(self) -> ExecutionContext {
        self.handle.shutdown();
        self.task.await.expect("execution context task panicked")
    }
}

/// Scheduler config that fires once immediately and not again during a test.
pub fn run_once() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_interval(Duration::from_secs(3600))
        .with_run_on_start(true)
}

/// Config with the scheduler disabled; only decisions are handled.
pub fn decisions_only() -> OrchestratorConfig {
    OrchestratorConfig::default().with_enabled(false)
}

/// Poll the loop's status until `cond` holds.
pub async fn wait_until<F>(handle: &OrchestratorHandle, cond: F) -> OrchestratorStatus
where
    F: Fn(&OrchestratorStatus) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = handle.status().await.expect("orchestrator stopped");
        if cond(&status) {
            return status;
        }
        assert!(Instant::now() < deadline, "condition not reached: {:?}", status);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
