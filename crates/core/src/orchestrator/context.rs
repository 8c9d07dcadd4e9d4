//! The execution context loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, OptionFuture};
use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::approval::{
    ApprovalCache, ApprovalResolver, DecisionEvent, Resolution, ResolutionOutcome, ResolveError,
};
use crate::channel::ReviewSurface;
use crate::metrics;
use crate::notify::{FailureNotice, NotifyHandle};
use crate::offload::describe_panic;
use crate::pipeline::{PipelineExecutor, RunEvent};
use crate::source::Source;
use crate::stage::Stage;

use super::handle::StatusRequest;
use super::{
    DecisionEnvelope, ExecutionContext, OrchestratorConfig, OrchestratorHandle,
    OrchestratorStatus, RunSummary, SchedulerState, Syndication,
};

type RunFuture = BoxFuture<'static, Result<RunSummary, String>>;

/// Receivers drained by the loop.
struct Inbox {
    decisions: mpsc::Receiver<DecisionEnvelope>,
    status: mpsc::Receiver<StatusRequest>,
    shutdown: broadcast::Receiver<()>,
}

/// Everything the loop reads but never mutates.
struct Core {
    config: OrchestratorConfig,
    executor: Arc<PipelineExecutor>,
    resolver: ApprovalResolver,
    review: Arc<dyn ReviewSurface>,
    notifier: NotifyHandle,
    sources: Arc<[Arc<dyn Source>]>,
    stages: Arc<[Arc<dyn Stage>]>,
    syndication: Option<Arc<Syndication>>,
}

/// The execution context: scheduler, decision listener and resolver driven
/// from one cooperative loop.
pub struct Orchestrator {
    core: Core,
    inbox: Inbox,
    handle: OrchestratorHandle,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        executor: Arc<PipelineExecutor>,
        resolver: ApprovalResolver,
        review: Arc<dyn ReviewSurface>,
        notifier: NotifyHandle,
    ) -> Self {
        let (decisions_tx, decisions) = mpsc::channel(config.decision_buffer.max(1));
        let (status_tx, status) = mpsc::channel(8);
        let (shutdown_tx, shutdown) = broadcast::channel(1);

        Self {
            core: Core {
                config,
                executor,
                resolver,
                review,
                notifier,
                sources: Arc::from(Vec::new()),
                stages: Arc::from(Vec::new()),
                syndication: None,
            },
            inbox: Inbox {
                decisions,
                status,
                shutdown,
            },
            handle: OrchestratorHandle::new(decisions_tx, status_tx, shutdown_tx),
        }
    }

    /// Sources run in order on every tick.
    pub fn with_sources(mut self, sources: Vec<Arc<dyn Source>>) -> Self {
        self.core.sources = Arc::from(sources);
        self
    }

    /// Stage chain applied to every fetched item.
    pub fn with_stages(mut self, stages: Vec<Arc<dyn Stage>>) -> Self {
        self.core.stages = Arc::from(stages);
        self
    }

    pub fn with_syndication(mut self, syndication: Syndication) -> Self {
        self.core.syndication = Some(Arc::new(syndication));
        self
    }

    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    /// Run the loop until shutdown is signalled or every handle is dropped.
    ///
    /// Returns the final context. A run still in flight at shutdown is
    /// abandoned; its offloaded calls finish on their own.
    pub async fn run(self) -> ExecutionContext {
        let Orchestrator {
            core,
            mut inbox,
            handle,
        } = self;
        drop(handle);

        let mut ctx = ExecutionContext::new();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut ticker = core.ticker();
        let mut run: Option<RunFuture> = None;

        info!(
            enabled = core.config.enabled,
            interval_secs = core.config.interval.as_secs(),
            sources = core.sources.len(),
            stages = core.stages.len(),
            "Execution context started"
        );

        loop {
            tokio::select! {
                biased;

                _ = inbox.shutdown.recv() => {
                    info!("Execution context received shutdown signal");
                    break;
                }

                Some(event) = events.recv() => core.on_run_event(&mut ctx, event),

                Some(outcome) = OptionFuture::from(run.as_mut()), if run.is_some() => {
                    run = None;
                    core.on_run_finished(&mut ctx, outcome);
                }

                Some(envelope) = inbox.decisions.recv() => {
                    core.on_decision(&mut ctx, envelope).await;
                }

                Some(reply) = inbox.status.recv() => {
                    let _ = reply.send(core.status(&ctx));
                }

                _ = ticker.tick(), if core.config.enabled => {
                    core.on_tick(&mut ctx, &mut run, &events_tx);
                }

                else => break,
            }
        }

        if run.is_some() {
            warn!("Abandoning in-flight pipeline run");
        }
        info!(
            runs = ctx.runs_completed,
            decisions = ctx.decisions_handled,
            crashes = ctx.crashes,
            "Execution context stopped"
        );
        ctx
    }
}

impl Core {
    fn ticker(&self) -> Interval {
        let period = self.config.interval.max(Duration::from_millis(1));
        let start = if self.config.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    fn on_tick(
        &self,
        ctx: &mut ExecutionContext,
        run: &mut Option<RunFuture>,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) {
        if let SchedulerState::Running { started_at } = ctx.scheduler {
            ctx.ticks_dropped += 1;
            metrics::TICKS_DROPPED.inc();
            info!(running_since = %started_at, "Previous run still in progress, tick dropped");
            return;
        }

        let started_at = Utc::now();
        ctx.ticks_started += 1;
        ctx.scheduler = SchedulerState::Running { started_at };
        metrics::TICKS_STARTED.inc();
        info!(sources = self.sources.len(), "Scheduler tick, starting pipeline run");

        *run = Some(self.run_future(started_at, events.clone()));
    }

    /// Build the `'static` future for one run over every source.
    fn run_future(
        &self,
        started_at: DateTime<Utc>,
        events: mpsc::UnboundedSender<RunEvent>,
    ) -> RunFuture {
        let executor = Arc::clone(&self.executor);
        let sources = Arc::clone(&self.sources);
        let stages = Arc::clone(&self.stages);

        let run = async move {
            let mut summary = RunSummary::new(started_at);
            for source in sources.iter() {
                match executor.run(Arc::clone(source), &stages, &events).await {
                    Ok(report) => summary.add_report(&report),
                    Err(e) => {
                        warn!(error = %e, "Source skipped for this run");
                        summary.add_source_failure();
                    }
                }
            }
            summary.finished_at = Utc::now();
            summary
        };

        AssertUnwindSafe(run)
            .catch_unwind()
            .map(|result| result.map_err(|payload| describe_panic(payload.as_ref())))
            .boxed()
    }

    fn on_run_event(&self, ctx: &mut ExecutionContext, event: RunEvent) {
        match event {
            RunEvent::AwaitingApproval(record) => {
                debug!(item_id = %record.id, "Caching pending record");
                ctx.cache.insert(record);
            }
        }
    }

    fn on_run_finished(&self, ctx: &mut ExecutionContext, outcome: Result<RunSummary, String>) {
        let elapsed = match ctx.scheduler {
            SchedulerState::Running { started_at } => {
                (Utc::now() - started_at).num_milliseconds().max(0) as f64 / 1000.0
            }
            SchedulerState::Idle => 0.0,
        };
        ctx.scheduler = SchedulerState::Idle;

        match outcome {
            Ok(summary) => {
                ctx.runs_completed += 1;
                metrics::RUN_DURATION
                    .with_label_values(&["completed"])
                    .observe(elapsed);
                info!(
                    sources = summary.sources,
                    source_failures = summary.source_failures,
                    fetched = summary.fetched,
                    awaiting = summary.awaiting,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    elapsed_secs = elapsed,
                    "Pipeline run finished"
                );
                ctx.last_run = Some(summary);
            }
            Err(message) => {
                ctx.crashes += 1;
                metrics::RUN_DURATION
                    .with_label_values(&["crashed"])
                    .observe(elapsed);
                error!(error = %message, "Pipeline run crashed");
                self.notifier
                    .notify(FailureNotice::crash("scheduler_tick", message));
            }
        }
    }

    async fn on_decision(&self, ctx: &mut ExecutionContext, envelope: DecisionEnvelope) {
        let DecisionEnvelope { event, reply } = envelope;
        ctx.decisions_handled += 1;

        let handled = AssertUnwindSafe(self.handle_decision(&mut ctx.cache, &event))
            .catch_unwind()
            .await;

        match handled {
            Ok(result) => {
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Err(payload) => {
                ctx.crashes += 1;
                let message = describe_panic(payload.as_ref());
                error!(item_id = %event.item_id, error = %message, "Decision handler crashed");
                self.notifier
                    .notify(FailureNotice::crash("decision", message).with_item(&event.item_id));
            }
        }
    }

    async fn handle_decision(
        &self,
        cache: &mut ApprovalCache,
        event: &DecisionEvent,
    ) -> Result<Resolution, ResolveError> {
        info!(
            item_id = %event.item_id,
            decision = event.decision.as_str(),
            actor = %event.actor,
            "Handling decision"
        );

        let result = self.resolver.resolve(cache, event).await;
        match &result {
            Ok(resolution) => {
                if let (ResolutionOutcome::Published { .. }, Some(syndication)) =
                    (&resolution.outcome, &self.syndication)
                {
                    syndication.spawn(
                        Arc::clone(&self.executor),
                        self.notifier.clone(),
                        resolution.record.snapshot.clone(),
                    );
                }
            }
            Err(ResolveError::NotFound(id)) => {
                warn!(item_id = %id, "Decision for unknown item");
            }
            Err(ResolveError::Conflict { item_id, current }) => {
                warn!(item_id = %item_id, current = %current, "Decision lost to a concurrent resolution");
            }
            Err(e @ ResolveError::Store { operation, .. }) => {
                self.notifier.notify(FailureNotice::store_failure(
                    operation,
                    &event.item_id,
                    e.to_string(),
                ));
            }
            Err(e @ ResolveError::Publish { .. }) => {
                self.notifier
                    .notify(FailureNotice::new("publish", e.to_string()).with_item(&event.item_id));
            }
        }

        if let Err(e) = self.review.report(event, &result).await {
            warn!(item_id = %event.item_id, error = %e, "Failed to report resolution");
        }
        result
    }

    fn status(&self, ctx: &ExecutionContext) -> OrchestratorStatus {
        OrchestratorStatus {
            scheduler_enabled: self.config.enabled,
            interval_secs: self.config.interval.as_secs(),
            scheduler: ctx.scheduler,
            cached_approvals: ctx.cache.len(),
            ticks_started: ctx.ticks_started,
            ticks_dropped: ctx.ticks_dropped,
            runs_completed: ctx.runs_completed,
            decisions_handled: ctx.decisions_handled,
            crashes: ctx.crashes,
            last_run: ctx.last_run.clone(),
            sources: self.sources.iter().map(|s| s.name().to_string()).collect(),
            stages: self.stages.iter().map(|s| s.descriptor()).collect(),
            offload: self.executor.pool().status(),
        }
    }
}
