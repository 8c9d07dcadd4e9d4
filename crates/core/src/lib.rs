pub mod approval;
pub mod channel;
pub mod config;
pub mod item;
pub mod metrics;
pub mod notify;
pub mod offload;
pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod stage;
pub mod stages;
pub mod testing;

pub use approval::{
    ApprovalCache, ApprovalFilter, ApprovalResolver, ApprovalStatus, ApprovalStore, Decision,
    DecisionEvent, PendingApproval, Resolution, ResolutionOutcome, ResolveError, RetryPolicy,
    SqliteApprovalStore, StoreError,
};
pub use channel::{
    ChannelError, LogNotifier, LogReviewSurface, Notifier, PublishResult, Publisher,
    ReviewSurface, TelegramClient, TelegramPublisher, UnconfiguredPublisher,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use item::{Item, ItemStatus};
pub use notify::{create_notify_system, FailureNotice, NotifyHandle, NotifyWriter};
pub use offload::{OffloadConfig, OffloadError, OffloadPool, PoolStatus};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, OrchestratorError, OrchestratorHandle, OrchestratorStatus,
    Syndication,
};
pub use pipeline::{PipelineError, PipelineExecutor, RunReport};
pub use source::{ParserClient, ParserSource, Source};
pub use stage::{SideEffect, Stage, StageDescriptor, StageError};
