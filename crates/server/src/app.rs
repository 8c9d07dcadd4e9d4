//! Wires configuration into a runnable application.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use newsroom_core::stages::{
    ChatGateway, ChatModel, CreativePicker, HtmlCleaner, PostWriter, RelevanceFilter, SeenFilter,
    SemanticDuplicateFilter, Summarizer, TranslationReviewer, Translator,
};
use newsroom_core::{
    create_notify_system, ApprovalResolver, ApprovalStore, ChannelError, Config, LogNotifier,
    LogReviewSurface, Notifier, NotifyWriter, OffloadPool, Orchestrator, OrchestratorConfig,
    ParserClient, ParserSource, PipelineExecutor, Publisher, ReviewSurface, Source,
    SqliteApprovalStore, Stage, Syndication, TelegramClient, TelegramPublisher,
    UnconfiguredPublisher,
};

use crate::state::AppState;

/// External surfaces the application talks to.
pub struct Surfaces {
    pub review: Arc<dyn ReviewSurface>,
    pub notifier: Arc<dyn Notifier>,
    pub publisher: Arc<dyn Publisher>,
    /// Present when Telegram is configured; also the decision source.
    pub telegram: Option<Arc<TelegramClient>>,
}

impl Surfaces {
    /// Telegram when configured, log-only adapters otherwise.
    pub fn from_config(config: &Config) -> Result<Self, ChannelError> {
        match &config.telegram {
            Some(telegram_config) => {
                info!(
                    main_channel = %telegram_config.main_channel,
                    "Initializing Telegram surfaces"
                );
                let client = Arc::new(TelegramClient::new(telegram_config.clone())?);
                let publisher = TelegramPublisher::new(
                    Arc::clone(&client),
                    telegram_config.main_channel.clone(),
                );
                Ok(Self {
                    review: client.clone(),
                    notifier: client.clone(),
                    publisher: Arc::new(publisher),
                    telegram: Some(client),
                })
            }
            None => {
                info!("Telegram not configured, using log-only surfaces");
                Ok(Self {
                    review: Arc::new(LogReviewSurface),
                    notifier: Arc::new(LogNotifier),
                    publisher: Arc::new(UnconfiguredPublisher),
                    telegram: None,
                })
            }
        }
    }
}

/// Everything `main` needs to start the service.
pub struct App {
    pub state: Arc<AppState>,
    pub orchestrator: Orchestrator,
    pub notify_writer: NotifyWriter,
    pub telegram: Option<Arc<TelegramClient>>,
}

impl App {
    /// Open the durable store and build every component from `config`.
    pub fn build(config: Config) -> Result<Self> {
        let store: Arc<dyn ApprovalStore> = Arc::new(
            SqliteApprovalStore::new(&config.store.path)
                .with_context(|| format!("Failed to open store at {:?}", config.store.path))?,
        );
        info!(path = ?config.store.path, "Approval store initialized");

        let surfaces = Surfaces::from_config(&config).context("Failed to create surfaces")?;
        Ok(Self::assemble(config, store, surfaces))
    }

    /// Build the application around an already opened store and surfaces.
    pub fn assemble(config: Config, store: Arc<dyn ApprovalStore>, surfaces: Surfaces) -> Self {
        let pool = OffloadPool::new(config.offload.clone());
        let retry = config.store.retry.clone();
        let (notify, notify_writer) =
            create_notify_system(Arc::clone(&surfaces.notifier), config.notify.buffer_size);

        let gateway = build_gateway(&config);
        let stages = build_stages(&config, &store, gateway.as_ref());
        let sources = build_sources(&config);
        let syndication = build_syndication(&config, gateway.as_ref(), surfaces.telegram.as_ref());

        let executor = Arc::new(PipelineExecutor::new(
            pool.clone(),
            Arc::clone(&store),
            Arc::clone(&surfaces.review),
            notify.clone(),
            retry.clone(),
        ));
        let resolver = ApprovalResolver::new(
            Arc::clone(&store),
            pool.clone(),
            Arc::clone(&surfaces.publisher),
            retry,
        );

        let mut orchestrator = Orchestrator::new(
            OrchestratorConfig::from(&config.scheduler),
            executor,
            resolver,
            surfaces.review,
            notify,
        )
        .with_sources(sources)
        .with_stages(stages);
        if let Some(syndication) = syndication {
            orchestrator = orchestrator.with_syndication(syndication);
        }

        let state = Arc::new(AppState::new(config, store, pool, orchestrator.handle()));

        Self {
            state,
            orchestrator,
            notify_writer,
            telegram: surfaces.telegram,
        }
    }
}

fn build_gateway(config: &Config) -> Option<Arc<dyn ChatModel>> {
    config.gateway.as_ref().map(|gateway_config| {
        info!(url = %gateway_config.url, "Initializing chat gateway");
        Arc::new(ChatGateway::new(gateway_config)) as Arc<dyn ChatModel>
    })
}

/// Main stage chain: seen filter, model stages with duplicate control,
/// then formatting.
pub fn build_stages(
    config: &Config,
    store: &Arc<dyn ApprovalStore>,
    gateway: Option<&Arc<dyn ChatModel>>,
) -> Vec<Arc<dyn Stage>> {
    let mut stages: Vec<Arc<dyn Stage>> = vec![Arc::new(SeenFilter::new(Arc::clone(store)))];

    if let (Some(gateway), Some(gateway_config)) = (gateway, &config.gateway) {
        let models = &gateway_config.models;
        stages.push(Arc::new(Summarizer::new(
            Arc::clone(gateway),
            models.summarize.clone(),
        )));
        stages.push(Arc::new(RelevanceFilter::new(
            Arc::clone(gateway),
            models.relevance.clone(),
        )));
        stages.push(Arc::new(SemanticDuplicateFilter::new(
            Arc::clone(store),
            Arc::clone(gateway),
            models.dedup.clone(),
            config.content.dedup_window_days,
        )));
        stages.push(Arc::new(PostWriter::new(
            Arc::clone(gateway),
            models.write.clone(),
        )));
    }

    stages.push(Arc::new(HtmlCleaner::new(config.content.signature.clone())));
    stages.push(Arc::new(CreativePicker::new()));
    stages
}

/// One parser-backed source per enabled `[[sources]]` entry.
pub fn build_sources(config: &Config) -> Vec<Arc<dyn Source>> {
    let Some(parser_config) = &config.parser else {
        if !config.sources.is_empty() {
            info!("No parser configured, sources ignored");
        }
        return Vec::new();
    };

    config
        .sources
        .iter()
        .filter(|source| source.enabled)
        .map(|source| {
            info!(name = %source.name, url = %source.url, "Registering source");
            Arc::new(ParserSource::new(source, ParserClient::new(parser_config)))
                as Arc<dyn Source>
        })
        .collect()
}

/// Translated copy to the secondary channel, when every piece is configured.
pub fn build_syndication(
    config: &Config,
    gateway: Option<&Arc<dyn ChatModel>>,
    telegram: Option<&Arc<TelegramClient>>,
) -> Option<Syndication> {
    let language = config.content.translate_to.as_ref()?;
    let gateway = gateway?;
    let gateway_config = config.gateway.as_ref()?;
    let telegram = telegram?;
    let channel = telegram.config().secondary_channel.clone()?;

    info!(language = %language, channel = %channel, "Syndication enabled");
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(Translator::new(
            Arc::clone(gateway),
            gateway_config.models.translate.clone(),
            language,
        )),
        Arc::new(TranslationReviewer::new(
            Arc::clone(gateway),
            gateway_config.models.review.clone(),
            language,
        )),
        Arc::new(HtmlCleaner::new(config.content.secondary_signature.clone())),
    ];
    let publisher = Arc::new(TelegramPublisher::new(Arc::clone(telegram), channel));
    Some(Syndication::new(stages, publisher))
}
