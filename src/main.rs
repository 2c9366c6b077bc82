//! kubesage - HTTP server and controller entry point.
//!
//! Wires the task store, skill registry, tool router, alert aggregator,
//! and the reconciler driver, then serves the HTTP API until interrupted.

use std::sync::Arc;

use kubesage::alert::{Aggregator, TaskCreator};
use kubesage::api::{self, AppState};
use kubesage::config::Config;
use kubesage::llm::{LlmClient, OpenAiChatClient, OpenAiEmbedder};
use kubesage::memory::{InMemoryEventStore, InMemoryKnowledgeStore, KnowledgeStore};
use kubesage::reconciler::{ControllerDriver, ReconcilerSettings, TaskReconciler};
use kubesage::skill::SkillRegistry;
use kubesage::store::MemoryTaskStore;
use kubesage::tools::ToolRouter;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kubesage=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        model = %config.llm.model,
        namespace = %config.target_namespace,
        "loaded configuration"
    );

    let store = Arc::new(MemoryTaskStore::new());
    let skills = Arc::new(SkillRegistry::with_builtin_skills());

    // Tool providers register here; cluster-inspection bridges are deployed
    // alongside the server and attach through the provider contract.
    let tools = Arc::new(ToolRouter::new());

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiChatClient::new(
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        config.llm.base_url.clone(),
    ));

    let mut aggregator = Aggregator::new(
        TaskCreator::new(store.clone(), &config.target_namespace),
        config.window_size,
        config.sweep_interval,
    );
    let mut reconciler = TaskReconciler::new(
        store.clone(),
        Arc::clone(&llm),
        Arc::clone(&tools),
        Arc::clone(&skills),
        ReconcilerSettings {
            agent_timeout: config.agent_timeout,
            default_max_steps: config.default_max_steps,
            recent_event_limit: config.recent_event_limit,
        },
    );

    if config.l2_enabled {
        let events = Arc::new(InMemoryEventStore::new());
        aggregator = aggregator.with_l2_store(events.clone());
        reconciler = reconciler.with_l2_store(events);
        info!("l2 recent-events store enabled");
    }

    if config.l3_enabled {
        let knowledge = Arc::new(InMemoryKnowledgeStore::new());
        knowledge.init_schema().await?;
        let embedder = Arc::new(OpenAiEmbedder::new(
            config.llm.api_key.clone(),
            config.embed_model.clone(),
            config.llm.base_url.clone(),
        ));
        reconciler = reconciler.with_knowledge_base(knowledge, embedder);
        info!(model = %config.embed_model, "l3 knowledge base enabled");
    }

    let aggregator = Arc::new(aggregator);
    let driver = ControllerDriver::new(Arc::new(reconciler), store.clone());

    let shutdown = CancellationToken::new();

    {
        let aggregator = Arc::clone(&aggregator);
        let token = shutdown.clone();
        tokio::spawn(async move { aggregator.run(token).await });
    }
    {
        let token = shutdown.clone();
        tokio::spawn(async move { driver.run(token).await });
    }
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received; shutting down");
                token.cancel();
            }
        });
    }

    let state = Arc::new(AppState {
        store,
        aggregator,
        skills,
        tools,
        llm: Some(llm),
        default_namespace: config.target_namespace.clone(),
    });
    api::serve(&config.host, config.port, state, shutdown).await
}
