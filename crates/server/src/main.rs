//! Sales agent server entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use sales_agent_agent::{
    ConversationGraph, HandlerRegistry, InputAnalyzer, Orchestrator, ProductQaHandler,
    ScheduleDemoHandler,
};
use sales_agent_config::{load_settings, Settings};
use sales_agent_llm::{CompletionBackend, TogetherBackend, TogetherConfig};
use sales_agent_persistence::PersistenceLayer;
use sales_agent_rag::{
    HttpEmbedder, HttpEmbedderConfig, PassageMatch, PassageRetriever, ProductRetriever, RagError,
    VectorStore, VectorStoreConfig,
};
use sales_agent_server::{create_router, AppState, SessionRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("SALES_AGENT_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting Sales Agent Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = env.as_deref().unwrap_or("default"),
        port = config.server.port,
        "Configuration loaded"
    );

    // Persistence: ScyllaDB when enabled, in-memory otherwise
    let persistence = if config.persistence.enabled {
        tracing::info!("Initializing ScyllaDB persistence layer...");
        match init_persistence(&config).await {
            Ok(layer) => {
                tracing::info!(
                    hosts = ?config.persistence.scylla_hosts,
                    keyspace = %config.persistence.keyspace,
                    "ScyllaDB persistence initialized"
                );
                layer
            }
            Err(e) => {
                tracing::error!(
                    "Failed to initialize ScyllaDB: {}. Falling back to in-memory.",
                    e
                );
                PersistenceLayer::in_memory()
            }
        }
    } else {
        tracing::info!("Persistence disabled, using in-memory stores");
        PersistenceLayer::in_memory()
    };

    let backend: Arc<dyn CompletionBackend> =
        Arc::new(TogetherBackend::new(TogetherConfig::from(&config.llm))?);
    tracing::info!(model = backend.model_name(), "Completion backend ready");

    // Retrieval: Qdrant-backed when enabled, otherwise product Q&A
    // degrades to the apology path
    let retriever: Arc<dyn PassageRetriever> = if config.rag.enabled {
        match init_retriever(&config).await {
            Ok(retriever) => {
                tracing::info!(
                    endpoint = %config.rag.qdrant_endpoint,
                    collection = %config.rag.collection,
                    "Product retriever initialized"
                );
                Arc::new(retriever)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize vector store: {}. Product Q&A will be degraded.",
                    e
                );
                Arc::new(DisabledRetriever)
            }
        }
    } else {
        tracing::info!("Retrieval disabled, product Q&A will be degraded");
        Arc::new(DisabledRetriever)
    };

    let graph = Arc::new(ConversationGraph::builtin());
    let analyzer = InputAnalyzer::new(backend.clone());
    let handlers = HandlerRegistry::new(
        Arc::new(ProductQaHandler::new(
            backend.clone(),
            retriever,
            config.rag.top_k,
        )),
        Arc::new(ScheduleDemoHandler::new(
            backend,
            persistence.customers.clone(),
            persistence.events.clone(),
        )),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        graph,
        analyzer,
        handlers,
        persistence.messages.clone(),
        persistence.customers.clone(),
    ));

    let sessions = Arc::new(SessionRegistry::new(
        config.server.max_sessions,
        Duration::from_secs(config.server.session_timeout_secs),
        Duration::from_secs(config.server.cleanup_interval_secs),
    ));
    let cleanup_shutdown = sessions.start_cleanup_task();

    let port = config.server.port;
    let state = AppState::new(Arc::new(config), sessions, orchestrator, persistence);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = cleanup_shutdown.send(true);
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("sales_agent={},tower_http=debug", level).into()
    });

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn init_persistence(
    config: &Settings,
) -> Result<PersistenceLayer, sales_agent_persistence::PersistenceError> {
    let scylla_config = sales_agent_persistence::ScyllaConfig {
        hosts: config.persistence.scylla_hosts.clone(),
        keyspace: config.persistence.keyspace.clone(),
        replication_factor: config.persistence.replication_factor,
        ..Default::default()
    };

    sales_agent_persistence::init(scylla_config).await
}

async fn init_retriever(config: &Settings) -> Result<ProductRetriever, RagError> {
    let store = VectorStore::new(VectorStoreConfig::from(&config.rag)).await?;
    store.ensure_collection().await?;

    let embedder = HttpEmbedder::new(HttpEmbedderConfig::from(&config.rag));
    Ok(ProductRetriever::new(Arc::new(embedder), Arc::new(store)))
}

/// Stand-in retriever for when retrieval is disabled or unreachable.
/// Every search fails, which drops product Q&A into its apology path.
struct DisabledRetriever;

#[async_trait]
impl PassageRetriever for DisabledRetriever {
    async fn search_by_text(
        &self,
        _question: &str,
        _top_k: usize,
    ) -> Result<Vec<PassageMatch>, RagError> {
        Err(RagError::Connection("retrieval is disabled".to_string()))
    }
}
