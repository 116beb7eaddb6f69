//! Shared state for research turns

use crate::error::Result;
use crate::retriever::{DocumentRetriever, KnowledgeIndex};
use nexus_market::{EventStudyEngine, MarketConfig, MarketDataLoader, register_market_tools};
use nexus_tools::ToolRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything a turn reads: the document retriever, the tool registry and
/// the event-study engine behind the market tools.
///
/// Built once at startup with [`ResearchContext::initialize`] and shared by
/// every turn; the knowledge index and the CAR cache inside are the only
/// process-wide caches and are released when the last clone is dropped.
#[derive(Clone)]
pub struct ResearchContext {
    retriever: Arc<dyn DocumentRetriever>,
    registry: Arc<ToolRegistry>,
    engine: Option<Arc<EventStudyEngine>>,
}

impl ResearchContext {
    /// Assemble a context from parts
    pub fn new(retriever: Arc<dyn DocumentRetriever>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            retriever,
            registry,
            engine: None,
        }
    }

    /// Build the full context: the engine and its cache over `loader`, the
    /// four market tools, and a knowledge index seeded with the reference
    /// events plus the optional JSON-lines file.
    pub async fn initialize(
        loader: Arc<dyn MarketDataLoader>,
        config: MarketConfig,
        knowledge_file: Option<&Path>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let engine = Arc::new(EventStudyEngine::from_config(loader, &config));
        let registry = Arc::new(ToolRegistry::new());
        register_market_tools(&registry, engine.clone(), config);

        let index = KnowledgeIndex::with_reference_events().await;
        if let Some(path) = knowledge_file {
            index.load_jsonl(path).await?;
        }

        info!(
            tools = registry.len(),
            documents = index.len().await,
            "research context ready"
        );

        Ok(Self {
            retriever: Arc::new(index),
            registry,
            engine: Some(engine),
        })
    }

    pub fn retriever(&self) -> &Arc<dyn DocumentRetriever> {
        &self.retriever
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The engine behind the market tools, when built by `initialize`
    pub fn engine(&self) -> Option<&Arc<EventStudyEngine>> {
        self.engine.as_ref()
    }
}

impl std::fmt::Debug for ResearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchContext")
            .field("tools", &self.registry.names())
            .field("engine", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}
