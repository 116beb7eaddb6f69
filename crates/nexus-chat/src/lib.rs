//! Grounding-aware research chat
//!
//! Answers questions about the export-control case by combining retrieved
//! case material with deterministic market tools. The model plans and
//! phrases; it is never trusted for numbers. Every answer either cites a
//! retrieved chunk or rests on a tool result, or it is replaced by the
//! fixed [`REFUSAL`].
//!
//! - [`retriever`]: the [`DocumentRetriever`] seam and the in-memory
//!   [`KnowledgeIndex`]
//! - [`router`]: keyword planner used when the model skips tools
//! - [`orchestrator`]: the per-turn state machine
//! - [`answer`]: [`GroundedAnswer`] and the refusal gate

pub mod answer;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod prompts;
pub mod retriever;
pub mod router;

pub use answer::{CallSource, GroundedAnswer, RefusalReason, ToolCallRecord};
pub use config::{ChatConfig, ChatConfigBuilder};
pub use context::ResearchContext;
pub use error::{ChatError, Result, RetrievalError};
pub use orchestrator::{Orchestrator, TurnState};
pub use prompts::REFUSAL;
pub use retriever::{Document, DocumentRetriever, KnowledgeIndex, MetadataFilter, SearchHit, format_context};
pub use router::{Intent, IntentRouter};
