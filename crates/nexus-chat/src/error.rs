//! Error types for the research chat

use nexus_llm::LLMError;
use nexus_market::MarketError;
use thiserror::Error;

/// Result type for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Failures of the document retriever
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// The index could not be queried
    #[error("retriever unavailable: {0}")]
    Unavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A knowledge file could not be read
    #[error("failed to read knowledge file: {0}")]
    Io(String),

    /// A knowledge file line is not a valid document
    #[error("invalid document on line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Errors surfaced while setting up or running the chat.
///
/// A turn itself never fails: [`crate::Orchestrator::answer`] folds every
/// error into the answer or a refusal. These are for construction and for
/// the individual stages.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("market error: {0}")]
    Market(#[from] MarketError),

    #[error("configuration error: {0}")]
    Config(String),

    /// An external call did not finish in time
    #[error("{stage} timed out after {ms}ms")]
    Timeout { stage: &'static str, ms: u64 },
}
