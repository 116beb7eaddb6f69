//! Document retrieval for grounding
//!
//! [`DocumentRetriever`] is the seam the orchestrator searches through.
//! [`KnowledgeIndex`] is the in-process implementation: a TF-IDF index
//! seeded with the reference export-control events and extended from
//! JSON-lines knowledge files.

use crate::error::RetrievalError;
use async_trait::async_trait;
use nexus_market::all_events;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A chunk of case material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique chunk id, cited as `[id]`
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    /// Cosine similarity in (0, 1]
    pub score: f64,
    pub metadata: BTreeMap<String, String>,
}

/// Metadata constraints; every set field must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub source_type: Option<String>,
    pub severity: Option<String>,
}

impl MetadataFilter {
    pub fn source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        let field = |key: &str, wanted: &Option<String>| {
            wanted
                .as_deref()
                .is_none_or(|w| metadata.get(key).is_some_and(|v| v.eq_ignore_ascii_case(w)))
        };
        field("source_type", &self.source_type) && field("severity", &self.severity)
    }
}

/// Ranked document search
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Up to `top_k` hits, best first
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>, RetrievalError>;
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "how",
    "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what",
    "when", "which", "who", "why", "with",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn term_counts(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    counts
}

#[derive(Debug)]
struct Entry {
    document: Document,
    terms: HashMap<String, f64>,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: BTreeMap<String, Entry>,
    doc_freq: HashMap<String, usize>,
}

impl IndexState {
    fn insert(&mut self, document: Document) {
        self.remove(&document.id);
        let terms = term_counts(&document.text);
        for term in terms.keys() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        self.entries
            .insert(document.id.clone(), Entry { document, terms });
    }

    fn remove(&mut self, id: &str) {
        let Some(old) = self.entries.remove(id) else {
            return;
        };
        for term in old.terms.keys() {
            if let Some(df) = self.doc_freq.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.doc_freq.remove(term);
                }
            }
        }
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.entries.len() as f64;
        let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }

    fn weights<'a>(&self, counts: &'a HashMap<String, f64>) -> (HashMap<&'a str, f64>, f64) {
        let weights: HashMap<&str, f64> = counts
            .iter()
            .map(|(term, tf)| (term.as_str(), tf * self.idf(term)))
            .collect();
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        (weights, norm)
    }

    fn search(&self, query: &str, top_k: usize, filter: Option<&MetadataFilter>) -> Vec<SearchHit> {
        let query_counts = term_counts(query);
        let (query_weights, query_norm) = self.weights(&query_counts);
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .values()
            .filter(|e| filter.is_none_or(|f| f.matches(&e.document.metadata)))
            .filter_map(|e| {
                let (doc_weights, doc_norm) = self.weights(&e.terms);
                if doc_norm == 0.0 {
                    return None;
                }
                let dot: f64 = query_weights
                    .iter()
                    .filter_map(|(term, qw)| doc_weights.get(term).map(|dw| qw * dw))
                    .sum();
                let score = dot / (query_norm * doc_norm);
                (score > 0.0).then(|| SearchHit {
                    id: e.document.id.clone(),
                    text: e.document.text.clone(),
                    score,
                    metadata: e.document.metadata.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(top_k);
        hits
    }
}

/// In-memory TF-IDF index.
///
/// Cloning shares the underlying index. Reads run concurrently; each
/// mutation holds the write lock for its whole duration.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    state: Arc<RwLock<IndexState>>,
}

impl KnowledgeIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// An index holding one `event_db` document per reference event
    pub async fn with_reference_events() -> Self {
        let index = Self::new();
        let documents = all_events().iter().map(|event| {
            let mut text = format!(
                "{} ({}). {} Severity: {}. Type: {}. Chips affected: {}. Countries: {}. Source: {}.",
                event.title,
                event.date,
                event.description,
                event.severity,
                event.event_type,
                event.chips_affected.join(", "),
                event.countries.join(", "),
                event.source,
            );
            if let Some(notes) = event.notes {
                text.push(' ');
                text.push_str(notes);
            }
            Document::new(event.chunk_id(), text)
                .with_metadata("source_type", "event_db")
                .with_metadata("severity", event.severity.as_str())
                .with_metadata("event_type", event.event_type.as_str())
                .with_metadata("date", event.id.clone())
                .with_metadata("title", event.title)
        });
        index.add_all(documents).await;
        index
    }

    /// Insert or replace a document
    pub async fn add(&self, document: Document) {
        self.state.write().await.insert(document);
    }

    /// Insert or replace many documents under one write lock
    pub async fn add_all(&self, documents: impl IntoIterator<Item = Document>) {
        let mut state = self.state.write().await;
        for document in documents {
            state.insert(document);
        }
    }

    /// Load documents from a JSON-lines file, one [`Document`] per line.
    ///
    /// The whole file is parsed before anything is inserted, so a bad line
    /// leaves the index untouched. Returns the number of documents added.
    pub async fn load_jsonl(&self, path: impl AsRef<Path>) -> Result<usize, RetrievalError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RetrievalError::Io(format!("{}: {e}", path.display())))?;

        let mut documents = Vec::new();
        for (i, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let document: Document =
                serde_json::from_str(line).map_err(|e| RetrievalError::Parse {
                    line: i + 1,
                    reason: e.to_string(),
                })?;
            if document.id.trim().is_empty() {
                return Err(RetrievalError::Parse {
                    line: i + 1,
                    reason: "empty document id".to_string(),
                });
            }
            documents.push(document);
        }

        let count = documents.len();
        self.add_all(documents).await;
        info!(path = %path.display(), documents = count, "loaded knowledge file");
        Ok(count)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.doc_freq.clear();
    }
}

#[async_trait]
impl DocumentRetriever for KnowledgeIndex {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("query is empty".to_string()));
        }
        let hits = self.state.read().await.search(query, top_k, filter);
        debug!(top_k, hits = hits.len(), "knowledge search");
        Ok(hits)
    }
}

/// Render hits as the citation-tagged context block shown to the model
pub fn format_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No relevant documents found in the knowledge base.".to_string();
    }
    hits.iter()
        .map(|hit| {
            let source = hit.metadata.get("source_type").map_or("unknown", String::as_str);
            format!("[{}] (source: {source})\n{}", hit.id, hit.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn index() -> KnowledgeIndex {
        let index = KnowledgeIndex::new();
        index
            .add_all([
                Document::new("case:chunk_0", "Nvidia designed the A800 to comply with the October rules")
                    .with_metadata("source_type", "case_study"),
                Document::new("method:chunk_0", "The market model regresses stock returns on benchmark returns")
                    .with_metadata("source_type", "methodology"),
                Document::new("case:chunk_1", "TSMC manufactures most restricted accelerators")
                    .with_metadata("source_type", "case_study")
                    .with_metadata("severity", "High"),
            ])
            .await;
        index
    }

    #[tokio::test]
    async fn test_ranking() {
        let index = index().await;
        let hits = index.search("market model returns", 6, None).await.unwrap();
        assert_eq!(hits[0].id, "method:chunk_0");
        assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0 + 1e-12));

        // Nothing shares a term with the query.
        let hits = index.search("dividend yield", 6, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let index = index().await;
        let filter = MetadataFilter::default().source_type("case_study");
        let hits = index.search("rules accelerators", 6, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 2);

        let filter = filter.severity("high");
        let hits = index.search("rules accelerators", 6, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "case:chunk_1");
    }

    #[tokio::test]
    async fn test_score_ties_order_by_id() {
        let index = KnowledgeIndex::new();
        index.add(Document::new("b", "export controls")).await;
        index.add(Document::new("a", "export controls")).await;
        let hits = index.search("export", 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_replace_and_clear() {
        let index = index().await;
        index.add(Document::new("case:chunk_0", "replaced text about foundries")).await;
        assert_eq!(index.len().await, 3);
        let hits = index.search("A800", 6, None).await.unwrap();
        assert!(hits.is_empty());

        index.clear().await;
        assert!(index.is_empty().await);
        assert!(matches!(
            index.search("  ", 6, None).await,
            Err(RetrievalError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_reference_events_are_indexed() {
        let index = KnowledgeIndex::with_reference_events().await;
        assert_eq!(index.len().await, all_events().len());

        let filter = MetadataFilter::default().source_type("event_db").severity("Critical");
        let hits = index.search("export controls", 10, Some(&filter)).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.id.starts_with("event:")));
        assert!(hits.iter().all(|h| h.metadata["severity"] == "Critical"));
    }

    #[tokio::test]
    async fn test_load_jsonl() {
        let dir = std::env::temp_dir().join(format!("nexus-chat-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let good = dir.join("good.jsonl");
        tokio::fs::write(
            &good,
            "{\"id\":\"doc:0\",\"text\":\"Entity List additions\",\"metadata\":{\"source_type\":\"case_study\"}}\n\n{\"id\":\"doc:1\",\"text\":\"Gaudi accelerators\"}\n",
        )
        .await
        .unwrap();
        let index = KnowledgeIndex::new();
        assert_eq!(index.load_jsonl(&good).await.unwrap(), 2);
        let hits = index.search("entity list", 6, None).await.unwrap();
        assert_eq!(hits[0].id, "doc:0");

        let bad = dir.join("bad.jsonl");
        tokio::fs::write(&bad, "{\"id\":\"doc:2\",\"text\":\"ok\"}\nnot json\n")
            .await
            .unwrap();
        let err = index.load_jsonl(&bad).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Parse { line: 2, .. }));
        assert_eq!(index.len().await, 2);

        let err = index.load_jsonl(dir.join("missing.jsonl")).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Io(_)));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn test_format_context() {
        let hits = vec![
            SearchHit {
                id: "event:2022-10-07".to_string(),
                text: "October 7 rules".to_string(),
                score: 0.9,
                metadata: BTreeMap::from([("source_type".to_string(), "event_db".to_string())]),
            },
            SearchHit {
                id: "x".to_string(),
                text: "other".to_string(),
                score: 0.1,
                metadata: BTreeMap::new(),
            },
        ];
        assert_eq!(
            format_context(&hits),
            "[event:2022-10-07] (source: event_db)\nOctober 7 rules\n\n---\n\n[x] (source: unknown)\nother"
        );
        assert!(format_context(&[]).starts_with("No relevant documents"));
    }
}
