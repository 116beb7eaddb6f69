//! Grounded answers and the refusal gate

use crate::orchestrator::TurnState;
use crate::prompts::REFUSAL;
use crate::retriever::SearchHit;
use nexus_tools::{ToolError, ToolResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Who asked for a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSource {
    Model,
    /// The keyword router, standing in for the model
    Router,
}

/// One tool invocation made during a turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub source: CallSource,
    /// Arguments as requested, before coercion
    pub arguments: Value,
    /// Evidence id of the successful result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCallRecord {
    pub(crate) fn new(
        call_id: &str,
        tool_name: &str,
        source: CallSource,
        arguments: &Value,
        outcome: &Result<ToolResult, ToolError>,
    ) -> Self {
        let mut record = Self {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            source,
            arguments: arguments.clone(),
            result_id: None,
            output: None,
            error: None,
            duration_ms: None,
        };
        match outcome {
            Ok(result) => {
                record.result_id = Some(result.id.clone());
                record.output = Some(result.output.clone());
                record.duration_ms = Some(result.duration_ms);
            }
            Err(e) => record.error = Some(e.to_string()),
        }
        record
    }

    pub fn succeeded(&self) -> bool {
        self.result_id.is_some()
    }
}

/// Why a turn ended in the refusal text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    /// The composed answer was empty
    EmptyAnswer,
    /// Neither a retrieved chunk was cited nor a tool result used
    NoEvidence,
    /// The turn ran past its deadline
    TurnTimeout,
}

/// Final output of one chat turn.
///
/// Either `refused` is set and `text` is exactly [`REFUSAL`], or at least
/// one of `citations` and `tool_evidence` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundedAnswer {
    pub text: String,
    /// Ids of retrieved chunks the text cites
    pub citations: BTreeSet<String>,
    /// Ids of the tool results the answer rests on
    pub tool_evidence: BTreeSet<String>,
    pub refused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal_reason: Option<RefusalReason>,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Retrieval and model failures met along the way; tool failures are
    /// on their [`ToolCallRecord`]
    pub errors: Vec<String>,
    /// States visited, in order
    pub trace: Vec<TurnState>,
}

impl GroundedAnswer {
    /// Apply the refusal gate to a composed draft
    pub(crate) fn validate(
        draft: &str,
        hits: &[SearchHit],
        tool_calls: Vec<ToolCallRecord>,
        errors: Vec<String>,
    ) -> Self {
        let cited = bracketed_ids(draft);
        let citations: BTreeSet<String> = hits
            .iter()
            .filter(|hit| cited.contains(hit.id.as_str()))
            .map(|hit| hit.id.clone())
            .collect();
        let tool_evidence: BTreeSet<String> = tool_calls
            .iter()
            .filter_map(|c| c.result_id.clone())
            .collect();

        let reason = if draft.trim().is_empty() {
            Some(RefusalReason::EmptyAnswer)
        } else if citations.is_empty() && tool_evidence.is_empty() {
            Some(RefusalReason::NoEvidence)
        } else {
            None
        };

        if let Some(reason) = reason {
            return Self::refusal(reason, tool_calls, errors);
        }

        let mut text = draft.trim().to_string();
        let failed: Vec<String> = tool_calls
            .iter()
            .filter_map(|c| c.error.clone())
            .collect();
        if !failed.is_empty() {
            text.push_str("\n\n**Tool errors**:\n");
            for line in failed {
                text.push_str(&format!("- {line}\n"));
            }
            text.truncate(text.trim_end().len());
        }

        Self {
            text,
            citations,
            tool_evidence,
            refused: false,
            refusal_reason: None,
            tool_calls,
            errors,
            trace: Vec::new(),
        }
    }

    /// The fixed refusal, keeping the turn's diagnostics
    pub(crate) fn refusal(
        reason: RefusalReason,
        tool_calls: Vec<ToolCallRecord>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            text: REFUSAL.to_string(),
            citations: BTreeSet::new(),
            tool_evidence: BTreeSet::new(),
            refused: true,
            refusal_reason: Some(reason),
            tool_calls,
            errors,
            trace: Vec::new(),
        }
    }

    /// Whether any evidence backs the answer
    pub fn is_grounded(&self) -> bool {
        !self.refused && (!self.citations.is_empty() || !self.tool_evidence.is_empty())
    }
}

/// Whether `text` cites at least one of the retrieved chunks
pub(crate) fn cites_any(text: &str, hits: &[SearchHit]) -> bool {
    let cited = bracketed_ids(text);
    hits.iter().any(|hit| cited.contains(hit.id.as_str()))
}

/// Every comma- or semicolon-separated item inside square brackets
fn bracketed_ids(text: &str) -> BTreeSet<&str> {
    let mut ids = BTreeSet::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        for id in after[..close].split([',', ';']) {
            let id = id.trim();
            if !id.is_empty() {
                ids.insert(id);
            }
        }
        rest = &after[close + 1..];
    }
    ids
}
