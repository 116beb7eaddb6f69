//! Grounding-aware orchestrator
//!
//! One call to [`Orchestrator::answer`] runs one user turn through a fixed
//! sequence of states:
//!
//! ```text
//! Start -> Retrieve -> Decide -> (Invoke -> Decide)* -> Compose -> Validate -> End
//!                                                                     \-> Refuse -> End
//! ```
//!
//! The model only plans and writes prose. Numbers come from tools, every
//! tool runs through the registry, and the validate step replaces any
//! answer without a citation or tool evidence with the fixed refusal.

use crate::answer::{CallSource, GroundedAnswer, RefusalReason, ToolCallRecord, cites_any};
use crate::config::ChatConfig;
use crate::context::ResearchContext;
use crate::error::ChatError;
use crate::prompts::{self, COMPOSE_INSTRUCTION};
use crate::retriever::{SearchHit, format_context};
use crate::router::IntentRouter;
use futures::future::join_all;
use nexus_llm::{Decision, Message, ResearchLlm, ToolCallRequest, ToolDefinition};
use nexus_tools::{ToolResult, ToolSchema};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// States of one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Start,
    Retrieve,
    Decide,
    Invoke,
    Compose,
    Validate,
    Refuse,
    End,
}

impl TurnState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Retrieve => "retrieve",
            Self::Decide => "decide",
            Self::Invoke => "invoke",
            Self::Compose => "compose",
            Self::Validate => "validate",
            Self::Refuse => "refuse",
            Self::End => "end",
        }
    }
}

/// Per-turn bookkeeping
struct Turn {
    id: String,
    trace: Vec<TurnState>,
    calls: Vec<ToolCallRecord>,
    errors: Vec<String>,
}

impl Turn {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            trace: Vec::new(),
            calls: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn enter(&mut self, state: TurnState) {
        info!(turn_id = %self.id, state = state.as_str(), "turn state");
        self.trace.push(state);
    }

    fn error(&mut self, error: impl std::fmt::Display) {
        warn!(turn_id = %self.id, error = %error, "turn error");
        self.errors.push(error.to_string());
    }

    fn finish(&mut self, mut answer: GroundedAnswer) -> GroundedAnswer {
        if answer.refused {
            self.enter(TurnState::Refuse);
        }
        self.enter(TurnState::End);
        answer.trace = std::mem::take(&mut self.trace);
        info!(
            turn_id = %self.id,
            refused = answer.refused,
            citations = answer.citations.len(),
            tool_evidence = answer.tool_evidence.len(),
            "turn finished"
        );
        answer
    }
}

async fn bounded<T, E>(
    stage: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, ChatError>
where
    ChatError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ChatError::from),
        Err(_) => Err(ChatError::Timeout {
            stage,
            ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Runs research turns over a [`ResearchContext`]
pub struct Orchestrator {
    llm: ResearchLlm,
    context: ResearchContext,
    config: ChatConfig,
    router: IntentRouter,
}

impl Orchestrator {
    pub fn new(llm: ResearchLlm, context: ResearchContext, config: ChatConfig) -> Self {
        Self {
            llm,
            context,
            config,
            router: IntentRouter::new(),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn context(&self) -> &ResearchContext {
        &self.context
    }

    /// Answer one question.
    ///
    /// Never fails: retrieval, model and tool errors are recorded on the
    /// answer, and a turn that overruns `turn_timeout` ends in a refusal.
    pub async fn answer(&self, question: &str, history: &[Message]) -> GroundedAnswer {
        let mut turn = Turn::new();
        let limit = self.config.turn_timeout;

        let outcome = tokio::time::timeout(limit, self.run(question, history, &mut turn)).await;
        match outcome {
            Ok(answer) => answer,
            Err(_) => {
                turn.error(ChatError::Timeout {
                    stage: "turn",
                    ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                });
                let calls = std::mem::take(&mut turn.calls);
                let errors = std::mem::take(&mut turn.errors);
                turn.finish(GroundedAnswer::refusal(
                    RefusalReason::TurnTimeout,
                    calls,
                    errors,
                ))
            }
        }
    }

    async fn run(&self, question: &str, history: &[Message], turn: &mut Turn) -> GroundedAnswer {
        turn.enter(TurnState::Start);

        turn.enter(TurnState::Retrieve);
        let hits = self.retrieve(question, turn).await;

        let schemas = self.context.registry().schemas();
        let system = prompts::system_prompt(&schemas);
        let definitions: Vec<ToolDefinition> = schemas.iter().map(ToolSchema::to_definition).collect();

        let mut messages = history.to_vec();
        messages.push(Message::user(prompts::context_message(
            &format_context(&hits),
            question,
        )));

        let mut draft = None;
        for round in 0..self.config.max_tool_rounds {
            turn.enter(TurnState::Decide);
            let decision = bounded(
                "decide",
                self.config.llm_timeout,
                self.llm.decide(&system, &messages, &definitions),
            )
            .await;

            let calls: Vec<(ToolCallRequest, CallSource)> = match decision {
                Ok(Decision::ToolCalls(calls)) => {
                    calls.into_iter().map(|c| (c, CallSource::Model)).collect()
                }
                Ok(Decision::Text(text)) if cites_any(&text, &hits) => {
                    draft = Some(text);
                    break;
                }
                Ok(Decision::Text(text)) => match self.fallback(question, round, turn) {
                    Some(call) => {
                        info!(turn_id = %turn.id, tool_name = %call.name, "model answered without tools, routing");
                        vec![(call, CallSource::Router)]
                    }
                    None => {
                        draft = Some(text);
                        break;
                    }
                },
                Err(e) => {
                    turn.error(format!("decide failed: {e}"));
                    match self.fallback(question, round, turn) {
                        Some(call) => vec![(call, CallSource::Router)],
                        None => break,
                    }
                }
            };

            turn.enter(TurnState::Invoke);
            self.invoke(calls, &mut messages, turn).await;
        }

        turn.enter(TurnState::Compose);
        let draft = match draft {
            Some(text) => text,
            None => self.compose(&system, &mut messages, turn).await,
        };

        turn.enter(TurnState::Validate);
        let calls = std::mem::take(&mut turn.calls);
        let errors = std::mem::take(&mut turn.errors);
        turn.finish(GroundedAnswer::validate(&draft, &hits, calls, errors))
    }

    async fn retrieve(&self, question: &str, turn: &mut Turn) -> Vec<SearchHit> {
        let search = self
            .context
            .retriever()
            .search(question, self.config.top_k, None);
        match bounded("retrieval", self.config.retrieval_timeout, search).await {
            Ok(hits) => {
                info!(turn_id = %turn.id, hits = hits.len(), "retrieved context");
                hits
            }
            Err(e) => {
                turn.error(format!("retrieval failed: {e}"));
                Vec::new()
            }
        }
    }

    /// Router plan for an uncited first-round answer given without any tool
    fn fallback(&self, question: &str, round: usize, turn: &Turn) -> Option<ToolCallRequest> {
        if !self.config.router_fallback || round > 0 || !turn.calls.is_empty() {
            return None;
        }
        self.router
            .plan(question)
            .filter(|call| self.context.registry().get(&call.name).is_some())
    }

    /// Run every call concurrently and feed the results back as messages
    async fn invoke(
        &self,
        calls: Vec<(ToolCallRequest, CallSource)>,
        messages: &mut Vec<Message>,
        turn: &mut Turn,
    ) {
        let requests: Vec<ToolCallRequest> = calls.iter().map(|(c, _)| c.clone()).collect();
        messages.push(Decision::ToolCalls(requests).to_message());

        let registry = self.context.registry();
        let outcomes = join_all(calls.iter().map(|(call, _)| {
            registry.invoke_with_timeout(&call.name, &call.arguments, self.config.tool_timeout)
        }))
        .await;

        for ((call, source), outcome) in calls.iter().zip(outcomes) {
            match &outcome {
                Ok(result) => messages.push(Message::tool_result(&call.id, tool_payload(result))),
                Err(e) => messages.push(Message::tool_error(&call.id, e.to_string())),
            }
            turn.calls.push(ToolCallRecord::new(
                &call.id,
                &call.name,
                *source,
                &call.arguments,
                &outcome,
            ));
        }
    }

    /// Final tool-free answer, or a plain rendering of the tool results when
    /// the model cannot be reached
    async fn compose(&self, system: &str, messages: &mut Vec<Message>, turn: &mut Turn) -> String {
        messages.push(Message::user(COMPOSE_INSTRUCTION));
        match bounded(
            "compose",
            self.config.llm_timeout,
            self.llm.compose(system, messages),
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                turn.error(format!("compose failed: {e}"));
                tool_digest(&turn.calls)
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("llm", &self.llm)
            .field("context", &self.context)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn tool_payload(result: &ToolResult) -> String {
    json!({
        "evidence_id": result.id,
        "tool": result.tool_name,
        "arguments": result.arguments,
        "output": result.output,
    })
    .to_string()
}

/// Raw tool outputs, one per successful call; empty when none succeeded
fn tool_digest(calls: &[ToolCallRecord]) -> String {
    let lines: Vec<String> = calls
        .iter()
        .filter_map(|c| {
            let id = c.result_id.as_ref()?;
            let output = c.output.as_ref()?;
            Some(format!("- {} [{id}]: {output}", c.tool_name))
        })
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    format!(
        "The model could not be reached; raw tool results follow.\n\n{}",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetrievalError;
    use crate::retriever::{DocumentRetriever, KnowledgeIndex, MetadataFilter};
    use async_trait::async_trait;
    use nexus_llm::{
        CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, StopReason,
        TokenUsage,
    };
    use nexus_tools::{ParamSpec, ParamType, Tool, ToolArgs, ToolError, ToolRegistry};
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned responses and records every request
    struct Scripted {
        responses: Mutex<VecDeque<Result<CompletionResponse, LLMError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<CompletionResponse, LLMError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn complete(&self, request: CompletionRequest) -> nexus_llm::Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::RequestFailed("script exhausted".into())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn text(s: &str) -> Result<CompletionResponse, LLMError> {
        Ok(CompletionResponse {
            message: Message::assistant(s),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    fn tool_use(id: &str, name: &str, input: Value) -> Result<CompletionResponse, LLMError> {
        Ok(CompletionResponse {
            message: Message::assistant_blocks(vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }]),
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        })
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn schema(&self) -> &ToolSchema {
            static SCHEMA: std::sync::LazyLock<ToolSchema> = std::sync::LazyLock::new(|| {
                ToolSchema::new("price_tool", "Echo tickers")
                    .param(ParamSpec::required("tickers", ParamType::StringList, "Tickers"))
            });
            &SCHEMA
        }

        async fn invoke(&self, args: ToolArgs) -> Result<Value, ToolError> {
            let tickers = args.require_list("tickers")?;
            if tickers.iter().any(|t| t == "FAIL") {
                return Err(ToolError::execution("price_tool", "no data for FAIL"));
            }
            Ok(json!({"tickers": tickers}))
        }
    }

    async fn context() -> ResearchContext {
        let index = KnowledgeIndex::with_reference_events().await;
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        ResearchContext::new(Arc::new(index), Arc::new(registry))
    }

    fn orchestrator(provider: Arc<Scripted>, context: ResearchContext) -> Orchestrator {
        let llm = ResearchLlm::new(provider, "test-model");
        Orchestrator::new(llm, context, ChatConfig::default())
    }

    #[tokio::test]
    async fn test_cited_answer_without_tools() {
        let provider = Scripted::new(vec![text(
            "The October 7 rules restricted advanced chips [event:2022-10-07].",
        )]);
        let answer = orchestrator(provider.clone(), context().await)
            .answer("What did the October 7 rules restrict?", &[])
            .await;

        assert!(!answer.refused);
        assert!(answer.citations.contains("event:2022-10-07"));
        assert!(answer.tool_calls.is_empty());
        assert_eq!(
            answer.trace,
            vec![
                TurnState::Start,
                TurnState::Retrieve,
                TurnState::Decide,
                TurnState::Compose,
                TurnState::Validate,
                TurnState::End
            ]
        );

        // Context rides in the user turn and tools are offered.
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let prompt = requests[0].messages[0].text().unwrap();
        assert!(prompt.contains("[event:2022-10-07] (source: event_db)"));
        assert!(requests[0].tools.as_ref().is_some_and(|t| t.len() == 1));
    }

    #[tokio::test]
    async fn test_uncited_answer_is_refused() {
        let provider = Scripted::new(vec![text("NVDA will double next year.")]);
        let answer = orchestrator(provider, context().await)
            .answer("Will NVDA double?", &[])
            .await;

        assert!(answer.refused);
        assert_eq!(answer.text, prompts::REFUSAL);
        assert_eq!(answer.trace.last(), Some(&TurnState::End));
        assert!(answer.trace.contains(&TurnState::Refuse));
    }

    #[tokio::test]
    async fn test_tool_round_then_compose() {
        let provider = Scripted::new(vec![
            tool_use("call_1", "price_tool", json!({"tickers": "NVDA"})),
            text("NVDA data retrieved."),
        ]);
        let answer = orchestrator(provider.clone(), context().await)
            .answer("Get NVDA data", &[])
            .await;

        assert!(!answer.refused);
        assert_eq!(answer.tool_calls.len(), 1);
        assert_eq!(answer.tool_calls[0].source, CallSource::Model);
        let evidence = answer.tool_calls[0].result_id.clone().unwrap();
        assert!(answer.tool_evidence.contains(&evidence));

        // Second decide sees the tool call and its result.
        let requests = provider.requests();
        let history = &requests[1].messages;
        assert!(history[1].has_tool_uses());
        assert!(history[2].text().is_none());
    }

    #[tokio::test]
    async fn test_rounds_are_capped() {
        let provider = Scripted::new(vec![
            tool_use("c1", "price_tool", json!({"tickers": ["NVDA"]})),
            tool_use("c2", "price_tool", json!({"tickers": ["AMD"]})),
            text("Both tickers retrieved."),
        ]);
        let llm = ResearchLlm::new(provider.clone(), "test-model");
        let config = ChatConfig::builder().max_tool_rounds(2).build().unwrap();
        let answer = Orchestrator::new(llm, context().await, config)
            .answer("prices", &[])
            .await;

        assert_eq!(answer.tool_calls.len(), 2);
        assert!(!answer.refused);
        // Third request is the tool-free compose call.
        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].tools.is_none());
    }

    #[tokio::test]
    async fn test_tool_failure_is_surfaced_not_fatal() {
        let provider = Scripted::new(vec![
            Ok(CompletionResponse {
                message: Message::assistant_blocks(vec![
                    ContentBlock::ToolUse {
                        id: "a".into(),
                        name: "price_tool".into(),
                        input: json!({"tickers": ["NVDA"]}),
                    },
                    ContentBlock::ToolUse {
                        id: "b".into(),
                        name: "price_tool".into(),
                        input: json!({"tickers": ["FAIL"]}),
                    },
                    ContentBlock::ToolUse {
                        id: "c".into(),
                        name: "options_tool".into(),
                        input: json!({}),
                    },
                ]),
                stop_reason: StopReason::ToolUse,
                usage: TokenUsage::default(),
            }),
            text("NVDA is available; FAIL is not."),
        ]);
        let answer = orchestrator(provider, context().await)
            .answer("prices for NVDA and FAIL", &[])
            .await;

        assert!(!answer.refused);
        assert_eq!(answer.tool_calls.len(), 3);
        assert_eq!(answer.tool_calls.iter().filter(|c| c.succeeded()).count(), 1);
        assert!(answer.text.contains("no data for FAIL"));
        assert!(answer.text.contains("unknown tool 'options_tool'"));
    }

    #[tokio::test]
    async fn test_router_fallback_when_model_skips_tools() {
        let provider = Scripted::new(vec![
            text("NVDA trades around $100."),
            text("Latest NVDA data is in the tool output."),
        ]);
        let answer = orchestrator(provider, context().await)
            .answer("What is the NVDA stock price?", &[])
            .await;

        assert!(!answer.refused);
        assert_eq!(answer.tool_calls.len(), 1);
        assert_eq!(answer.tool_calls[0].source, CallSource::Router);
        assert_eq!(answer.tool_calls[0].arguments["tickers"], json!(["NVDA"]));
    }

    #[tokio::test]
    async fn test_model_outage_falls_back_to_router_and_digest() {
        let provider = Scripted::new(vec![
            Err(LLMError::RateLimitExceeded("slow down".into())),
            Err(LLMError::RateLimitExceeded("slow down".into())),
        ]);
        let answer = orchestrator(provider, context().await)
            .answer("What is the NVDA stock price?", &[])
            .await;

        assert!(!answer.refused);
        assert!(answer.text.starts_with("The model could not be reached"));
        assert_eq!(answer.tool_evidence.len(), 1);
        // Two decide failures and the compose failure.
        assert_eq!(answer.errors.len(), 3);
    }

    #[tokio::test]
    async fn test_model_outage_without_plan_refuses() {
        let provider = Scripted::new(vec![Err(LLMError::AuthenticationFailed)]);
        let answer = orchestrator(provider, context().await)
            .answer("Summarize the case", &[])
            .await;
        assert!(answer.refused);
        assert_eq!(answer.refusal_reason, Some(RefusalReason::EmptyAnswer));
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_recorded() {
        struct Offline;

        #[async_trait]
        impl DocumentRetriever for Offline {
            async fn search(
                &self,
                _: &str,
                _: usize,
                _: Option<&MetadataFilter>,
            ) -> Result<Vec<SearchHit>, RetrievalError> {
                Err(RetrievalError::Unavailable("index offline".into()))
            }
        }

        let registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let context = ResearchContext::new(Arc::new(Offline), Arc::new(registry));

        let provider = Scripted::new(vec![text("Unsupported claim [event:2022-10-07].")]);
        let answer = orchestrator(provider, context).answer("anything", &[]).await;

        // The id is not among retrieved chunks, so it is not a citation.
        assert!(answer.refused);
        assert!(answer.errors[0].contains("index offline"));
    }

    #[tokio::test]
    async fn test_turn_timeout_refuses() {
        struct Hanging;

        #[async_trait]
        impl LLMProvider for Hanging {
            async fn complete(&self, _: CompletionRequest) -> nexus_llm::Result<CompletionResponse> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(LLMError::RequestFailed("unreachable".into()))
            }

            fn name(&self) -> &str {
                "hanging"
            }
        }

        let config = ChatConfig::builder()
            .turn_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let llm = ResearchLlm::new(Arc::new(Hanging), "test-model");
        let answer = Orchestrator::new(llm, context().await, config)
            .answer("What did the October 7 rules restrict?", &[])
            .await;

        assert!(answer.refused);
        assert_eq!(answer.refusal_reason, Some(RefusalReason::TurnTimeout));
        assert!(answer.errors.iter().any(|e| e.contains("turn timed out")));
        assert_eq!(answer.trace.last(), Some(&TurnState::End));
    }
}
