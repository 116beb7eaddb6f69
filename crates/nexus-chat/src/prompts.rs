//! Prompt templates for the research chat

use nexus_tools::ToolSchema;

/// Fixed response for questions no evidence supports
pub const REFUSAL: &str = "I don't have grounded information for that in the case materials or tools.";

const PREAMBLE: &str = r"You are NEXUS, a finance research assistant for the semiconductor export-control case study and its market implications across the AI chip ecosystem.

GROUNDING RULES (follow these strictly):
1. When using case-study knowledge, CITE the source with its [id] exactly as it appears in the retrieved context.
2. For numbers, CAR results, volatility, correlations or any other quantitative claim, CALL the appropriate tool. Never fabricate numbers.
3. If no retrieved context is relevant AND no tool can answer, reply exactly: ";

const FORMAT: &str = r"ANSWER FORMAT:
1. **Answer**: direct response, one to three paragraphs, finance-rigorous
2. **Evidence Used**:
   - Citations: [ids] of retrieved context you relied on
   - Tools: tool_name(key parameters) and a one-line result
3. **Assumptions & Limitations**: data windows, benchmarks, caveats

STYLE:
- Be concise and quantitatively precise.
- Keep terms apart: CAR is not raw return, implied is not realized volatility, beta is not correlation.
- Say so when results are not statistically significant.

ECOSYSTEM CONTEXT:
- GPU leaders: NVDA (primary target of the controls), AMD
- Legacy semi: INTC
- Foundry and equipment: TSM (manufactures restricted chips), ASML (EUV restrictions)
- Networking: AVGO
- Hyperscalers: GOOGL, AMZN, MSFT, building custom accelerators as NVDA alternatives";

/// System prompt listing the registered tools
pub fn system_prompt(tools: &[ToolSchema]) -> String {
    let mut prompt = String::with_capacity(PREAMBLE.len() + FORMAT.len() + 512);
    prompt.push_str(PREAMBLE);
    prompt.push('"');
    prompt.push_str(REFUSAL);
    prompt.push_str("\"\n\nAVAILABLE TOOLS:\n");
    if tools.is_empty() {
        prompt.push_str("- none\n");
    }
    for tool in tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    prompt.push('\n');
    prompt.push_str(FORMAT);
    prompt
}

/// User turn carrying retrieved context ahead of the question
pub fn context_message(context: &str, question: &str) -> String {
    format!("RETRIEVED CONTEXT (use for citations):\n{context}\n\nUSER QUESTION: {question}")
}

/// Instruction for the final tool-free call
pub const COMPOSE_INSTRUCTION: &str = "Write the final answer now using only the retrieved context and tool results above. \
Cite context by [id]. Do not request more tools.";

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_tools::{ParamSpec, ParamType};

    #[test]
    fn test_system_prompt_rules() {
        let tools = vec![
            ToolSchema::new("event_study_tool", "Run CAR analysis")
                .param(ParamSpec::optional("ticker", ParamType::String, "Ticker")),
            ToolSchema::new("price_tool", "Prices"),
        ];
        let prompt = system_prompt(&tools);
        assert!(prompt.contains("CITE"));
        assert!(prompt.contains(REFUSAL));
        assert!(prompt.contains("- event_study_tool: Run CAR analysis"));
        assert!(prompt.contains("- price_tool: Prices"));
        assert!(prompt.contains("Evidence Used"));
        assert!(prompt.contains("Assumptions"));
        assert!(system_prompt(&[]).contains("- none"));
    }

    #[test]
    fn test_context_message() {
        let msg = context_message("[a] (source: x)\ntext", "What happened?");
        assert!(msg.starts_with("RETRIEVED CONTEXT"));
        assert!(msg.ends_with("USER QUESTION: What happened?"));
    }
}
