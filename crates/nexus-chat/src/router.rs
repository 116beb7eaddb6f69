//! Keyword intent router
//!
//! A deterministic planner used when the model answers a quantitative
//! question without selecting a tool, or when the decide call fails. It
//! classifies the question, pulls out tickers and a start date, and turns
//! that into a single tool call.

use chrono::NaiveDate;
use nexus_llm::ToolCallRequest;
use nexus_market::{find_event, universe};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// What a question is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Abnormal returns around export-control events
    EventStudy,
    /// Relative performance of two or more tickers
    Comparison,
    /// Realized volatility
    Volatility,
    /// Prices and return summaries
    Price,
    /// Nothing a tool answers
    General,
}

impl Intent {
    /// Tool that serves this intent
    pub fn tool_name(self) -> Option<&'static str> {
        match self {
            Self::EventStudy => Some("event_study_tool"),
            Self::Comparison => Some("ecosystem_tool"),
            Self::Volatility => Some("volatility_tool"),
            Self::Price => Some("price_tool"),
            Self::General => None,
        }
    }
}

mod keywords {
    pub const EVENT_STUDY: &[&str] = &[
        "car",
        "cars",
        "abnormal",
        "event study",
        "event window",
        "reaction",
        "react",
        "reacted",
        "impact",
    ];

    pub const COMPARISON: &[&str] = &[
        "compare",
        "comparison",
        "versus",
        "vs",
        "against",
        "outperform",
        "outperformed",
        "relative",
        "correlation",
        "correlated",
        "spread",
    ];

    pub const VOLATILITY: &[&str] = &[
        "volatility",
        "volatile",
        "vol",
        "skew",
        "implied",
        "iv",
        "realized",
        "rv20",
        "rv60",
        "options",
    ];

    pub const PRICE: &[&str] = &[
        "price",
        "prices",
        "quote",
        "trading at",
        "stock price",
        "return",
        "returns",
        "drawdown",
        "performance",
        "how much",
    ];

    /// Named events, mapped to reference event ids
    pub const EVENTS: &[(&str, &str)] = &[
        ("october 7", "2022-10-07"),
        ("oct 7", "2022-10-07"),
        ("oct. 7", "2022-10-07"),
        ("diffusion rule", "2025-01-15"),
        ("presumption of denial", "2024-09-09"),
        ("model weights", "2025-10-12"),
    ];
}

/// Keyword classifier and planner
#[derive(Debug, Clone, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    /// Classify a question.
    ///
    /// Comparison wins when two or more tickers are named; otherwise event
    /// studies take priority over volatility, then prices.
    pub fn classify(&self, question: &str) -> Intent {
        let lower = question.to_lowercase();
        let tokens = tokens(&lower);
        let tickers = self.extract_tickers(question);

        let event = Self::matches_any(&lower, &tokens, keywords::EVENT_STUDY)
            || keywords::EVENTS.iter().any(|(name, _)| lower.contains(name));
        let comparison = Self::matches_any(&lower, &tokens, keywords::COMPARISON);

        let intent = if comparison && tickers.len() >= 2 {
            Intent::Comparison
        } else if event {
            Intent::EventStudy
        } else if comparison {
            Intent::Comparison
        } else if Self::matches_any(&lower, &tokens, keywords::VOLATILITY) {
            Intent::Volatility
        } else if Self::matches_any(&lower, &tokens, keywords::PRICE) {
            Intent::Price
        } else {
            Intent::General
        };
        debug!(?intent, tickers = ?tickers, "classified question");
        intent
    }

    /// Single words match whole tokens, phrases match anywhere
    fn matches_any(lower: &str, tokens: &HashSet<&str>, keywords: &[&str]) -> bool {
        keywords.iter().any(|kw| {
            if kw.contains(' ') {
                lower.contains(kw)
            } else {
                tokens.contains(kw)
            }
        })
    }

    /// Universe tickers named in the question, by symbol or company name,
    /// in order of first mention
    pub fn extract_tickers(&self, question: &str) -> Vec<String> {
        let lower = question.to_lowercase();
        let mut found: Vec<(usize, &'static str)> = Vec::new();
        let mut push = |pos: usize, ticker: &'static str| {
            if !found.iter().any(|(_, t)| *t == ticker) {
                found.push((pos, ticker));
            }
        };

        if let Some(pos) = lower.find("taiwan semiconductor") {
            push(pos, "TSM");
        }
        let mut offset = 0;
        for word in question.split(|c: char| !c.is_alphanumeric()) {
            if let Some(ticker) = universe::resolve(word).filter(|_| !word.is_empty()) {
                push(offset, ticker);
            }
            offset += word.len() + 1;
        }

        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, t)| t.to_string()).collect()
    }

    /// Start date from "since 2023", "from 2023-05" or "since 2023-05-24"
    pub fn extract_since(&self, question: &str) -> Option<NaiveDate> {
        let words: Vec<&str> = question
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
            .collect();
        words.windows(2).find_map(|pair| {
            let marker = pair[0].to_lowercase();
            if marker == "since" || marker == "from" || marker == "after" {
                parse_partial_date(pair[1])
            } else {
                None
            }
        })
    }

    /// Reference events the question names, by date or by nickname
    pub fn extract_events(&self, question: &str) -> Vec<String> {
        let lower = question.to_lowercase();
        let mut ids: Vec<String> = Vec::new();
        for word in question.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_ascii_digit());
            if let Some(event) = find_event(word) {
                ids.push(event.id.clone());
            }
        }
        for (name, id) in keywords::EVENTS {
            if lower.contains(name) {
                ids.push((*id).to_string());
            }
        }
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        ids
    }

    /// Plan one tool call for the question, if any tool fits
    pub fn plan(&self, question: &str) -> Option<ToolCallRequest> {
        let intent = self.classify(question);
        let tool = intent.tool_name()?;
        let tickers = self.extract_tickers(question);
        let since = self.extract_since(question);

        let mut args = Map::new();
        match intent {
            Intent::Comparison | Intent::Price => {
                if tickers.is_empty() {
                    return None;
                }
                args.insert("tickers".to_string(), json!(tickers));
                if let Some(since) = since {
                    args.insert("start_date".to_string(), json!(since));
                }
            }
            Intent::EventStudy => {
                if let Some(ticker) = tickers.first() {
                    args.insert("ticker".to_string(), json!(ticker));
                }
                let events = self.extract_events(question);
                if !events.is_empty() {
                    args.insert("event_dates".to_string(), json!(events));
                }
            }
            Intent::Volatility => {
                if let Some(ticker) = tickers.first() {
                    args.insert("ticker".to_string(), json!(ticker));
                }
            }
            Intent::General => return None,
        }

        Some(ToolCallRequest::new(
            format!("route_{}", Uuid::new_v4().simple()),
            tool,
            Value::Object(args),
        ))
    }
}

fn tokens(lower: &str) -> HashSet<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_partial_date(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    let mut parts = text.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    if !(1990..=2100).contains(&year) {
        return None;
    }
    let month: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 1,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_evaluation_prompts() {
        let router = IntentRouter::new();
        assert_eq!(
            router.classify("Run CAR for NVDA around Oct 7 rules"),
            Intent::EventStudy
        );
        assert_eq!(
            router.classify("Compare NVDA vs TSM vs ASML correlation since 2023"),
            Intent::Comparison
        );
        assert_eq!(
            router.classify("Is skew elevated in NVDA right now?"),
            Intent::Volatility
        );
        assert_eq!(router.classify("What is NVDA stock price?"), Intent::Price);
        assert_eq!(
            router.classify("Who chairs the Commerce Department?"),
            Intent::General
        );
    }

    #[test]
    fn test_whole_word_matching() {
        let router = IntentRouter::new();
        // "care" and "vsphere" must not trigger "car" or "vs"
        assert_eq!(router.classify("Why should investors care about vsphere?"), Intent::General);
    }

    #[test]
    fn test_extract_tickers() {
        let router = IntentRouter::new();
        assert_eq!(
            router.extract_tickers("How did Nvidia do against AMD and Taiwan Semiconductor?"),
            vec!["NVDA", "AMD", "TSM"]
        );
        assert_eq!(router.extract_tickers("nvda vs NVDA"), vec!["NVDA"]);
        assert!(router.extract_tickers("What is a CAR?").is_empty());
    }

    #[test]
    fn test_extract_since() {
        let router = IntentRouter::new();
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(router.extract_since("NVDA vs AMD since 2023"), Some(ymd(2023, 1, 1)));
        assert_eq!(router.extract_since("from 2023-05 onward"), Some(ymd(2023, 5, 1)));
        assert_eq!(router.extract_since("since 2024-09-09."), Some(ymd(2024, 9, 9)));
        assert_eq!(router.extract_since("since last year"), None);
        assert_eq!(router.extract_since("since 2023-13"), None);
    }

    #[test]
    fn test_extract_events() {
        let router = IntentRouter::new();
        assert_eq!(router.extract_events("CAR around the October 7 rules"), vec!["2022-10-07"]);
        assert_eq!(
            router.extract_events("events on 2023-10-17 and 2022-10-07, i.e. Oct 7"),
            vec!["2023-10-17", "2022-10-07"]
        );
        assert!(router.extract_events("2021-01-01").is_empty());
    }

    #[test]
    fn test_plan_comparison() {
        let call = IntentRouter::new()
            .plan("Compare NVDA vs AMD since 2023")
            .unwrap();
        assert_eq!(call.name, "ecosystem_tool");
        assert_eq!(call.arguments["tickers"], json!(["NVDA", "AMD"]));
        assert_eq!(call.arguments["start_date"], "2023-01-01");
        assert!(call.id.starts_with("route_"));
    }

    #[test]
    fn test_plan_event_study_and_volatility() {
        let router = IntentRouter::new();
        let call = router.plan("Run CAR for AMD around Oct 7 rules").unwrap();
        assert_eq!(call.name, "event_study_tool");
        assert_eq!(call.arguments["ticker"], "AMD");
        assert_eq!(call.arguments["event_dates"], json!(["2022-10-07"]));

        let call = router.plan("Is volatility elevated right now?").unwrap();
        assert_eq!(call.name, "volatility_tool");
        assert!(call.arguments.get("ticker").is_none());
    }

    #[test]
    fn test_plan_needs_tickers_for_prices() {
        let router = IntentRouter::new();
        assert!(router.plan("What are stock prices doing?").is_none());
        assert!(router.plan("Summarize the case").is_none());
        let call = router.plan("What is the Intel stock price?").unwrap();
        assert_eq!(call.arguments["tickers"], json!(["INTC"]));
    }
}
