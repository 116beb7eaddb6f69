//! Curated export-control event reference list
//!
//! Read-only and initialised on first use.

use crate::config::ymd;
use crate::event_study::EventSpec;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// High or Critical
    pub fn is_severe(self) -> bool {
        self >= Self::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown severity '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    NewRestriction,
    ControlExpansion,
    PolicyRelaxation,
    MarketRumor,
    EarningsImpact,
    CompanyGuidance,
}

impl EventType {
    pub const ALL: [Self; 6] = [
        Self::NewRestriction,
        Self::ControlExpansion,
        Self::PolicyRelaxation,
        Self::MarketRumor,
        Self::EarningsImpact,
        Self::CompanyGuidance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewRestriction => "New Restriction",
            Self::ControlExpansion => "Control Expansion",
            Self::PolicyRelaxation => "Policy Relaxation",
            Self::MarketRumor => "Market Rumor",
            Self::EarningsImpact => "Earnings Impact",
            Self::CompanyGuidance => "Company Guidance",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        Self::ALL
            .into_iter()
            .find(|v| {
                v.as_str()
                    .chars()
                    .filter(char::is_ascii_alphanumeric)
                    .collect::<String>()
                    .eq_ignore_ascii_case(&wanted)
            })
            .ok_or_else(|| format!("unknown event type '{s}'"))
    }
}

/// One curated export-control or market event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportControlEvent {
    /// `YYYY-MM-DD`, unique
    pub id: String,
    pub date: NaiveDate,
    pub title: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub event_type: EventType,
    pub chips_affected: &'static [&'static str],
    pub countries: &'static [&'static str],
    pub source: &'static str,
    pub notes: Option<&'static str>,
}

impl ExportControlEvent {
    /// Id of this event's document in the knowledge index
    pub fn chunk_id(&self) -> String {
        format!("event:{}", self.id)
    }

    pub fn spec(&self) -> EventSpec {
        EventSpec::new(&self.id, self.date, self.title)
    }
}

#[allow(clippy::too_many_arguments)]
fn event(
    (y, m, d): (i32, u32, u32),
    title: &'static str,
    description: &'static str,
    severity: Severity,
    event_type: EventType,
    chips_affected: &'static [&'static str],
    countries: &'static [&'static str],
    source: &'static str,
    notes: Option<&'static str>,
) -> ExportControlEvent {
    let date = ymd(y, m, d);
    ExportControlEvent {
        id: date.format("%Y-%m-%d").to_string(),
        date,
        title,
        description,
        severity,
        event_type,
        chips_affected,
        countries,
        source,
        notes,
    }
}

static EVENTS: LazyLock<Vec<ExportControlEvent>> = LazyLock::new(|| {
    use EventType::*;
    use Severity::*;
    vec![
        event(
            (2022, 8, 31),
            "Initial A100/H100 Export Restrictions",
            "The US government informs Nvidia that A100 and H100 accelerators now need export licenses for China and Russia, the first major restriction aimed at AI chips.",
            High,
            NewRestriction,
            &["A100", "H100"],
            &["China", "Russia"],
            "SEC 8-K Filing, Reuters",
            Some("Nvidia disclosed ~$400M potential Q3 revenue impact"),
        ),
        event(
            (2022, 10, 7),
            "Sweeping China Chip Controls (October 7 Rules)",
            "BIS issues broad controls on advanced semiconductors bound for China, reaching chips, fab equipment and US persons supporting Chinese fabs.",
            Critical,
            NewRestriction,
            &["A100", "H100", "A800", "H800", "Advanced GPUs"],
            &["China"],
            "BIS Federal Register, Commerce Department",
            Some("Most sweeping chip controls since the Cold War and a clear turn in US-China tech decoupling."),
        ),
        event(
            (2023, 5, 24),
            "Nvidia Q1 FY24 Earnings - AI Demand Explosion",
            "Nvidia beats on data center revenue and guides Q2 revenue to about $11B against roughly $7.2B expected, despite the China restrictions.",
            High,
            EarningsImpact,
            &["H100", "A100"],
            &[],
            "Nvidia 10-Q, Earnings Call",
            Some("Shares rose about 24% after hours as AI demand outweighed China headwinds."),
        ),
        event(
            (2023, 10, 17),
            "Export Controls Expanded - A800/H800 Restricted",
            "BIS closes the China-specific variant loophole by restricting A800 and H800, and widens equipment and entity coverage.",
            High,
            ControlExpansion,
            &["A800", "H800", "L40S", "RTX 4090"],
            &["China"],
            "BIS Federal Register",
            Some("Consumer GPUs such as the RTX 4090 were also caught."),
        ),
        event(
            (2024, 1, 30),
            "H200 Export Status Uncertain",
            "Markets speculate on whether the new H200 will require export licenses while Nvidia says it is working with Commerce on classification.",
            Medium,
            MarketRumor,
            &["H200"],
            &["China"],
            "Reuters, Bloomberg",
            Some("Raised uncertainty over next-generation chip availability in China."),
        ),
        event(
            (2024, 4, 15),
            "Huawei Ascend 910B Benchmark Reports",
            "Reports suggest Huawei's domestic Ascend 910B nears H100 performance on some workloads, questioning how effective the controls are.",
            Medium,
            CompanyGuidance,
            &["H100", "H200"],
            &["China"],
            "SemiAnalysis, Financial Times",
            Some("First credible domestic alternative in China."),
        ),
        event(
            (2024, 9, 9),
            "BIS Proposes 'Presumption of Denial' Policy",
            "Commerce proposes a licensing policy with a presumption of denial for advanced AI chips to China, effectively blocking most exports.",
            Critical,
            NewRestriction,
            &["H100", "H200", "B100", "All advanced AI accelerators"],
            &["China"],
            "Commerce Department, Federal Register Notice",
            Some("Most aggressive proposal to date; industry lobbying intensified."),
        ),
        event(
            (2025, 1, 15),
            "Biden Administration Finalizes AI Diffusion Rule",
            "The outgoing administration finalizes a tiered framework for AI chip exports that favours close allies.",
            High,
            NewRestriction,
            &["H200", "B100", "B200", "All advanced AI chips"],
            &["China", "Tier 2 countries"],
            "Commerce Department Final Rule",
            Some("Introduced a three-tier country classification."),
        ),
        event(
            (2025, 5, 21),
            "Nvidia Q1 FY26 Earnings - China Revenue Disclosure",
            "Nvidia breaks out China revenue for the first time: China data center revenue falls about 40% year over year, offset by growth elsewhere.",
            Medium,
            EarningsImpact,
            &["H200", "B100"],
            &["China"],
            "Nvidia 10-Q, Earnings Call",
            Some("Shares rallied as non-China demand beat expectations."),
        ),
        event(
            (2025, 10, 12),
            "Controls Extended to AI Model Weights",
            "BIS proposes extending controls from hardware to AI model weights and training techniques.",
            High,
            ControlExpansion,
            &["Software/Models"],
            &["China", "Russia", "Iran"],
            "BIS Proposed Rule",
            Some("First extension beyond hardware; touches hyperscaler model deployment."),
        ),
        event(
            (2026, 1, 20),
            "New Administration Reviews Export Policy",
            "The incoming administration opens a review of AI chip export controls, hinting at case-by-case licensing instead of presumption of denial.",
            Medium,
            PolicyRelaxation,
            &["H200", "B100", "B200"],
            &["China"],
            "Commerce Department Statement, Reuters",
            Some("Read as potential easing; policy remains under review."),
        ),
    ]
});

/// Every event, oldest first
pub fn all_events() -> &'static [ExportControlEvent] {
    &EVENTS
}

/// Look up an event by id (`YYYY-MM-DD`) or chunk id (`event:YYYY-MM-DD`)
pub fn find_event(id: &str) -> Option<&'static ExportControlEvent> {
    let id = id.strip_prefix("event:").unwrap_or(id);
    EVENTS.iter().find(|e| e.id == id)
}

/// Conjunctive event filter; empty lists match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub severities: Vec<Severity>,
    pub types: Vec<EventType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EventFilter {
    pub fn severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.severities = severities.into_iter().collect();
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn from(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    pub fn to(mut self, date: NaiveDate) -> Self {
        self.to = Some(date);
        self
    }

    pub fn matches(&self, event: &ExportControlEvent) -> bool {
        (self.severities.is_empty() || self.severities.contains(&event.severity))
            && (self.types.is_empty() || self.types.contains(&event.event_type))
            && self.from.is_none_or(|from| event.date >= from)
            && self.to.is_none_or(|to| event.date <= to)
    }

    /// Matching events, oldest first
    pub fn apply(&self) -> Vec<&'static ExportControlEvent> {
        EVENTS.iter().filter(|e| self.matches(e)).collect()
    }
}

/// Counts over a set of events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

impl EventSummary {
    pub fn of(events: &[&ExportControlEvent]) -> Self {
        let mut by_severity = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        for e in events {
            *by_severity.entry(e.severity.to_string()).or_insert(0) += 1;
            *by_type.entry(e.event_type.to_string()).or_insert(0) += 1;
        }
        Self {
            total: events.len(),
            by_severity,
            by_type,
            first: events.iter().map(|e| e.date).min(),
            last: events.iter().map(|e| e.date).max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_list_is_sorted_and_unique() {
        let events = all_events();
        assert_eq!(events.len(), 11);
        assert!(events.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(events[1].id, "2022-10-07");
        assert_eq!(events[1].chunk_id(), "event:2022-10-07");
        assert_eq!(events[1].severity, Severity::Critical);
    }

    #[test]
    fn test_find_event() {
        assert_eq!(
            find_event("event:2024-09-09").map(|e| e.severity),
            Some(Severity::Critical)
        );
        assert!(find_event("2030-01-01").is_none());
    }

    #[test]
    fn test_filters_combine() {
        let critical = EventFilter::default().severities([Severity::Critical]).apply();
        assert_eq!(critical.len(), 2);

        let severe_since_2024 = EventFilter::default()
            .severities([Severity::High, Severity::Critical])
            .from(ymd(2024, 1, 1))
            .apply();
        assert_eq!(
            severe_since_2024.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["2024-09-09", "2025-01-15", "2025-10-12"]
        );

        let earnings_2023 = EventFilter::default()
            .types([EventType::EarningsImpact])
            .to(ymd(2023, 12, 31))
            .apply();
        assert_eq!(earnings_2023.len(), 1);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!("New Restriction".parse::<EventType>(), Ok(EventType::NewRestriction));
        assert_eq!("earnings_impact".parse::<EventType>(), Ok(EventType::EarningsImpact));
        assert!("Extreme".parse::<Severity>().is_err());
        assert!(Severity::High.is_severe());
        assert!(!Severity::Medium.is_severe());
    }

    #[test]
    fn test_summary() {
        let all: Vec<_> = all_events().iter().collect();
        let summary = EventSummary::of(&all);
        assert_eq!(summary.total, 11);
        assert_eq!(summary.by_severity["Critical"], 2);
        assert_eq!(summary.by_severity["High"], 5);
        assert_eq!(summary.by_severity["Medium"], 4);
        assert_eq!(summary.by_type["New Restriction"], 4);
        assert_eq!(summary.first, Some(ymd(2022, 8, 31)));
        assert_eq!(summary.last, Some(ymd(2026, 1, 20)));
    }
}
