//! Semiconductor ecosystem ticker universe

/// Named groups, in display order
pub const ECOSYSTEM: &[(&str, &[&str])] = &[
    ("gpu_leaders", &["NVDA", "AMD"]),
    ("legacy_semi", &["INTC"]),
    ("foundry_equipment", &["TSM", "ASML"]),
    ("networking_broadband", &["AVGO"]),
    ("hyperscalers", &["GOOGL", "AMZN", "MSFT"]),
    ("benchmark", &["SPY", "SMH"]),
];

/// Tickers directly affected by export controls
pub const CORE_TICKERS: &[&str] = &["NVDA", "AMD", "INTC", "SPY"];

pub const EXTENDED_TICKERS: &[&str] = &[
    "NVDA", "AMD", "INTC", "TSM", "ASML", "AVGO", "GOOGL", "AMZN", "MSFT", "SMH", "SPY",
];

const NAMES: &[(&str, &str)] = &[
    ("NVDA", "Nvidia"),
    ("AMD", "Advanced Micro Devices"),
    ("INTC", "Intel"),
    ("TSM", "Taiwan Semiconductor (TSMC)"),
    ("ASML", "ASML Holdings"),
    ("AVGO", "Broadcom"),
    ("GOOGL", "Alphabet (Google TPU)"),
    ("AMZN", "Amazon (Trainium/Inferentia)"),
    ("MSFT", "Microsoft (Maia/Cobalt)"),
    ("SPY", "S&P 500 ETF"),
    ("SMH", "VanEck Semiconductor ETF"),
];

const EXPOSURE: &[(&str, &str)] = &[
    ("NVDA", "Direct - primary target of BIS controls on AI accelerators"),
    ("AMD", "Direct - MI series GPUs restricted alongside Nvidia"),
    ("INTC", "Moderate - Gaudi accelerators and foundry services exposure"),
    ("TSM", "Indirect - manufactures restricted chips, caught in entity lists"),
    ("ASML", "Indirect - EUV lithography equipment export restrictions"),
    ("AVGO", "Low - networking and custom silicon, limited China AI exposure"),
    ("GOOGL", "Indirect - TPUs not exported, cloud AI services affected"),
    ("AMZN", "Indirect - Trainium internal, AWS China operations affected"),
    ("MSFT", "Indirect - Azure AI services in restricted regions"),
];

fn lookup(table: &'static [(&'static str, &'static str)], ticker: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(ticker))
        .map(|(_, v)| *v)
}

/// Display name, if the ticker is part of the universe
pub fn display_name(ticker: &str) -> Option<&'static str> {
    lookup(NAMES, ticker)
}

/// Qualitative export-control exposure
pub fn export_exposure(ticker: &str) -> Option<&'static str> {
    lookup(EXPOSURE, ticker)
}

/// Ecosystem group a ticker belongs to
pub fn group_of(ticker: &str) -> Option<&'static str> {
    ECOSYSTEM
        .iter()
        .find(|(_, tickers)| tickers.iter().any(|t| t.eq_ignore_ascii_case(ticker)))
        .map(|(group, _)| *group)
}

/// Tickers of a named group; empty for unknown groups
pub fn group_tickers(group: &str) -> &'static [&'static str] {
    ECOSYSTEM
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(group))
        .map(|(_, tickers)| *tickers)
        .unwrap_or_default()
}

/// Every ticker in the universe, sorted
pub fn all_tickers() -> Vec<&'static str> {
    let mut tickers: Vec<_> = ECOSYSTEM.iter().flat_map(|(_, t)| t.iter().copied()).collect();
    tickers.sort_unstable();
    tickers.dedup();
    tickers
}

/// Resolve a company name or symbol to a universe ticker
pub fn resolve(word: &str) -> Option<&'static str> {
    const ALIASES: &[(&str, &str)] = &[
        ("nvidia", "NVDA"),
        ("amd", "AMD"),
        ("intel", "INTC"),
        ("tsmc", "TSM"),
        ("taiwan semiconductor", "TSM"),
        ("asml", "ASML"),
        ("broadcom", "AVGO"),
        ("google", "GOOGL"),
        ("alphabet", "GOOGL"),
        ("amazon", "AMZN"),
        ("microsoft", "MSFT"),
    ];
    let word = word.trim();
    ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(word))
        .map(|(_, t)| *t)
        .or_else(|| all_tickers().into_iter().find(|t| t.eq_ignore_ascii_case(word)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups() {
        assert_eq!(group_of("nvda"), Some("gpu_leaders"));
        assert_eq!(group_of("SMH"), Some("benchmark"));
        assert_eq!(group_of("AAPL"), None);
        assert_eq!(group_tickers("hyperscalers"), &["GOOGL", "AMZN", "MSFT"]);
        assert!(group_tickers("nope").is_empty());
    }

    #[test]
    fn test_universe_is_consistent() {
        let all = all_tickers();
        assert_eq!(all.len(), 11);
        for ticker in EXTENDED_TICKERS.iter().chain(CORE_TICKERS) {
            assert!(all.contains(ticker), "{ticker} missing from groups");
            assert!(display_name(ticker).is_some());
        }
        assert!(export_exposure("SPY").is_none());
        assert!(export_exposure("AMD").is_some_and(|e| e.starts_with("Direct")));
    }

    #[test]
    fn test_resolve_names_and_symbols() {
        assert_eq!(resolve("Nvidia"), Some("NVDA"));
        assert_eq!(resolve("intc"), Some("INTC"));
        assert_eq!(resolve("TSMC"), Some("TSM"));
        assert_eq!(resolve("apple"), None);
    }
}
