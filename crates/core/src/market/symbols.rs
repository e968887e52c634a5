pub const DEFAULT_SYMBOL: &str = "TSLA";

/// Well-known large caps offered as picks on the dashboard.
pub const WELL_KNOWN_SYMBOLS: [&str; 30] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "FB", "NVDA", "JPM", "V", "DIS", "MA", "PYPL", "NFLX",
    "ADBE", "INTC", "CSCO", "CRM", "ORCL", "NKE", "KO", "PFE", "MRK", "ABBV", "PEP", "XOM", "CVX",
    "WMT", "T", "UNH", "HD",
];

/// Uppercased, trimmed ticker; `None` for blank or obviously malformed input.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim().to_ascii_uppercase();
    if s.is_empty() || s.len() > 15 {
        return None;
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
        .then_some(s)
}

/// Splits a comma separated list, dropping blanks and duplicates while keeping order.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        if let Some(sym) = normalize_symbol(part) {
            if !out.contains(&sym) {
                out.push(sym);
            }
        }
    }
    out
}
