use std::fmt::Write;
use stockpulse_core::dashboard::{ComparisonReport, SymbolReport};
use stockpulse_core::verdict::VerdictSource;

pub fn symbol_report(report: &SymbolReport) -> String {
    let k = &report.kpis;
    let mut out = String::new();

    let _ = writeln!(out, "{} (1Y)", report.symbol);
    let _ = writeln!(out, "  Latest Price:        ${:.2}", k.latest);
    let _ = writeln!(out, "  1-Year High:         ${:.2}", k.high);
    let _ = writeln!(out, "  1-Year Low:          ${:.2}", k.low);
    let _ = writeln!(out, "  Average Price (1Y):  ${:.2}", k.average);
    let _ = writeln!(out, "  Trend Insight:       {}", report.trend_insight);

    if let Some(resolved) = &report.verdict {
        let v = &resolved.verdict;
        let _ = writeln!(
            out,
            "Recommendation: {} (Confidence: {}%) [{}]",
            v.signal,
            (v.confidence * 100.0).round() as i64,
            v.signal.color()
        );
        let _ = writeln!(out, "Insight: {}", v.insight.trim());
        if let VerdictSource::Fallback { stage, .. } = &resolved.source {
            let _ = writeln!(out, "(analytics model unavailable: {stage} failure)");
        }
    }

    out
}

pub fn comparison_report(report: &ComparisonReport) -> String {
    let mut out = String::new();

    let label = report.baseline_symbol.as_deref().unwrap_or("baseline");
    let _ = writeln!(out, "Baseline {label}: ${:.2}", report.baseline);

    for (symbol, price) in &report.prices {
        let marker = if report.above.contains(symbol) { "^" } else { " " };
        let _ = writeln!(out, "  {marker} {symbol:<6} ${price:.2}");
    }

    if report.above.is_empty() {
        let _ = writeln!(out, "No compared stock closes above the baseline.");
    } else {
        let above: Vec<&str> = report.above.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Above baseline: {}", above.join(", "));
    }

    if !report.omitted.is_empty() {
        let _ = writeln!(out, "Omitted (no data): {}", report.omitted.join(", "));
    }

    out
}
