//! Composes fetch, KPI reduction, verdict resolution and comparison into the
//! payloads the API and CLI render.

use crate::domain::compare::stocks_above_map;
use crate::domain::kpi::{compute_kpis, KpiSnapshot, Trend};
use crate::domain::price::PriceBar;
use crate::llm::LlmClient;
use crate::market::provider::{PriceHistoryProvider, LOOKBACK_DAYS};
use crate::verdict::{ResolvedVerdict, VerdictResolver};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub kpis: KpiSnapshot,
    pub trend: Trend,
    pub trend_insight: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ResolvedVerdict>,
    /// Bars for a line/candlestick chart.
    pub chart: Vec<PriceBar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub baseline_symbol: Option<String>,
    pub baseline: f64,
    /// Latest close per member that could be fetched.
    pub prices: BTreeMap<String, f64>,
    pub above: BTreeSet<String>,
    /// Members whose history could not be fetched.
    pub omitted: Vec<String>,
}

/// Fetches one symbol and reduces it. A fetch failure is returned to the
/// caller; a failed verdict is not (it already fell back).
pub async fn analyze_symbol<P, C>(
    provider: &P,
    resolver: Option<&VerdictResolver<C>>,
    symbol: &str,
) -> anyhow::Result<SymbolReport>
where
    P: PriceHistoryProvider + ?Sized,
    C: LlmClient,
{
    let series = provider.fetch_history(symbol, LOOKBACK_DAYS).await?;
    let closes = series.closes();
    let kpis = compute_kpis(&closes);
    let trend = kpis.trend();

    let verdict = match resolver {
        Some(r) => Some(r.resolve(symbol, &closes).await),
        None => None,
    };

    Ok(SymbolReport {
        symbol: series.symbol,
        kpis,
        trend,
        trend_insight: trend.insight(),
        verdict,
        chart: series.bars,
    })
}

/// Latest close per symbol. Members that fail to fetch are logged and left out.
pub async fn latest_prices<P>(provider: &P, symbols: &[String]) -> (BTreeMap<String, f64>, Vec<String>)
where
    P: PriceHistoryProvider + ?Sized,
{
    let mut prices = BTreeMap::new();
    let mut omitted = Vec::new();

    for symbol in symbols {
        match provider.fetch_history(symbol, LOOKBACK_DAYS).await {
            Ok(series) => match series.latest_close() {
                Some(latest) => {
                    prices.insert(symbol.clone(), latest);
                }
                None => omitted.push(symbol.clone()),
            },
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "comparison member fetch failed; omitting");
                omitted.push(symbol.clone());
            }
        }
    }

    (prices, omitted)
}

pub async fn compare<P>(
    provider: &P,
    baseline_symbol: Option<String>,
    baseline: f64,
    members: &[String],
) -> ComparisonReport
where
    P: PriceHistoryProvider + ?Sized,
{
    let (prices, omitted) = latest_prices(provider, members).await;
    let above = stocks_above_map(&prices, baseline);
    ComparisonReport {
        baseline_symbol,
        baseline,
        prices,
        above,
        omitted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceSeries;
    use crate::llm::error::LlmDiagnosticsError;
    use crate::llm::EnvelopeFormat;
    use crate::market::provider::NoPriceData;
    use crate::retry::RetryPolicy;
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FixedProvider {
        closes: HashMap<&'static str, Vec<f64>>,
    }

    #[async_trait::async_trait]
    impl PriceHistoryProvider for FixedProvider {
        fn provider_name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_history(&self, symbol: &str, _lookback_days: i64) -> anyhow::Result<PriceSeries> {
            let closes = self.closes.get(symbol).ok_or_else(|| NoPriceData {
                symbol: symbol.to_string(),
                reason: "unknown symbol",
            })?;
            let bars = closes
                .iter()
                .enumerate()
                .map(|(i, c)| PriceBar {
                    date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Days::new(i as u64),
                    open: None,
                    high: None,
                    low: None,
                    close: Some(*c),
                })
                .collect();
            Ok(PriceSeries::new(symbol, bars))
        }
    }

    struct OfflineClient;

    #[async_trait::async_trait]
    impl LlmClient for OfflineClient {
        fn provider_name(&self) -> &'static str {
            "offline"
        }

        fn envelope(&self) -> EnvelopeFormat {
            EnvelopeFormat::Candidates
        }

        async fn generate(&self, _prompt: &str) -> Result<Value, LlmDiagnosticsError> {
            Err(LlmDiagnosticsError::new(
                "offline",
                crate::llm::error::FailureStage::Transport,
                "no network",
            ))
        }
    }

    fn provider() -> FixedProvider {
        FixedProvider {
            closes: HashMap::from([
                ("TSLA", vec![95.0, 100.0, 105.0, 100.0, 95.0]),
                ("AAPL", vec![180.0, 190.0, 200.0]),
                ("MSFT", vec![400.0, f64::NAN]),
                ("KO", vec![60.0]),
            ]),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_builds_report_with_fallback_verdict() {
        let resolver = VerdictResolver::new(OfflineClient, RetryPolicy::new(2, Duration::from_millis(5)));
        let report = analyze_symbol(&provider(), Some(&resolver), "TSLA").await.unwrap();

        assert_eq!(report.kpis.latest, 95.0);
        assert_eq!(report.kpis.average, 99.0);
        assert_eq!(report.trend, Trend::BelowAverage);
        assert_eq!(report.chart.len(), 5);

        let verdict = report.verdict.unwrap();
        assert!(verdict.is_fallback());
        assert_eq!(verdict.verdict.signal.as_str(), "HOLD");
    }

    #[tokio::test]
    async fn analyze_without_resolver_skips_verdict() {
        let report = analyze_symbol::<_, OfflineClient>(&provider(), None, "AAPL").await.unwrap();
        assert!(report.verdict.is_none());
        assert_eq!(report.trend, Trend::AboveAverage);
    }

    #[tokio::test]
    async fn analyze_surfaces_fetch_errors() {
        let err = analyze_symbol::<_, OfflineClient>(&provider(), None, "NOPE")
            .await
            .unwrap_err();
        assert!(err.is::<NoPriceData>());
    }

    #[tokio::test]
    async fn compare_omits_failed_members() {
        let members = vec!["AAPL".to_string(), "MSFT".to_string(), "KO".to_string(), "NOPE".to_string()];
        let report = compare(&provider(), Some("TSLA".to_string()), 95.0, &members).await;

        assert_eq!(report.prices.len(), 3);
        assert_eq!(report.prices["MSFT"], 400.0);
        assert_eq!(report.omitted, vec!["NOPE".to_string()]);
        assert_eq!(
            report.above,
            BTreeSet::from(["AAPL".to_string(), "MSFT".to_string()])
        );
    }
}
