use crate::config::Settings;
use crate::domain::price::{PriceBar, PriceSeries};
use crate::market::types::ChartResponse;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;

/// Every dashboard view looks back one year.
pub const LOOKBACK_DAYS: i64 = 365;

const USER_AGENT: &str = concat!("stockpulse/", env!("CARGO_PKG_VERSION"));

#[async_trait::async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_history(&self, symbol: &str, lookback_days: i64) -> Result<PriceSeries>;
}

/// The provider answered, but there is nothing to compute on.
#[derive(Debug, Clone)]
pub struct NoPriceData {
    pub symbol: String,
    pub reason: &'static str,
}

impl fmt::Display for NoPriceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no price data for {}: {}", self.symbol, self.reason)
    }
}

impl std::error::Error for NoPriceData {}

#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl YahooChartProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.market_data_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url: settings.market_data_base_url.clone(),
            retry: RetryPolicy::new(settings.market_data_retries, std::time::Duration::from_secs(1)),
        })
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }

    async fn fetch_once(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        let res = self
            .http
            .get(self.url(symbol))
            .query(&[
                ("period1", start.timestamp().to_string()),
                ("period2", end.timestamp().to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        // Unknown tickers come back as 404 with a structured error body.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(NoPriceData {
                symbol: symbol.to_string(),
                reason: "unknown symbol",
            }
            .into());
        }
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<ChartResponse>(&text)
            .with_context(|| format!("market data response is not a chart payload: {text}"))?;
        series_from_chart(symbol, parsed)
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_history(&self, symbol: &str, lookback_days: i64) -> Result<PriceSeries> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(lookback_days);

        let series = self
            .retry
            .run(
                "market_data_fetch",
                |err: &anyhow::Error| !err.is::<NoPriceData>(),
                |_| self.fetch_once(symbol, start, end),
            )
            .await?;

        tracing::debug!(
            symbol,
            bars = series.bars.len(),
            provider = self.provider_name(),
            "fetched price history"
        );
        Ok(series)
    }
}

/// Zips the column-oriented chart payload into bars and checks there is a
/// usable close column.
pub fn series_from_chart(symbol: &str, resp: ChartResponse) -> Result<PriceSeries> {
    if let Some(err) = resp.chart.error {
        return Err(anyhow::Error::new(NoPriceData {
            symbol: symbol.to_string(),
            reason: "provider returned an error",
        })
        .context(format!(
            "{}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    let result = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| NoPriceData {
            symbol: symbol.to_string(),
            reason: "no rows returned",
        })?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    if quote.close.is_empty() {
        return Err(NoPriceData {
            symbol: symbol.to_string(),
            reason: "close column missing",
        }
        .into());
    }

    let column = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();
    let bars: Vec<PriceBar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PriceBar {
                date,
                open: column(&quote.open, i),
                high: column(&quote.high, i),
                low: column(&quote.low, i),
                close: column(&quote.close, i),
            })
        })
        .collect();

    let series = PriceSeries::new(symbol, bars);
    if !series.has_usable_close() {
        return Err(NoPriceData {
            symbol: symbol.to_string(),
            reason: "no numeric close prices",
        }
        .into());
    }
    Ok(series)
}
