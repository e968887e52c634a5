use crate::domain::compare::AsPrice;
use serde::{Deserialize, Deserializer, Serialize};

/// `GET /v8/finance/chart/{symbol}` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteColumns>,
}

/// Column-oriented OHLC values; gaps come back as `null`. Anything that is
/// not a finite number is kept as `None` so the row position survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteColumns {
    #[serde(default, deserialize_with = "lenient_prices")]
    pub open: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_prices")]
    pub high: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_prices")]
    pub low: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_prices")]
    pub close: Vec<Option<f64>>,
}

fn lenient_prices<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .map(AsPrice::as_price)
        .collect())
}
