use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily bar. Providers leave gaps as `null`, so every price is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

/// Chronologically ordered daily history for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// Finite close values in chronological order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars
            .iter()
            .filter_map(|b| b.close)
            .filter(|c| c.is_finite())
            .collect()
    }

    pub fn has_usable_close(&self) -> bool {
        self.bars
            .iter()
            .any(|b| b.close.is_some_and(f64::is_finite))
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.bars
            .iter()
            .rev()
            .filter_map(|b| b.close)
            .find(|c| c.is_finite())
    }
}
