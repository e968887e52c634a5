use serde::{Deserialize, Serialize};

/// Descriptive statistics over a close-price history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub latest: f64,
    pub average: f64,
    pub high: f64,
    pub low: f64,
}

impl KpiSnapshot {
    /// Returned when there is no finite close to reduce over.
    pub const EMPTY: KpiSnapshot = KpiSnapshot {
        latest: 0.0,
        average: 0.0,
        high: 0.0,
        low: 0.0,
    };

    pub fn is_empty_sentinel(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn trend(&self) -> Trend {
        if self.latest > self.average {
            Trend::AboveAverage
        } else {
            Trend::BelowAverage
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    AboveAverage,
    BelowAverage,
}

impl Trend {
    pub fn insight(self) -> &'static str {
        match self {
            Trend::AboveAverage => "The stock is trending above its 1-year average.",
            Trend::BelowAverage => "The stock is trending below its 1-year average.",
        }
    }
}

/// Reduces closes (chronological order) to latest/average/high/low.
///
/// Non-finite values are skipped. With nothing left the zero sentinel
/// [`KpiSnapshot::EMPTY`] is returned instead of an error.
pub fn compute_kpis(closes: &[f64]) -> KpiSnapshot {
    let mut finite = closes.iter().copied().filter(|c| c.is_finite());

    let Some(first) = finite.next() else {
        return KpiSnapshot::EMPTY;
    };

    let mut latest = first;
    let mut high = first;
    let mut low = first;
    let mut sum = first;
    let mut count: usize = 1;

    for c in finite {
        latest = c;
        high = high.max(c);
        low = low.min(c);
        sum += c;
        count += 1;
    }

    // Float summation can drift a hair outside [low, high] on constant input.
    let average = (sum / count as f64).clamp(low, high);

    KpiSnapshot {
        latest,
        average,
        high,
        low,
    }
}
