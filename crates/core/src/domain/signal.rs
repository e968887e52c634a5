use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }

    /// Display colour used by the dashboard.
    pub fn color(self) -> &'static str {
        match self {
            Signal::Buy => "green",
            Signal::Sell => "red",
            Signal::Hold => "orange",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            other => anyhow::bail!("unknown verdict label: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub signal: Signal,
    /// Always within [0, 1].
    pub confidence: f64,
    pub insight: String,
}

impl Verdict {
    pub fn new(signal: Signal, confidence: f64, insight: impl Into<String>) -> Self {
        Self {
            signal,
            confidence: normalize_confidence(Some(confidence)),
            insight: insight.into(),
        }
    }
}

/// Clamps into [0, 1]; missing or NaN becomes [`DEFAULT_CONFIDENCE`].
pub fn normalize_confidence(raw: Option<f64>) -> f64 {
    match raw {
        Some(c) if !c.is_nan() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}
