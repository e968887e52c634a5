use crate::domain::signal::{normalize_confidence, Signal, Verdict};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

pub const NO_INSIGHT: &str = "No additional insights available from the analytics model.";

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```), with or
        // without a newline after the opening fence.
        let mut inner = trimmed["```".len()..]
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Loose shape of the model's answer; every field is validated by hand.
#[derive(Debug, Deserialize)]
struct LlmVerdict {
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    insight: Option<Value>,
    #[serde(default)]
    insights: Option<Value>,
}

/// Parses generated text into a [`Verdict`].
///
/// `verdict` is required; `confidence` and `insight`/`insights` fall back to
/// defaults when missing or unusable.
pub fn parse_verdict(text: &str) -> anyhow::Result<Verdict> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmVerdict>(&json_str)
        .with_context(|| format!("LLM output is not a verdict object: {json_str}"))?;

    let label = parsed.verdict.context("LLM output has no `verdict` key")?;
    let signal = label.parse::<Signal>()?;

    let confidence = normalize_confidence(parsed.confidence.as_ref().and_then(confidence_value));

    let insight = parsed
        .insight
        .as_ref()
        .and_then(insight_text)
        .or_else(|| parsed.insights.as_ref().and_then(insight_text))
        .unwrap_or_else(|| NO_INSIGHT.to_string());

    Ok(Verdict {
        signal,
        confidence,
        insight,
    })
}

fn confidence_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite())
}

fn insight_text(v: &Value) -> Option<String> {
    let text = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
