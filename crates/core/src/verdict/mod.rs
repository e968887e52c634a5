//! Verdict resolution: ask the text-generation service for a BUY/SELL/HOLD
//! call and fall back to a deterministic rule whenever that fails.

pub mod prompt;

use crate::config::Settings;
use crate::domain::kpi::compute_kpis;
use crate::domain::signal::{Signal, Verdict, DEFAULT_CONFIDENCE};
use crate::llm::error::{FailureStage, LlmDiagnosticsError};
use crate::llm::{json, LlmClient};
use crate::retry::RetryPolicy;
use serde::Serialize;

pub const FALLBACK_INSIGHT: &str =
    "Insights unavailable; verdict derived from the price history average.";

/// Fallback band around the mean: BUY below `1 - BAND`, SELL above `1 + BAND`.
pub const FALLBACK_BAND: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictSource {
    Model,
    Fallback { stage: &'static str, detail: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVerdict {
    pub verdict: Verdict,
    pub source: VerdictSource,
}

/// Serialized with the display colour of the signal next to the verdict fields.
impl Serialize for ResolvedVerdict {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(flatten)]
            verdict: &'a Verdict,
            color: &'static str,
            source: &'a VerdictSource,
        }

        Wire {
            verdict: &self.verdict,
            color: self.verdict.signal.color(),
            source: &self.source,
        }
        .serialize(serializer)
    }
}

impl ResolvedVerdict {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, VerdictSource::Fallback { .. })
    }
}

pub struct VerdictResolver<C> {
    client: C,
    retry: RetryPolicy,
}

impl<C: LlmClient> VerdictResolver<C> {
    pub fn new(client: C, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn from_settings(client: C, settings: &Settings) -> Self {
        Self::new(
            client,
            RetryPolicy::new(settings.ai_service_retries, settings.ai_service_backoff),
        )
    }

    /// Always produces a verdict. Transport and parse failures are logged and
    /// routed to [`fallback_verdict`].
    pub async fn resolve(&self, symbol: &str, history: &[f64]) -> ResolvedVerdict {
        match self.ask_model(symbol, history).await {
            Ok(verdict) => {
                tracing::info!(
                    symbol,
                    signal = %verdict.signal,
                    confidence = verdict.confidence,
                    provider = self.client.provider_name(),
                    "model verdict resolved"
                );
                ResolvedVerdict {
                    verdict,
                    source: VerdictSource::Model,
                }
            }
            Err(err) => {
                let verdict = fallback_verdict(history);
                tracing::warn!(
                    symbol,
                    stage = err.stage.as_str(),
                    error = %err,
                    signal = %verdict.signal,
                    "verdict request failed; using fallback rule"
                );
                ResolvedVerdict {
                    verdict,
                    source: VerdictSource::Fallback {
                        stage: err.stage.as_str(),
                        detail: err.detail,
                    },
                }
            }
        }
    }

    async fn ask_model(&self, symbol: &str, history: &[f64]) -> Result<Verdict, LlmDiagnosticsError> {
        let prompt = prompt::compose(symbol, history);

        let body = self
            .retry
            .run(
                "verdict_generate",
                LlmDiagnosticsError::is_retryable,
                |_| self.client.generate(&prompt),
            )
            .await?;

        let provider = self.client.provider_name();
        let text = self.client.envelope().extract_text(&body).ok_or_else(|| {
            LlmDiagnosticsError::new(provider, FailureStage::Envelope, "no generated text in response")
                .with_raw_output(body.to_string())
        })?;

        json::parse_verdict(&text).map_err(|e| {
            LlmDiagnosticsError::new(provider, FailureStage::Parse, format!("{e:#}"))
                .with_raw_output(text.clone())
        })
    }
}

/// Deterministic BUY/SELL/HOLD from the latest close versus the mean close.
pub fn fallback_signal(latest: f64, mean: f64) -> Signal {
    if latest < mean * (1.0 - FALLBACK_BAND) {
        Signal::Buy
    } else if latest > mean * (1.0 + FALLBACK_BAND) {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// The rule applied when the model cannot be used. Empty history is a HOLD.
pub fn fallback_verdict(history: &[f64]) -> Verdict {
    let kpis = compute_kpis(history);
    let signal = if kpis.is_empty_sentinel() {
        Signal::Hold
    } else {
        fallback_signal(kpis.latest, kpis.average)
    };
    Verdict {
        signal,
        confidence: DEFAULT_CONFIDENCE,
        insight: FALLBACK_INSIGHT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::EnvelopeFormat;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Replays canned responses in order and records when each call happened.
    struct ScriptedClient {
        envelope: EnvelopeFormat,
        script: Mutex<Vec<Result<Value, LlmDiagnosticsError>>>,
        calls: Mutex<Vec<Instant>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(mut script: Vec<Result<Value, LlmDiagnosticsError>>) -> Self {
            script.reverse();
            Self {
                envelope: EnvelopeFormat::Candidates,
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        fn envelope(&self) -> EnvelopeFormat {
            self.envelope
        }

        async fn generate(&self, prompt: &str) -> Result<Value, LlmDiagnosticsError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(transport_failure()))
        }
    }

    fn transport_failure() -> LlmDiagnosticsError {
        LlmDiagnosticsError::new("scripted", FailureStage::Transport, "connection reset")
    }

    fn status_failure() -> LlmDiagnosticsError {
        LlmDiagnosticsError::new("scripted", FailureStage::Status, "status=503 Service Unavailable")
    }

    fn candidates(text: &str) -> Value {
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    }

    fn resolver(client: ScriptedClient) -> VerdictResolver<ScriptedClient> {
        VerdictResolver::new(client, RetryPolicy::new(5, Duration::from_secs(1)))
    }

    const HISTORY: [f64; 5] = [95.0, 100.0, 105.0, 100.0, 95.0];

    #[test]
    fn serializes_signal_color() {
        let resolved = ResolvedVerdict {
            verdict: Verdict::new(Signal::Buy, 0.8, "x"),
            source: VerdictSource::Model,
        };
        let v = serde_json::to_value(&resolved).unwrap();
        assert_eq!(v["signal"], "BUY");
        assert_eq!(v["color"], "green");
        assert_eq!(v["confidence"], 0.8);
        assert_eq!(v["source"]["kind"], "model");

        let fallback = ResolvedVerdict {
            verdict: fallback_verdict(&[100.0, 200.0]),
            source: VerdictSource::Fallback {
                stage: "transport",
                detail: "timeout".to_string(),
            },
        };
        let v = serde_json::to_value(&fallback).unwrap();
        assert_eq!(v["signal"], "SELL");
        assert_eq!(v["color"], "red");
        assert_eq!(v["source"]["stage"], "transport");
    }

    #[test]
    fn fallback_holds_inside_band() {
        // mean 99, 0.95 * 99 = 94.05 and 95 is not below it.
        let v = fallback_verdict(&HISTORY);
        assert_eq!(v.signal, Signal::Hold);
        assert_eq!(v.confidence, 0.5);
        assert_eq!(v.insight, FALLBACK_INSIGHT);
    }

    #[test]
    fn fallback_band_edges_against_mean_99() {
        assert_eq!(fallback_signal(94.0, 99.0), Signal::Buy);
        assert_eq!(fallback_signal(94.1, 99.0), Signal::Hold);
        assert_eq!(fallback_signal(103.9, 99.0), Signal::Hold);
        assert_eq!(fallback_signal(105.0, 99.0), Signal::Sell);
    }

    #[test]
    fn fallback_on_whole_series() {
        // mean 96, BUY below 91.2
        assert_eq!(fallback_verdict(&[100.0, 100.0, 100.0, 100.0, 80.0]).signal, Signal::Buy);
        // mean 102, SELL above 107.1
        assert_eq!(fallback_verdict(&[95.0, 100.0, 105.0, 100.0, 110.0]).signal, Signal::Sell);
    }

    #[test]
    fn fallback_on_empty_history_is_hold() {
        assert_eq!(fallback_verdict(&[]).signal, Signal::Hold);
        assert_eq!(fallback_verdict(&[f64::NAN]).signal, Signal::Hold);
    }

    #[tokio::test(start_paused = true)]
    async fn uses_model_verdict_when_parse_succeeds() {
        let client = ScriptedClient::new(vec![Ok(candidates(
            r#"{"verdict":"sell","confidence":0.9,"insight":"Extended above trend."}"#,
        ))]);
        let r = resolver(client);
        let out = r.resolve("TSLA", &HISTORY).await;

        assert_eq!(out.source, VerdictSource::Model);
        assert_eq!(out.verdict.signal, Signal::Sell);
        assert_eq!(out.verdict.confidence, 0.9);
        assert_eq!(out.verdict.insight, "Extended above trend.");

        let prompts = r.client.prompts.lock().unwrap();
        assert!(prompts[0].contains("TSLA"));
    }

    #[tokio::test(start_paused = true)]
    async fn four_transport_failures_then_success_returns_model_verdict() {
        let client = ScriptedClient::new(vec![
            Err(transport_failure()),
            Err(status_failure()),
            Err(transport_failure()),
            Err(status_failure()),
            Ok(candidates(r#"{"verdict":"BUY","confidence":0.7,"insight":"Oversold."}"#)),
        ]);
        let r = resolver(client);
        let out = r.resolve("AAPL", &HISTORY).await;

        assert!(!out.is_fallback());
        assert_eq!(out.verdict.signal, Signal::Buy);

        let times = r.client.call_times();
        assert_eq!(times.len(), 5);
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps.windows(2).all(|w| w[1] > w[0]), "delays not increasing: {gaps:?}");
        assert!(gaps[0] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back() {
        let client = ScriptedClient::new(vec![]);
        let r = resolver(client);
        let out = r.resolve("AAPL", &HISTORY).await;

        assert_eq!(r.client.call_times().len(), 5);
        assert_eq!(out.verdict.signal, Signal::Hold);
        assert_eq!(out.verdict.insight, FALLBACK_INSIGHT);
        assert!(matches!(out.source, VerdictSource::Fallback { stage: "transport", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn truncated_model_json_falls_back_without_retry() {
        let client = ScriptedClient::new(vec![Ok(candidates(r#"{"verdict":"BUY","insi"#))]);
        let r = resolver(client);
        let out = r.resolve("AAPL", &[100.0, 100.0, 100.0, 100.0, 80.0]).await;

        assert_eq!(r.client.call_times().len(), 1);
        assert_eq!(out.verdict.signal, Signal::Buy);
        assert_eq!(out.verdict.confidence, 0.5);
        assert!(matches!(out.source, VerdictSource::Fallback { stage: "parse", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_envelope_falls_back() {
        let client = ScriptedClient::new(vec![Ok(json!({"candidates": []}))]);
        let r = resolver(client);
        let out = r.resolve("AAPL", &HISTORY).await;
        assert!(matches!(out.source, VerdictSource::Fallback { stage: "envelope", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn flat_envelope_is_parsed_directly() {
        let mut client = ScriptedClient::new(vec![Ok(json!({"verdict": "hold", "confidence": 0.6}))]);
        client.envelope = EnvelopeFormat::Flat;
        let out = resolver(client).resolve("AAPL", &HISTORY).await;
        assert_eq!(out.source, VerdictSource::Model);
        assert_eq!(out.verdict.signal, Signal::Hold);
        assert_eq!(out.verdict.confidence, 0.6);
    }
}
