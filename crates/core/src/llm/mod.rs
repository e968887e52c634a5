pub mod error;
pub mod gemini;
pub mod json;

use crate::llm::error::LlmDiagnosticsError;
use serde_json::Value;
use std::str::FromStr;

/// How the credential is attached to the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `?key=<api key>`
    QueryKey,
    /// `Authorization: Bearer <api key>`
    Bearer,
}

impl FromStr for AuthStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" | "query_key" | "key" => Ok(AuthStyle::QueryKey),
            "bearer" => Ok(AuthStyle::Bearer),
            other => anyhow::bail!("expected `query` or `bearer`, got {other:?}"),
        }
    }
}

/// Where the generated text sits inside a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeFormat {
    /// `candidates[0].content.parts[*].text`
    Candidates,
    /// The body is itself the verdict object.
    Flat,
}

impl FromStr for EnvelopeFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidates" => Ok(EnvelopeFormat::Candidates),
            "flat" => Ok(EnvelopeFormat::Flat),
            other => anyhow::bail!("expected `candidates` or `flat`, got {other:?}"),
        }
    }
}

impl EnvelopeFormat {
    /// Pulls the generated text out of a response body. Missing levels yield `None`.
    pub fn extract_text(self, body: &Value) -> Option<String> {
        match self {
            EnvelopeFormat::Candidates => {
                let parts = body
                    .get("candidates")?
                    .get(0)?
                    .get("content")?
                    .get("parts")?
                    .as_array()?;
                let text: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect();
                if text.is_empty() {
                    return None;
                }
                Some(text.concat())
            }
            EnvelopeFormat::Flat => match body {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => Some(body.to_string()),
                _ => None,
            },
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    fn envelope(&self) -> EnvelopeFormat;

    /// One request, no retries. Returns the raw response body.
    async fn generate(&self, prompt: &str) -> Result<Value, LlmDiagnosticsError>;
}
