use crate::config::Settings;
use crate::llm::error::{FailureStage, LlmDiagnosticsError};
use crate::llm::{AuthStyle, EnvelopeFormat, LlmClient};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

const PROVIDER: &str = "generative_language";
const TEMPERATURE: f32 = 0.3;
const MAX_OUTPUT_TOKENS: u32 = 200;

/// Client for a `generateContent`-style text-generation endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    auth: AuthStyle,
    envelope: EnvelopeFormat,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        if settings.ai_service_api_key.is_none() {
            tracing::warn!("AI_SERVICE_API_KEY not set; verdict requests will be unauthenticated");
        }

        let http = reqwest::Client::builder()
            .timeout(settings.ai_service_timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url: settings.ai_service_base_url.clone(),
            api_key: settings.ai_service_api_key.clone(),
            auth: settings.ai_service_auth,
            envelope: settings.ai_service_envelope,
        })
    }

    fn request(&self, prompt: &str) -> reqwest::Result<reqwest::Request> {
        let mut builder = self.http.post(&self.base_url).json(&request_body(prompt));
        if let Some(key) = &self.api_key {
            builder = match self.auth {
                AuthStyle::QueryKey => builder.query(&[("key", key)]),
                AuthStyle::Bearer => builder.bearer_auth(key),
            };
        }
        builder.build()
    }

    fn err(&self, stage: FailureStage, detail: impl Into<String>) -> LlmDiagnosticsError {
        LlmDiagnosticsError::new(PROVIDER, stage, detail)
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn envelope(&self) -> EnvelopeFormat {
        self.envelope
    }

    async fn generate(&self, prompt: &str) -> Result<Value, LlmDiagnosticsError> {
        let req = self
            .request(prompt)
            .map_err(|e| self.err(FailureStage::Transport, format!("invalid request: {e}")))?;

        let res = self
            .http
            .execute(req)
            .await
            .map_err(|e| self.err(FailureStage::Transport, e.to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| self.err(FailureStage::Transport, format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(self
                .err(FailureStage::Status, format!("status={status}"))
                .with_raw_output(text));
        }

        serde_json::from_str::<Value>(&text).map_err(|e| {
            self.err(FailureStage::Envelope, format!("response body is not JSON: {e}"))
                .with_raw_output(text)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    response_schema: Value,
}

fn request_body(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            response_mime_type: "application/json",
            response_schema: serde_json::json!({
                "type": "OBJECT",
                "properties": {
                    "verdict": {"type": "STRING", "enum": ["BUY", "SELL", "HOLD"]},
                    "confidence": {"type": "NUMBER"},
                    "insight": {"type": "STRING"}
                },
                "required": ["verdict", "insight"]
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>, auth: AuthStyle) -> GeminiClient {
        let settings = Settings {
            ai_service_api_key: api_key.map(str::to_string),
            ai_service_base_url: "https://llm.example.com/v1/models/m:generateContent".to_string(),
            ai_service_auth: auth,
            ..Settings::default()
        };
        GeminiClient::from_settings(&settings).unwrap()
    }

    fn body_json(req: &reqwest::Request) -> Value {
        let bytes = req.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn request_body_matches_generate_content_shape() {
        let req = client(None, AuthStyle::QueryKey).request("Analyze TSLA").unwrap();
        let body = body_json(&req);

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Analyze TSLA");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 200);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.3).abs() < 1e-6);
    }

    #[test]
    fn query_key_auth_appends_key_param() {
        let req = client(Some("secret"), AuthStyle::QueryKey).request("p").unwrap();
        assert_eq!(req.url().query(), Some("key=secret"));
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn bearer_auth_sets_header() {
        let req = client(Some("secret"), AuthStyle::Bearer).request("p").unwrap();
        assert_eq!(req.url().query(), None);
        assert_eq!(
            req.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn missing_key_sends_unauthenticated_request() {
        let req = client(None, AuthStyle::QueryKey).request("p").unwrap();
        assert_eq!(req.url().query(), None);
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }
}
