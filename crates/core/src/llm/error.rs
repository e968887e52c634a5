use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Request never produced a response (connect error, timeout).
    Transport,
    /// Non-2xx response.
    Status,
    /// 2xx, but the generated text could not be located in the body.
    Envelope,
    /// Generated text is not a verdict object.
    Parse,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::Transport => "transport",
            FailureStage::Status => "status",
            FailureStage::Envelope => "envelope",
            FailureStage::Parse => "parse",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: &'static str,
    pub stage: FailureStage,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl LlmDiagnosticsError {
    pub fn new(provider: &'static str, stage: FailureStage, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }

    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.stage, FailureStage::Transport | FailureStage::Status)
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={}): {}",
            self.provider,
            self.stage.as_str(),
            self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
