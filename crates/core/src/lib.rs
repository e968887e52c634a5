pub mod dashboard;
pub mod domain;
pub mod llm;
pub mod market;
pub mod retry;
pub mod verdict;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    use crate::llm::{AuthStyle, EnvelopeFormat};

    pub const DEFAULT_AI_SERVICE_BASE_URL: &str =
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
    pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";

    /// Process configuration, read once at startup and handed to each client constructor.
    #[derive(Debug, Clone)]
    pub struct Settings {
        pub ai_service_api_key: Option<String>,
        pub ai_service_base_url: String,
        pub ai_service_auth: AuthStyle,
        pub ai_service_envelope: EnvelopeFormat,
        pub ai_service_timeout: Duration,
        pub ai_service_retries: u32,
        pub ai_service_backoff: Duration,
        pub market_data_base_url: String,
        pub market_data_timeout: Duration,
        pub market_data_retries: u32,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                ai_service_api_key: None,
                ai_service_base_url: DEFAULT_AI_SERVICE_BASE_URL.to_string(),
                ai_service_auth: AuthStyle::QueryKey,
                ai_service_envelope: EnvelopeFormat::Candidates,
                ai_service_timeout: Duration::from_secs(60),
                ai_service_retries: 5,
                ai_service_backoff: Duration::from_millis(1000),
                market_data_base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string(),
                market_data_timeout: Duration::from_secs(30),
                market_data_retries: 3,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from any key lookup. Blank values count as unset;
        /// values that are set but unparseable are an error.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let defaults = Self::default();
            let get = |key: &str| {
                lookup(key)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            };
            let ai_service_auth = match get("AI_SERVICE_AUTH") {
                Some(s) => s.parse::<AuthStyle>().context("invalid AI_SERVICE_AUTH")?,
                None => defaults.ai_service_auth,
            };
            let ai_service_envelope = match get("AI_SERVICE_ENVELOPE") {
                Some(s) => s
                    .parse::<EnvelopeFormat>()
                    .context("invalid AI_SERVICE_ENVELOPE")?,
                None => defaults.ai_service_envelope,
            };

            Ok(Self {
                // An empty key is the same as no key: the call is attempted unauthenticated.
                ai_service_api_key: get("AI_SERVICE_API_KEY"),
                ai_service_base_url: get("AI_SERVICE_BASE_URL")
                    .unwrap_or(defaults.ai_service_base_url),
                ai_service_auth,
                ai_service_envelope,
                ai_service_timeout: parse_var::<u64>(&get, "AI_SERVICE_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.ai_service_timeout),
                ai_service_retries: parse_var::<u32>(&get, "AI_SERVICE_RETRIES")?
                    .unwrap_or(defaults.ai_service_retries),
                ai_service_backoff: parse_var::<u64>(&get, "AI_SERVICE_BACKOFF_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.ai_service_backoff),
                market_data_base_url: get("MARKET_DATA_BASE_URL")
                    .unwrap_or(defaults.market_data_base_url),
                market_data_timeout: parse_var::<u64>(&get, "MARKET_DATA_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.market_data_timeout),
                market_data_retries: parse_var::<u32>(&get, "MARKET_DATA_RETRIES")?
                    .unwrap_or(defaults.market_data_retries),
                sentry_dsn: get("SENTRY_DSN"),
            })
        }
    }

    fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        get(key)
            .map(|s| s.parse::<T>().with_context(|| format!("invalid {key}: {s:?}")))
            .transpose()
    }

}
