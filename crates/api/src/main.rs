use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpulse_core::dashboard::{self, ComparisonReport, SymbolReport};
use stockpulse_core::llm::gemini::GeminiClient;
use stockpulse_core::market::provider::{NoPriceData, PriceHistoryProvider, YahooChartProvider, LOOKBACK_DAYS};
use stockpulse_core::market::symbols::{
    normalize_symbol, parse_symbol_list, DEFAULT_SYMBOL, WELL_KNOWN_SYMBOLS,
};
use stockpulse_core::verdict::VerdictResolver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockpulse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let provider = YahooChartProvider::from_settings(&settings)?;
    let llm = GeminiClient::from_settings(&settings)?;
    let state = AppState {
        provider: Arc::new(provider),
        resolver: Arc::new(VerdictResolver::from_settings(llm, &settings)),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/symbols", get(list_symbols))
        .route("/dashboard/:symbol", get(get_dashboard))
        .route("/compare/:symbol", get(get_comparison))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    provider: Arc<YahooChartProvider>,
    resolver: Arc<VerdictResolver<GeminiClient>>,
}

#[derive(Debug, Serialize)]
struct SymbolsResponse {
    default: &'static str,
    symbols: &'static [&'static str],
}

async fn list_symbols() -> Json<SymbolsResponse> {
    Json(SymbolsResponse {
        default: DEFAULT_SYMBOL,
        symbols: &WELL_KNOWN_SYMBOLS,
    })
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// A message shown in place of the section that could not be built.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(no_data) = err.downcast_ref::<NoPriceData>() {
            return Self {
                status: StatusCode::NOT_FOUND,
                message: format!(
                    "{no_data}. Please ensure '{}' is a valid stock ticker.",
                    no_data.symbol
                ),
            };
        }

        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "market data fetch failed");
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: format!("Error fetching stock data: {err:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn require_symbol(raw: &str) -> Result<String, ApiError> {
    normalize_symbol(raw).ok_or_else(|| ApiError::bad_request(format!("invalid symbol: {raw:?}")))
}

async fn get_dashboard(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<SymbolReport>, ApiError> {
    let symbol = require_symbol(&symbol)?;
    let report =
        dashboard::analyze_symbol(state.provider.as_ref(), Some(state.resolver.as_ref()), &symbol)
            .await?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
struct CompareQuery {
    /// Comma separated comparison symbols. Defaults to the well-known list.
    with: Option<String>,
    /// Explicit baseline; defaults to the symbol's latest close.
    baseline: Option<f64>,
}

impl CompareQuery {
    fn members(&self, symbol: &str) -> Vec<String> {
        let members = match self.with.as_deref() {
            Some(raw) => parse_symbol_list(raw),
            None => WELL_KNOWN_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };
        members.into_iter().filter(|m| m != symbol).collect()
    }
}

async fn get_comparison(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ComparisonReport>, ApiError> {
    let symbol = require_symbol(&symbol)?;

    let baseline = match query.baseline {
        Some(b) if b.is_finite() => b,
        Some(_) => return Err(ApiError::bad_request("baseline must be a finite number")),
        None => {
            let series = state.provider.fetch_history(&symbol, LOOKBACK_DAYS).await?;
            match series.latest_close() {
                Some(latest) => latest,
                None => {
                    return Err(anyhow::Error::new(NoPriceData {
                        symbol,
                        reason: "no numeric close prices",
                    })
                    .into())
                }
            }
        }
    };

    let members = query.members(&symbol);
    let report =
        dashboard::compare(state.provider.as_ref(), Some(symbol), baseline, &members).await;
    Ok(Json(report))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockpulse_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
