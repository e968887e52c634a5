use anyhow::Context;
use clap::{Parser, Subcommand};
use stockpulse_core::dashboard;
use stockpulse_core::llm::gemini::GeminiClient;
use stockpulse_core::market::provider::{PriceHistoryProvider, YahooChartProvider, LOOKBACK_DAYS};
use stockpulse_core::market::symbols::{normalize_symbol, parse_symbol_list, DEFAULT_SYMBOL, WELL_KNOWN_SYMBOLS};
use stockpulse_core::verdict::VerdictResolver;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Parser)]
#[command(name = "stockpulse", about = "One-year stock KPIs and BUY/SELL/HOLD verdicts")]
struct Args {
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// KPIs, trend and verdict for one symbol.
    Analyze {
        #[arg(long, default_value = DEFAULT_SYMBOL)]
        symbol: String,

        /// Skip the text-generation call entirely.
        #[arg(long)]
        no_verdict: bool,
    },
    /// Which comparison symbols close above a baseline.
    Compare {
        #[arg(long, default_value = DEFAULT_SYMBOL)]
        symbol: String,

        /// Comma separated list; defaults to the well-known symbols.
        #[arg(long)]
        with: Option<String>,

        /// Baseline price; defaults to the latest close of `--symbol`.
        #[arg(long)]
        baseline: Option<f64>,
    },
    /// List the well-known symbols.
    Symbols,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockpulse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(&args, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run(args: &Args, settings: &stockpulse_core::config::Settings) -> anyhow::Result<()> {
    match &args.command {
        Command::Symbols => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&WELL_KNOWN_SYMBOLS)?);
            } else {
                println!("{}", WELL_KNOWN_SYMBOLS.join(" "));
            }
        }
        Command::Analyze { symbol, no_verdict } => {
            let symbol = normalize_symbol(symbol).context("invalid --symbol")?;
            let provider = YahooChartProvider::from_settings(settings)?;
            let resolver = if *no_verdict {
                None
            } else {
                let llm = GeminiClient::from_settings(settings)?;
                Some(VerdictResolver::from_settings(llm, settings))
            };

            let report = dashboard::analyze_symbol(&provider, resolver.as_ref(), &symbol)
                .await
                .with_context(|| format!("Error fetching stock data for '{symbol}'"))?;

            tracing::info!(
                %symbol,
                bars = report.chart.len(),
                fallback = report.verdict.as_ref().map(|v| v.is_fallback()),
                "analysis complete"
            );

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::symbol_report(&report));
            }
        }
        Command::Compare {
            symbol,
            with,
            baseline,
        } => {
            let symbol = normalize_symbol(symbol).context("invalid --symbol")?;
            let provider = YahooChartProvider::from_settings(settings)?;

            let baseline = match baseline {
                Some(b) => {
                    anyhow::ensure!(b.is_finite(), "--baseline must be a finite number");
                    *b
                }
                None => provider
                    .fetch_history(&symbol, LOOKBACK_DAYS)
                    .await
                    .with_context(|| format!("Error fetching stock data for '{symbol}'"))?
                    .latest_close()
                    .with_context(|| format!("no numeric close prices for '{symbol}'"))?,
            };

            let members: Vec<String> = match with.as_deref() {
                Some(raw) => parse_symbol_list(raw),
                None => WELL_KNOWN_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            }
            .into_iter()
            .filter(|m| *m != symbol)
            .collect();

            let report = dashboard::compare(&provider, Some(symbol), baseline, &members).await;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::comparison_report(&report));
            }
        }
    }
    Ok(())
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
