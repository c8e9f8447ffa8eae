use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use etf_analyzer::batch::BatchRunner;
use etf_analyzer::config::{self, AppConfig};
use etf_analyzer::error::ConfigError;
use etf_analyzer::model;
use etf_analyzer::narrative::openai::OpenAiNarrator;
use etf_analyzer::provider::PriceProvider;
use etf_analyzer::provider::yahoo::YahooProvider;
use etf_analyzer::render::ReportSink;
use etf_analyzer::render::json::JsonSink;
use etf_analyzer::render::terminal::TerminalSink;
use etf_analyzer::report::{IndicatorSet, ReportBuilder};

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("price provider error")]
    Provider,
    #[display("narrative service error")]
    Narrative,
    #[display("output error")]
    Output,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "etf-analyzer", about = "Technical indicator report for ETFs")]
struct Cli {
    /// Path to the TOML configuration file [default: config.toml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated ticker symbols, e.g. "QQQ, SPY, TLT"
    #[arg(short, long)]
    symbols: Option<String>,

    /// Request a strategy narrative for every analysed symbol
    #[arg(long)]
    narrative: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).change_context(AppError::Config)?;

    init_tracing(&config);

    let symbols = match &cli.symbols {
        Some(input) => model::parse_symbols(input),
        None => config.analysis.symbols.clone(),
    };
    if symbols.is_empty() {
        tracing::warn!("no symbols requested; nothing to do");
        return Ok(());
    }

    // Resolve the narrative client before any network work so a missing
    // key fails fast.
    let narrator = if cli.narrative || config.narrative.enabled {
        let client_config = config
            .narrative
            .client_config(|var| std::env::var(var).ok())
            .change_context(AppError::Config)?;
        Some(OpenAiNarrator::new(client_config).change_context(AppError::Narrative)?)
    } else {
        None
    };

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let provider: Arc<dyn PriceProvider> = Arc::new(
        YahooProvider::new(&config.provider).change_context(AppError::Provider)?,
    );
    let indicators =
        IndicatorSet::from_config(&config.analysis).change_context(AppError::Config)?;
    let builder = ReportBuilder::new(config.analysis.prompt_language);
    let mut runner = BatchRunner::new(provider, indicators, builder, config.provider.concurrency);

    let mut outcomes = runner.run(&symbols).await;

    if let Some(narrator) = &narrator {
        let cancel = CancellationToken::new();
        let narration_done = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            let narration_done = narration_done.clone();
            async move {
                if watch_interrupts(tokio::signal::ctrl_c, cancel, narration_done).await {
                    std::process::exit(130);
                }
            }
        });

        runner.narrate(&mut outcomes, narrator, &cancel).await;
        narration_done.cancel();
    }

    // ── Output ────────────────────────────────────────────────────────────────
    let sink: Box<dyn ReportSink> = match cli.format {
        OutputFormat::Text => Box::new(TerminalSink),
        OutputFormat::Json => Box::new(JsonSink),
    };
    let mut stdout = std::io::stdout().lock();
    sink.render(&outcomes, &mut stdout).change_context(AppError::Output)?;

    Ok(())
}

/// The first interrupt during the narrative pass cancels outstanding
/// requests. Any later interrupt, or one arriving after the pass, returns
/// `true` and the caller exits.
async fn watch_interrupts<S, F>(
    mut signal: S,
    cancel: CancellationToken,
    narration_done: CancellationToken,
) -> bool
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = signal() => {
            if let Err(e) = result {
                tracing::warn!(error = ?e, "failed to listen for ctrl+c");
                return false;
            }
            info!("ctrl+c received, cancelling narrative requests");
            cancel.cancel();
        }
        _ = narration_done.cancelled() => {}
    }

    if signal().await.is_ok() {
        info!("ctrl+c received, exiting");
        return true;
    }
    false
}

/// An explicit path must exist. Without one, `config.toml` is used when
/// present and built-in defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<AppConfig, Report<ConfigError>> {
    match path {
        Some(path) => config::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => config::load(Path::new(DEFAULT_CONFIG)),
        None => {
            let config = AppConfig::default();
            config::validate(&config)?;
            Ok(config)
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
