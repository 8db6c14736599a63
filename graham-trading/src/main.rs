//! Graham Trading - Annually rebalanced defensive-investor portfolio.
//!
//! `graham run` schedules the daily strategy invocation, `graham screen`
//! runs the screening funnel once, and `graham replay` drives the strategy
//! over a range of historical sessions against the paper gateway.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use graham_common::config::Config;
use graham_common::logging::init_logging;
use graham_trading::data::{SnapshotProvider, TradingCalendar};
use graham_trading::error::StrategyError;
use graham_trading::execution::{PaperConfig, PaperGateway};
use graham_trading::scheduler::{self, DailyScheduler, DayOutcome};
use graham_trading::screener::{
    ReportFormat, ScreeningEngine, ScreeningParameters, ScreeningReport, ScreeningRun,
};
use graham_trading::strategy::{DayAction, GrahamStrategy, StrategySettings};

type PaperStrategy =
    GrahamStrategy<SnapshotProvider, SnapshotProvider, PaperGateway<SnapshotProvider>>;

#[derive(Parser, Debug)]
#[command(name = "graham")]
#[command(version)]
#[command(about = "Annually rebalanced Graham defensive portfolio for A-shares", long_about = None)]
struct Cli {
    /// Config file (default: ~/.graham/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the strategy on its daily schedule until Ctrl-C
    Run,

    /// Run the screening funnel once and write a report
    Screen {
        /// Data date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Report format (markdown, json)
        #[arg(long, default_value = "markdown")]
        format: ReportFormat,

        /// Report path (default: <report_dir>/<run id>)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Drive the strategy over every session in a date range
    Replay {
        /// First date (inclusive)
        #[arg(long)]
        from: NaiveDate,

        /// Last date (inclusive)
        #[arg(long)]
        to: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_and_validate(cli.config.as_deref())?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    info!("Graham Trading v{}", env!("CARGO_PKG_VERSION"));

    let data_file = config
        .trading
        .data_file
        .as_deref()
        .context("trading.data_file is not set (or export GRAHAM_DATA_FILE)")?;
    let provider = Arc::new(SnapshotProvider::from_file(data_file)?);
    info!(
        path = %data_file.display(),
        securities = provider.len(),
        "Data provider ready"
    );

    match cli.command {
        Commands::Run => run(&config, provider).await,
        Commands::Screen {
            date,
            format,
            output,
        } => screen(&config, provider, date, format, output),
        Commands::Replay { from, to } => replay(&config, provider, from, to),
    }
}

fn build_strategy(
    config: &Config,
    provider: Arc<SnapshotProvider>,
) -> (PaperStrategy, Arc<PaperGateway<SnapshotProvider>>) {
    let gateway = Arc::new(PaperGateway::new(
        Arc::clone(&provider),
        PaperConfig::from_trading(&config.trading),
    ));
    let strategy = GrahamStrategy::new(
        Arc::clone(&provider),
        provider,
        Arc::clone(&gateway),
        ScreeningParameters::from_config(&config.trading.screening),
        StrategySettings::from_config(&config.trading),
    );
    (strategy, gateway)
}

/// One strategy invocation with the paper session pinned to the invocation date.
fn invoke_paper(strategy: &mut PaperStrategy, at: chrono::NaiveDateTime) -> DayOutcome {
    strategy
        .gateway()
        .set_session(at.date())
        .map_err(StrategyError::Account)?;
    strategy.on_trading_day(at)
}

async fn run(config: &Config, provider: Arc<SnapshotProvider>) -> Result<()> {
    let scheduler = DailyScheduler::new(&config.trading.schedule_cron)?;
    let (mut strategy, gateway) = build_strategy(config, provider);

    let report_dir = config.trading.report_dir.clone();
    let job = move |at| {
        let outcome = invoke_paper(&mut strategy, at);
        if let Ok(DayAction::Selected { run, .. }) = &outcome {
            save_report(run, &report_dir.join(&run.id), ReportFormat::Markdown);
        }
        outcome
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    scheduler.run(job, shutdown).await?;

    let account = gateway.account()?;
    info!(
        total_assets = account.total_assets,
        cash = account.cash,
        positions = account.position_count,
        "Shutdown complete"
    );
    Ok(())
}

fn screen(
    config: &Config,
    provider: Arc<SnapshotProvider>,
    date: Option<NaiveDate>,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let as_of = date.unwrap_or_else(|| Local::now().date_naive());
    let settings = StrategySettings::from_config(&config.trading);
    let engine = ScreeningEngine::new(
        provider,
        ScreeningParameters::from_config(&config.trading.screening),
        settings.universe,
    );

    let run = engine.run(as_of)?;
    info!("{}", run.summary());

    let path = output.unwrap_or_else(|| config.trading.report_dir.join(&run.id));
    let saved = ScreeningReport::new(&run)
        .save_to_file(&path, format)
        .with_context(|| format!("Failed to save report to {}", path.display()))?;
    info!(path = %saved.display(), "Report saved");

    for symbol in run.symbols() {
        println!("{}", symbol);
    }
    Ok(())
}

fn replay(
    config: &Config,
    provider: Arc<SnapshotProvider>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<()> {
    anyhow::ensure!(from <= to, "--from {} is after --to {}", from, to);

    let sessions = provider
        .trading_sessions(&config.trading.calendar_exchange, from, to)
        .context("Failed to load trading calendar")?;
    let fire_time = NaiveTime::from_hms_opt(9, 40, 0).context("Invalid fire time")?;

    let (mut strategy, gateway) = build_strategy(config, provider);
    info!(
        from = %from,
        to = %to,
        sessions = sessions.len(),
        "Replaying sessions"
    );

    for session in sessions {
        let outcome = invoke_paper(&mut strategy, session.and_time(fire_time));
        scheduler::log_outcome(&outcome);
        if let Ok(DayAction::Selected { run, .. }) = &outcome {
            save_report(run, &config.trading.report_dir.join(&run.id), ReportFormat::Markdown);
        }
    }

    let account = gateway.account()?;
    info!(
        cash = account.cash,
        market_value = account.market_value,
        total_assets = account.total_assets,
        realized_pnl = account.realized_pnl,
        floating_pnl = account.floating_pnl,
        commission = account.commission_paid,
        positions = account.position_count,
        frozen_cash = strategy.frozen_cash(),
        "Replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&account)?);
    Ok(())
}

fn save_report(run: &ScreeningRun, path: &std::path::Path, format: ReportFormat) {
    match ScreeningReport::new(run).save_to_file(path, format) {
        Ok(saved) => info!(path = %saved.display(), "Report saved"),
        Err(e) => tracing::warn!(error = %e, "Failed to save report"),
    }
}
