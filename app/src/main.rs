// In app/src/main.rs

use anyhow::Result;
use api_client::{ApiClient, BacktestParams, ResultsWatcher};
use backtest_model::{BacktestResult, ProfitFactor, Trade};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::prelude::*;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A terminal dashboard for the crypto backtest engine.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetches the latest backtest result and prints the full report.
    Show {
        /// Page of the trade history to display (1-indexed, most recent first).
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Number of trades per page.
        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },

    /// Triggers a new backtest run on the engine.
    Run {
        /// The trading symbol to backtest (e.g., "BTC/USDT").
        #[arg(short, long)]
        symbol: String,

        /// The candle interval for the run (e.g., "1m", "1h").
        #[arg(short, long, default_value = "1m")]
        timeframe: String,

        #[arg(long, default_value_t = 8)]
        ema_fast: u32,

        #[arg(long, default_value_t = 21)]
        ema_slow: u32,

        #[arg(long, default_value_t = 14)]
        rsi_period: u32,

        /// Stop-loss distance in percent.
        #[arg(long, default_value_t = 0.6)]
        sl_pct: f64,

        /// Take-profit distance in percent.
        #[arg(long, default_value_t = 1.2)]
        tp_pct: f64,

        /// Position size as a percent of the balance.
        #[arg(long, default_value_t = 25.0)]
        size_pct: f64,
    },

    /// Watches the engine and prints a report whenever a new result lands.
    Watch,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    // --- Tracing Setup ---
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("reqwest", tracing::Level::WARN)
            .with_default(tracing::Level::INFO),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    // Parse command-line arguments.
    let cli = Cli::parse();

    // Match on the parsed command and call the appropriate handler.
    match cli.command {
        Commands::Show { page, page_size } => {
            handle_show(page, page_size).await?;
        }
        Commands::Run {
            symbol,
            timeframe,
            ema_fast,
            ema_slow,
            rsi_period,
            sl_pct,
            tp_pct,
            size_pct,
        } => {
            let params = BacktestParams {
                symbol,
                timeframe,
                ema_fast,
                ema_slow,
                rsi_period,
                sl_pct,
                tp_pct,
                size_pct,
            };
            handle_run(params).await?;
        }
        Commands::Watch => {
            handle_watch().await?;
        }
    }

    Ok(())
}

// --- "Show" Subcommand Logic ---

/// Fetches the current result once and renders the report views.
async fn handle_show(page: usize, page_size: usize) -> Result<()> {
    let settings = app_config::load_settings()?;
    let client = api_client::new(&settings.api)?;

    let Some(raw) = client.fetch_results().await? else {
        println!("No backtest results yet. Trigger one with the `run` command.");
        return Ok(());
    };

    let snapshot = backtest_model::ingest(&raw)?;
    if snapshot.is_empty() {
        println!(
            "Latest run for {} {} produced no trades or equity points.",
            snapshot.symbol, snapshot.timeframe
        );
        return Ok(());
    }

    print_report(&snapshot);
    print_daily_pnl(&snapshot, 30);
    print_trades_page(&snapshot, page, page_size);
    Ok(())
}

// --- "Run" Subcommand Logic ---

/// Asks the engine to start a new backtest with the given parameters.
async fn handle_run(params: BacktestParams) -> Result<()> {
    let settings = app_config::load_settings()?;
    let client = api_client::new(&settings.api)?;

    tracing::info!(symbol = %params.symbol, timeframe = %params.timeframe, "Requesting backtest run.");
    client.run_backtest(&params).await?;

    println!(
        "Backtest for {} {} started. Use `watch` to see the result when it lands.",
        params.symbol, params.timeframe
    );
    Ok(())
}

// --- "Watch" Subcommand Logic ---

/// Runs the polling watcher and prints a fresh report on every new snapshot.
async fn handle_watch() -> Result<()> {
    let settings = app_config::load_settings()?;
    let client = ApiClient::new(&settings.api)?;

    let mut watcher = ResultsWatcher::new(
        client,
        Duration::from_secs(settings.api.results_poll_secs),
    );
    let mut snapshots = watcher.subscribe();

    // The watcher loops forever in its own task; we render on this one.
    let watcher_handle = tokio::spawn(async move { watcher.run().await });

    loop {
        match snapshots.recv().await {
            Ok(snapshot) => {
                print_report(&snapshot);
                print_daily_pnl(&snapshot, 30);
                print_trades_page(&snapshot, 1, 10);
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Renderer fell behind the watcher; skipping snapshots.");
            }
            Err(RecvError::Closed) => break,
        }
    }

    watcher_handle.abort();
    anyhow::bail!("The results watcher terminated unexpectedly.");
}

// --- Report Rendering ---

/// Helper function to print the summary card in a readable format.
fn print_report(snapshot: &BacktestResult) {
    let summary = snapshot.summary();

    println!("\n--- Backtest Results: {} {} ---", snapshot.symbol, snapshot.timeframe);
    if let Some(updated_at) = &snapshot.updated_at {
        println!("Updated:           {}", updated_at);
    }
    println!("-----------------------------------");
    println!("Initial Balance:   ${:.2}", summary.initial_balance);
    println!("Final Equity:      ${:.2}", summary.final_equity);
    println!(
        "Total PnL:         ${:.2} ({:.2}%)",
        summary.total_pnl,
        summary.total_return * 100.0
    );
    println!("Trades:            {}", summary.n_trades);
    println!("Win Rate:          {:.2}%", summary.win_rate);
    match summary.profit_factor {
        ProfitFactor::Ratio(ratio) => println!("Profit Factor:     {:.2}", ratio),
        ProfitFactor::NoLosses => println!("Profit Factor:     inf (no losing trades)"),
    }
    println!("Max Drawdown:      {:.2}%", summary.max_drawdown_pct);
    if snapshot.dropped_points > 0 || snapshot.dropped_trades > 0 {
        println!(
            "Warning:           {} points / {} trades dropped during ingestion",
            snapshot.dropped_points, snapshot.dropped_trades
        );
    }
    println!("-----------------------------------");
}

/// Prints the most recent `days` of daily PnL, oldest first.
fn print_daily_pnl(snapshot: &BacktestResult, days: usize) {
    let series = snapshot.daily_pnl_series();
    if series.is_empty() {
        return;
    }

    println!("Daily PnL (recent):");
    let start = series.len().saturating_sub(days);
    for entry in &series[start..] {
        println!("  {}  ${:.2}", entry.day, entry.value);
    }
    println!("-----------------------------------");
}

/// Prints one page of the trade history, most recent entry first.
fn print_trades_page(snapshot: &BacktestResult, page: usize, page_size: usize) {
    let trades: Vec<&Trade> = snapshot.trades_descending().collect();

    let current = match backtest_model::paginate(&trades, page_size, page) {
        Ok(current) => current,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    println!(
        "Trades (page {} of {}, {} total):",
        current.page,
        current.total_pages,
        trades.len()
    );
    println!(
        "{:<20} {:<20} {:>12} {:>12} {:>10} {:>10} {:>8} {:<6}",
        "Entry", "Exit", "Entry Px", "Exit Px", "Qty", "PnL", "Fee", "Type"
    );
    for trade in current.items {
        println!(
            "{:<20} {:<20} {:>12.4} {:>12.4} {:>10.6} {:>10.2} {:>8.4} {:<6}",
            trade.entry_time.format("%Y-%m-%d %H:%M:%S"),
            trade.exit_time.format("%Y-%m-%d %H:%M:%S"),
            trade.entry_price,
            trade.exit_price,
            trade.quantity,
            trade.pnl,
            trade.fee,
            trade.kind
        );
    }
    println!("-----------------------------------");
}
