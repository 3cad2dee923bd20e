//! Order execution latency benchmark CLI
//!
//! Runs a benchmark batch against the in-process simulated venue; a real
//! venue is wired in by swapping the `VenueTransport` implementation.

use clap::{Parser, Subcommand};
use latency_bench::{
    bench::BenchmarkOrchestrator,
    book::OrderBookStateMachine,
    config::BenchmarkConfig,
    gateway::OrderExecutionGateway,
    sim::{SimulatedVenue, SimulatedVenueConfig},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "latency-bench")]
#[command(about = "Order execution latency benchmark for exchange venues")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark batch
    Run {
        /// Instrument symbol
        #[arg(long)]
        symbol: Option<String>,
        /// Order kind: market, limit or postOnly
        #[arg(long)]
        order_kind: Option<String>,
        /// Number of orders in the batch
        #[arg(long)]
        orders: Option<usize>,
        /// Order size
        #[arg(long)]
        size: Option<String>,
        /// Delay between orders (ms)
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Per-order fill timeout (ms)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the effective configuration and exit
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            symbol,
            order_kind,
            orders,
            size,
            delay_ms,
            timeout_ms,
        } => {
            let mut builder = BenchmarkConfig::builder().file(&cli.config);
            if let Some(symbol) = symbol {
                builder = builder.set("symbol", &symbol);
            }
            if let Some(kind) = order_kind {
                builder = builder.set("order_kind", &kind);
            }
            if let Some(orders) = orders {
                builder = builder.set("order_count", &orders.to_string());
            }
            if let Some(size) = size {
                builder = builder.set("order_size", &size);
            }
            if let Some(delay) = delay_ms {
                builder = builder.set("inter_order_delay_ms", &delay.to_string());
            }
            if let Some(timeout) = timeout_ms {
                builder = builder.set("order_timeout_ms", &timeout.to_string());
            }
            let config = builder.build()?;

            let (venue, fills) = SimulatedVenue::new(SimulatedVenueConfig::default());

            // Book reconstruction runs on its own task, fed by the
            // venue's push subscription, queried after the run
            let book = Arc::new(Mutex::new(OrderBookStateMachine::new(&config.symbol)));
            let book_rx = venue.subscribe_book(&config.symbol)?;
            let _book_pump = SimulatedVenue::spawn_book_pump(book.clone(), book_rx);

            let gateway = Arc::new(OrderExecutionGateway::new(venue));
            let _pump = SimulatedVenue::spawn_notification_pump(gateway.clone(), fills);
            let orchestrator = BenchmarkOrchestrator::new(gateway);

            let result = orchestrator.run_benchmark(config).await?;

            if let Some(agg) = &result.statistics.send_to_return {
                info!(
                    "send-to-return: avg {:.2}ms p50 {:.2}ms p95 {:.2}ms p99 {:.2}ms",
                    agg.avg_ms, agg.p50_ms, agg.p95_ms, agg.p99_ms
                );
            }
            if let Some(agg) = &result.statistics.send_to_fill {
                info!(
                    "send-to-fill:   avg {:.2}ms p50 {:.2}ms p95 {:.2}ms p99 {:.2}ms",
                    agg.avg_ms, agg.p50_ms, agg.p95_ms, agg.p99_ms
                );
            }
            let view = book.lock().snapshot_view();
            info!(
                "{} book after run: {} bids / {} asks resting, best bid {:?} best ask {:?}",
                view.coin,
                view.bids.len(),
                view.asks.len(),
                view.bids.first().map(|level| level.price),
                view.asks.first().map(|level| level.price)
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::ShowConfig => {
            let config = BenchmarkConfig::builder().file(&cli.config).build()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
