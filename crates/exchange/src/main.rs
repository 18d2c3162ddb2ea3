use std::sync::Arc;

use bourse_clock::SystemClock;
use bourse_exchange::infrastructure::config::bootstrap;
use bourse_exchange::infrastructure::logging;
use bourse_exchange::{ExchangeConfig, InMemoryExchange};
use log::info;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;

fn print_help() {
    eprintln!(
        r#"Bourse - toy securities exchange

USAGE:
    bourse [OPTIONS]

OPTIONS:
    --config <PATH>     Load instruments, users and seed orders from a JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    BOURSE_LOCK_TIMEOUT_MS   Row lock wait before a unit of work is aborted (default: 2000)
    RUST_LOG                 Log level filter (default: bourse=info,bourse_exchange=info)

Prints the resulting order books and trade histories as JSON on stdout.
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            ExchangeConfig::from_file(&path)?
        }
        None => {
            info!("Using default configuration");
            ExchangeConfig::default()
        }
    }
    .with_env_overrides()?;

    info!("Exchange: {}", config.name);
    info!("Instruments: {}", config.instruments.len());
    info!("Users: {}", config.users.len());
    info!("Seed orders: {}", config.seed_orders.len());

    let exchange: InMemoryExchange = config.build_exchange(Arc::new(SystemClock::new()));
    let mut events = exchange.notifier().subscribe();
    bootstrap(&exchange, &config).await?;

    let mut published = 0usize;
    loop {
        match events.try_recv() {
            Ok(_) => published += 1,
            Err(TryRecvError::Lagged(skipped)) => published += skipped as usize,
            Err(_) => break,
        }
    }
    info!("Bootstrap published {} events", published);

    let limits = exchange.limits();
    let mut markets = Vec::new();
    for instrument in &config.instruments {
        let book = exchange
            .get_orderbook(&instrument.ticker, limits.max_book_depth)
            .await?;
        let trades = exchange
            .get_trade_history(&instrument.ticker, limits.max_trade_history)
            .await?;
        markets.push(json!({
            "ticker": instrument.ticker,
            "active": instrument.active,
            "book": book,
            "trades": trades,
        }));
    }

    let report = json!({
        "exchange": config.name,
        "events_published": published,
        "markets": markets,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
