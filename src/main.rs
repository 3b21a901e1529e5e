//! `prime-markup` command-line entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use prime_markup::book::OrderBookStore;
use prime_markup::config::{AppConfig, fetch_config, parse_products};
use prime_markup::credentials::{self, CredentialKey, populate_env_from_keychain};
use prime_markup::display::{DISPLAY_LEVELS, render_book, render_preview};
use prime_markup::logging;
use prime_markup::orders::{MemoryOrderStore, MetadataStore, OrderProcessor};
use prime_markup::websocket::{
    ChannelHandler, MarketDataHandler, OrderUpdateHandler, StreamClient, StreamConfig,
};

/// Fee markup tooling for the prime brokerage WebSocket feed.
#[derive(Parser, Debug)]
#[command(name = "prime-markup")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream level-2 books and print them with fee-adjusted prices.
    Book {
        /// Comma-separated products; defaults to MARKET_DATA_PRODUCTS.
        #[arg(long)]
        symbols: Option<String>,

        /// Also show the marked-up cost of buying this base quantity.
        #[arg(long)]
        preview_qty: Option<Decimal>,
    },

    /// Stream order updates and settle fee holds until Ctrl-C.
    Orders {
        /// Comma-separated products; defaults to MARKET_DATA_PRODUCTS.
        #[arg(long)]
        symbols: Option<String>,
    },

    /// Load and print the configuration with secrets redacted.
    CheckConfig,

    /// Manage credentials stored in the OS keychain.
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand, Debug)]
enum CredentialAction {
    /// Show which credentials are stored.
    Status,

    /// Store one credential, read from stdin.
    Set {
        /// Environment variable name, e.g. PRIME_SIGNING_KEY.
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keychain management works without a loadable configuration.
    if let Command::Credentials { action } = &args.command {
        return cmd_credentials(action);
    }

    // Environment mutation must happen before the runtime spawns threads.
    dotenvy::dotenv().ok();
    populate_env_from_keychain();

    // wss:// connections go through rustls; pin its crypto backend.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = fetch_config().context("failed to load configuration")?;
    logging::init(&config.log.level, config.log.json);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(async move {
        match args.command {
            Command::Book {
                symbols,
                preview_qty,
            } => cmd_book(&config, symbols.as_deref(), preview_qty).await,
            Command::Orders { symbols } => cmd_orders(&config, symbols.as_deref()).await,
            Command::CheckConfig => cmd_check_config(&config),
            Command::Credentials { .. } => Ok(()),
        }
    })
}

fn products_for(config: &AppConfig, symbols: Option<&str>) -> anyhow::Result<Vec<String>> {
    let products = match symbols {
        Some(raw) => parse_products(raw),
        None => config.market_data.products.clone(),
    };
    anyhow::ensure!(!products.is_empty(), "at least one product symbol is required");
    Ok(products)
}

fn stream_client(config: &AppConfig, handler: Arc<dyn ChannelHandler>) -> StreamClient {
    StreamClient::new(
        StreamConfig {
            url: config.market_data.websocket_url.clone(),
            credentials: config.prime.credentials.clone(),
            reconnect_delay: config.market_data.reconnect_delay,
        },
        handler,
    )
}

async fn cmd_book(
    config: &AppConfig,
    symbols: Option<&str>,
    preview_qty: Option<Decimal>,
) -> anyhow::Result<()> {
    let products = products_for(config, symbols)?;
    println!("Starting market data stream for {products:?}");
    println!(
        "Display updates every {:?}. Press Ctrl+C to stop.\n",
        config.market_data.display_update_rate
    );

    let books = Arc::new(OrderBookStore::new(config.market_data.max_levels));
    let handler = Arc::new(MarketDataHandler::new(products.clone(), Arc::clone(&books)));
    let client = stream_client(config, handler);
    client.start()?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tokio::select! {
        () = tokio::time::sleep(config.market_data.initial_wait) => {}
        _ = &mut shutdown => {
            client.stop();
            client.join().await;
            return Ok(());
        }
    }

    let mut ticker = tokio::time::interval(config.market_data.display_update_rate);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut screen = String::from("\x1b[2J\x1b[H");
                for product in &products {
                    let Some(book) = books.get(product) else { continue };
                    let snapshot = book.snapshot();
                    if snapshot.bids.is_empty() || snapshot.asks.is_empty() {
                        continue;
                    }
                    screen.push_str(&render_book(&snapshot, &config.fees, DISPLAY_LEVELS));
                    if let Some(line) =
                        preview_qty.and_then(|qty| render_preview(&snapshot, &config.fees, qty))
                    {
                        screen.push_str(&line);
                    }
                }
                if screen.len() == "\x1b[2J\x1b[H".len() {
                    screen.push_str("Waiting for market data...\n");
                }
                print!("{screen}");
            }
            _ = &mut shutdown => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    client.stop();
    client.join().await;
    Ok(())
}

async fn cmd_orders(config: &AppConfig, symbols: Option<&str>) -> anyhow::Result<()> {
    let products = products_for(config, symbols)?;

    let store = Arc::new(MemoryOrderStore::new());
    let processor = Arc::new(OrderProcessor::new(
        config.fees,
        Arc::new(MetadataStore::new()),
        store.clone(),
    ));
    let handler = Arc::new(OrderUpdateHandler::new(
        products.clone(),
        config.prime.portfolio_id.clone(),
        processor,
    ));
    let client = stream_client(config, handler);
    client.start()?;
    info!(?products, portfolio = %config.prime.portfolio_id, "Streaming order updates");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    client.stop();
    client.join().await;

    let records = store.records();
    println!("\nTracked {} orders", records.len());
    for record in records {
        println!(
            "  {} {:<10} {:<5} filled {} @ {}  earned {} rebate {}",
            record.order_id,
            record.status,
            record.side,
            record.cum_qty,
            record.avg_px,
            record.settlement.actual_earned_fee,
            record.settlement.rebate_amount,
        );
    }

    Ok(())
}

fn cmd_check_config(config: &AppConfig) -> anyhow::Result<()> {
    println!("Configuration OK");
    println!("{config:#?}");
    Ok(())
}

fn cmd_credentials(action: &CredentialAction) -> anyhow::Result<()> {
    match action {
        CredentialAction::Status => {
            for key in CredentialKey::ALL {
                let state = if credentials::is_set(key) { "stored" } else { "not set" };
                println!("  {:<20} {:<26} {state}", key.label(), key.env_var());
            }
        }
        CredentialAction::Set { name } => {
            let key = CredentialKey::from_env_var(name)
                .with_context(|| format!("unknown credential {name}"))?;
            println!("Enter {}:", key.label());

            let mut value = zeroize::Zeroizing::new(String::new());
            std::io::stdin()
                .read_line(&mut value)
                .context("failed to read value from stdin")?;
            let trimmed = value.trim();
            anyhow::ensure!(!trimmed.is_empty(), "{} cannot be empty", key.label());

            credentials::save(key, trimmed)?;
            if key.is_secret() {
                println!("Saved {} to the keychain", key.label());
            } else {
                println!("Saved {} = {trimmed} to the keychain", key.label());
            }
        }
    }
    Ok(())
}
