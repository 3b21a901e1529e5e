//! Application configuration loaded from environment variables.
//!
//! Credentials **must** be provided via environment variables (or the OS
//! keychain, see [`crate::credentials`]):
//! - `PRIME_ACCESS_KEY`, `PRIME_PASSPHRASE`, `PRIME_SIGNING_KEY`
//! - `PRIME_PORTFOLIO`, `PRIME_SERVICE_ACCOUNT_ID`
//!
//! Stream, fee and logging settings are optional and fall back to the
//! defaults below when unset or unreadable.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::auth::Credentials;
use crate::error::MarkupError;
use crate::fees::FeeStrategy;

/// Default prime brokerage WebSocket endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "wss://ws-feed.prime.coinbase.com";
const DEFAULT_PRODUCTS: &str = "BTC-USD";
const DEFAULT_MAX_LEVELS: usize = 10;
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_INITIAL_WAIT: Duration = Duration::from_secs(2);
const DEFAULT_DISPLAY_RATE: Duration = Duration::from_secs(5);
const DEFAULT_FEE_PERCENT: &str = "0.002";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub prime: PrimeConfig,
    pub market_data: MarketDataConfig,
    pub fees: FeeStrategy,
    pub log: LogConfig,
}

/// Venue credentials and the portfolio they trade for.
#[derive(Debug, Clone)]
pub struct PrimeConfig {
    pub credentials: Credentials,
    pub portfolio_id: String,
}

/// Stream and display settings.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub websocket_url: String,
    pub products: Vec<String>,
    /// Book depth per side; `0` keeps every level.
    pub max_levels: usize,
    pub reconnect_delay: Duration,
    pub initial_wait: Duration,
    pub display_update_rate: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`MarkupError::Config`](crate::MarkupError::Config) if a
/// credential is missing, the product list is empty, or `FEE_PERCENT` is not
/// a non-negative decimal.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let credentials = Credentials::new(
        required_var("PRIME_ACCESS_KEY")?,
        required_var("PRIME_PASSPHRASE")?,
        required_var("PRIME_SIGNING_KEY")?,
        required_var("PRIME_SERVICE_ACCOUNT_ID")?,
    );
    let portfolio_id = required_var("PRIME_PORTFOLIO")?;

    let products = parse_products(
        &non_empty_var("MARKET_DATA_PRODUCTS").unwrap_or_else(|| DEFAULT_PRODUCTS.to_string()),
    );
    if products.is_empty() {
        return Err(MarkupError::Config(
            "MARKET_DATA_PRODUCTS contains no products".to_string(),
        ));
    }

    let market_data = MarketDataConfig {
        websocket_url: non_empty_var("MARKET_DATA_WEBSOCKET_URL")
            .unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string()),
        products,
        max_levels: non_empty_var("MARKET_DATA_MAX_LEVELS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_LEVELS),
        reconnect_delay: duration_var("MARKET_DATA_RECONNECT_DELAY", DEFAULT_RECONNECT_DELAY),
        initial_wait: duration_var("MARKET_DATA_INITIAL_WAIT_TIME", DEFAULT_INITIAL_WAIT),
        display_update_rate: duration_var("MARKET_DATA_DISPLAY_UPDATE_RATE", DEFAULT_DISPLAY_RATE),
    };

    let fee_percent =
        non_empty_var("FEE_PERCENT").unwrap_or_else(|| DEFAULT_FEE_PERCENT.to_string());
    let fees = FeeStrategy::parse(&fee_percent)?;

    let log = LogConfig {
        level: non_empty_var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        json: non_empty_var("LOG_JSON").is_some_and(|v| parse_bool(&v)),
    };

    Ok(AppConfig {
        prime: PrimeConfig {
            credentials,
            portfolio_id,
        },
        market_data,
        fees,
        log,
    })
}

impl AppConfig {
    pub fn fee_percent(&self) -> Decimal {
        self.fees.percent()
    }
}

/// Splits a comma-separated product list, dropping blanks.
pub fn parse_products(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Parses durations such as `500ms`, `1.5s`, `1h30m` or `250us`. A bare
/// number is taken as seconds.
///
/// Returns `None` for negative, malformed or out-of-range values.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = Decimal::from_str(raw) {
        return nanos_to_duration(seconds.checked_mul(Decimal::from(NANOS_PER_SECOND))?);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = raw;
    let mut total = Decimal::ZERO;
    while !rest.is_empty() {
        let (number, tail) = rest.split_at(rest.find(|c: char| !is_number(c)).unwrap_or(rest.len()));
        let (unit, tail) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));
        if number.is_empty() {
            return None;
        }
        let value = Decimal::from_str(number).ok()?;
        total = total.checked_add(value.checked_mul(unit_nanos(unit)?)?)?;
        rest = tail;
    }

    nanos_to_duration(total)
}

const NANOS_PER_SECOND: u64 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<Decimal> {
    let nanos: u64 = match unit {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SECOND,
        "m" => 60 * NANOS_PER_SECOND,
        "h" => 3_600 * NANOS_PER_SECOND,
        _ => return None,
    };
    Some(Decimal::from(nanos))
}

fn nanos_to_duration(nanos: Decimal) -> Option<Duration> {
    nanos.trunc().to_u64().map(Duration::from_nanos)
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn duration_var(name: &str, default: Duration) -> Duration {
    non_empty_var(name)
        .and_then(|v| parse_duration(&v))
        .unwrap_or(default)
}

fn required_var(name: &str) -> crate::Result<String> {
    non_empty_var(name).ok_or_else(|| MarkupError::Config(format!("{name} is required")))
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
