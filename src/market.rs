//! Market snapshot provider.
//!
//! Independent of the chat flow: given a ticker from the fixed list, fetch
//! one year of daily OHLC history and package it as a candlestick-ready
//! [`MarketSnapshot`]. Provider failures and unknown tickers degrade to an
//! empty snapshot with a placeholder title; nothing on this path ever
//! returns an error to the caller.

use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;

use crate::config::MarketConfig;
use crate::models::{MarketSnapshot, PriceBar};

/// The fixed set of selectable tickers.
pub const TICKERS: [&str; 7] = ["NVDA", "AAPL", "GOOGL", "MSFT", "TSLA", "AMZN", "JPM"];

/// Market data error: unknown ticker or provider failure. Swallowed by
/// [`fetch_snapshot`]; only the raw [`MarketDataProvider`] surface exposes it.
#[derive(Debug)]
pub struct MarketDataError(pub String);

impl std::fmt::Display for MarketDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "market data unavailable: {}", self.0)
    }
}

impl std::error::Error for MarketDataError {}

/// Trait for daily price history providers.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Ordered (oldest first) daily bars for `ticker` over `range`
    /// (e.g. `"1y"`). An unknown ticker may yield an error or an empty
    /// series depending on the backend; both degrade the same way.
    async fn history(&self, ticker: &str, range: &str) -> Result<Vec<PriceBar>, MarketDataError>;
}

/// Strip `$`, trim, and uppercase a user-selected ticker symbol.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.replace('$', "").trim().to_uppercase()
}

/// Fetch a candlestick snapshot for a ticker. Never fails: empty history,
/// unknown tickers, and provider errors all produce an empty snapshot with
/// a placeholder title.
pub async fn fetch_snapshot(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    range: &str,
) -> MarketSnapshot {
    let ticker = normalize_ticker(ticker);

    match provider.history(&ticker, range).await {
        Ok(bars) if bars.is_empty() => MarketSnapshot {
            title: format!("No data found for {}", ticker),
            ticker,
            bars: Vec::new(),
        },
        Ok(bars) => MarketSnapshot {
            title: format!("{} Candlestick Chart (Last Year)", ticker),
            ticker,
            bars,
        },
        Err(_) => MarketSnapshot {
            title: format!("Error fetching data for {}", ticker),
            ticker,
            bars: Vec::new(),
        },
    }
}

// ============ Yahoo Finance Provider ============

const YAHOO_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Daily price history from the Yahoo Finance v8 chart endpoint.
pub struct YahooFinanceProvider {
    client: reqwest::Client,
    base_url: String,
    interval: String,
}

impl YahooFinanceProvider {
    pub fn new(config: &MarketConfig) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            // Yahoo rejects requests without a browser-ish user agent.
            .user_agent("Mozilla/5.0 (compatible; finsight/0.1)")
            .build()
            .map_err(|e| MarketDataError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: YAHOO_BASE.to_string(),
            interval: config.interval.clone(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    async fn history(&self, ticker: &str, range: &str) -> Result<Vec<PriceBar>, MarketDataError> {
        let url = format!(
            "{}/{}?range={}&interval={}",
            self.base_url, ticker, range, self.interval
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError(format!(
                "chart endpoint returned {}",
                status
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MarketDataError(e.to_string()))?;
        parse_chart_response(&json)
    }
}

/// Parse the v8 chart payload into daily bars, skipping days where any OHLC
/// field is null (halts, partial data).
fn parse_chart_response(json: &serde_json::Value) -> Result<Vec<PriceBar>, MarketDataError> {
    if let Some(err) = json
        .pointer("/chart/error")
        .filter(|v| !v.is_null())
        .and_then(|v| v.get("description"))
        .and_then(|v| v.as_str())
    {
        return Err(MarketDataError(err.to_string()));
    }

    let result = json
        .pointer("/chart/result/0")
        .ok_or_else(|| MarketDataError("missing chart result".to_string()))?;

    let timestamps = result
        .get("timestamp")
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);
    let quote = result
        .pointer("/indicators/quote/0")
        .ok_or_else(|| MarketDataError("missing quote indicators".to_string()))?;

    let (opens, highs, lows, closes, volumes) = (
        series(quote, "open"),
        series(quote, "high"),
        series(quote, "low"),
        series(quote, "close"),
        series(quote, "volume"),
    );

    let mut bars: Vec<PriceBar> = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(ts.as_i64()?, 0)?.date_naive();
            Some(PriceBar {
                date,
                open: opens.get(i)?.as_f64()?,
                high: highs.get(i)?.as_f64()?,
                low: lows.get(i)?.as_f64()?,
                close: closes.get(i)?.as_f64()?,
                volume: volumes.get(i).and_then(|v| v.as_u64()).unwrap_or(0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

fn series<'a>(quote: &'a serde_json::Value, field: &str) -> &'a [serde_json::Value] {
    quote
        .get(field)
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// Create the configured [`MarketDataProvider`].
pub fn create_market_provider(
    config: &MarketConfig,
) -> Result<Box<dyn MarketDataProvider>, MarketDataError> {
    Ok(Box::new(YahooFinanceProvider::new(config)?))
}
