//! # Finsight CLI (`fin`)
//!
//! The `fin` binary drives the document-grounded financial assistant. It can
//! answer a one-shot question against a PDF report, print candlestick
//! history for a ticker, and start the HTTP API that backs the chat surface.
//!
//! ## Usage
//!
//! ```bash
//! fin --config ./config/finsight.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fin serve` | Start the HTTP JSON API |
//! | `fin ask <file> <question>` | One-shot Q&A against a PDF report |
//! | `fin market <ticker>` | Print one year of daily OHLC history |
//! | `fin tickers` | List the selectable ticker symbols |
//!
//! ## Examples
//!
//! ```bash
//! # Ask a question about a report
//! fin ask NVIDIAAn.pdf "What was total revenue?"
//!
//! # Candlestick history for NVIDIA
//! fin market NVDA
//!
//! # Start the API for the browser front-end
//! fin serve --config ./config/finsight.toml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use finsight::config;
use finsight::market;
use finsight::pipeline::Collaborators;
use finsight::session::ChatSession;

/// Finsight — a document-grounded financial assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; when the file is missing, built-in defaults apply. Hosted-service
/// credentials come from environment variables (`OPENAI_API_KEY`,
/// `GROQ_API_KEY`, `LLAMA_CLOUD_API_KEY`, `COHERE_API_KEY`).
#[derive(Parser)]
#[command(
    name = "fin",
    about = "Finsight — chat with financial reports and browse live stock charts",
    version,
    long_about = "Finsight answers natural-language questions about uploaded PDF financial \
    reports through a retrieval-augmented generation pipeline (extract, chunk, embed, retrieve, \
    rerank, generate) and, independently, fetches daily candlestick history for a fixed list of \
    stock tickers."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/finsight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP JSON API.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// document, chat, and market endpoints for browser clients.
    Serve,

    /// Ask a one-shot question about a PDF report.
    ///
    /// Builds the question-answering pipeline for the file, asks the
    /// question, and prints the answer, any detected chart table, and the
    /// supporting source chunks.
    Ask {
        /// Path to the PDF report.
        file: PathBuf,

        /// The question to ask.
        question: String,
    },

    /// Print one year of daily OHLC history for a ticker.
    ///
    /// Unknown tickers and provider failures print a placeholder message
    /// instead of failing.
    Market {
        /// Ticker symbol (e.g. `NVDA`).
        ticker: String,
    },

    /// List the selectable ticker symbols.
    Tickers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            finsight::server::run_server(&cfg).await?;
        }
        Commands::Ask { file, question } => {
            run_ask(&cfg, &file, &question).await?;
        }
        Commands::Market { ticker } => {
            run_market(&cfg, &ticker).await?;
        }
        Commands::Tickers => {
            for ticker in market::TICKERS {
                println!("{}", ticker);
            }
        }
    }

    Ok(())
}

/// One-shot Q&A: load the file into a fresh session, ask, print the turn.
async fn run_ask(cfg: &config::Config, file: &PathBuf, question: &str) -> anyhow::Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read document: {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let collaborators =
        Collaborators::from_config(cfg).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut session = ChatSession::new(cfg.clone(), collaborators);
    session.add_document(&name, bytes);

    let turn = session
        .submit_question(question)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{}", turn.content);

    if let Some(chart) = &turn.chart {
        if let Some(col) = chart.columns.first() {
            println!();
            println!("Chart data ({} by {}):", col.header, chart.key_header);
            for (key, cell) in chart.keys.iter().zip(&col.cells) {
                println!("  {:<24} {}", key, cell);
            }
        }
    }

    if !turn.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in turn.sources.iter().enumerate() {
            let snippet: String = source.text.chars().take(160).collect();
            println!("  [{}] {}", i + 1, snippet.replace('\n', " "));
        }
    }

    Ok(())
}

/// Print the snapshot title plus a date/OHLC table.
async fn run_market(cfg: &config::Config, ticker: &str) -> anyhow::Result<()> {
    let provider =
        market::create_market_provider(&cfg.market).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let snapshot = market::fetch_snapshot(provider.as_ref(), ticker, &cfg.market.range).await;

    println!("{}", snapshot.title);

    if !snapshot.has_data() {
        println!(
            "Hmm, I couldn't retrieve the data for {}. Please try another ticker.",
            snapshot.ticker
        );
        return Ok(());
    }

    println!();
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Date", "Open", "High", "Low", "Close", "Volume"
    );
    for bar in &snapshot.bars {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12}",
            bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
        );
    }

    Ok(())
}
