//! # Finsight
//!
//! A document-grounded financial assistant. Upload a PDF financial report,
//! chat with it through a retrieval-augmented generation (RAG) pipeline built
//! from hosted services, and browse daily candlestick history for a fixed
//! set of stock tickers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────────────┐   ┌──────────┐
//! │ Document │──▶│         QaPipeline          │──▶│   Chat    │
//! │  Store   │   │ extract→chunk→embed→index   │   │ Session   │
//! └──────────┘   │ retrieve→rerank→generate    │   └────┬─────┘
//!                └─────────────────────────────┘        │
//!                     (cached per document)             ▼
//! ┌──────────┐                                    ┌──────────┐
//! │  Market  │───────────────────────────────────▶│ CLI (fin) │
//! │ Snapshot │         independent path           │ HTTP API  │
//! └──────────┘                                    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fin ask report.pdf "What was total revenue?"   # one-shot Q&A
//! fin market NVDA                                # candlestick history
//! fin serve                                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | Session-scoped document store |
//! | [`extract`] | Document text extraction providers |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory per-document vector index |
//! | [`rerank`] | Cross-encoder reranking providers |
//! | [`generate`] | Answer generation providers |
//! | [`pipeline`] | Question-answering pipeline and its cache |
//! | [`postprocess`] | Tabular-answer chart detection |
//! | [`session`] | Chat session state machine |
//! | [`market`] | Market snapshot provider |
//! | [`server`] | HTTP JSON API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod index;
pub mod market;
pub mod models;
pub mod pipeline;
pub mod postprocess;
pub mod rerank;
pub mod server;
pub mod session;
pub mod store;
