//! # repo-help
//!
//! Incremental indexing of repository source files and namespace-scoped
//! retrieval of the code an issue is about.
//!
//! Each repository (`owner/project`) is a namespace. Its files are
//! summarized by an LLM into chunks, each chunk is embedded, and the
//! vectors are stored under a stable docId. Re-running ingestion only
//! touches files that have no stored chunk yet; queries embed the issue
//! text and return the closest chunks of that namespace only.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │ ContentSource│──▶│ Ingestor                 │──▶│ VectorStore  │
//! │ GitHub/local │   │ summarize → embed (≤ C)  │   │ SQLite/Chroma│
//! └──────────────┘   └──────────────────────────┘   └──────┬───────┘
//!                                                         │
//!                             ┌───────────────────────────┤
//!                             ▼                           ▼
//!                       ┌──────────┐               ┌─────────────┐
//!                       │   CLI    │               │ HTTP (axum) │
//!                       └──────────┘               └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`source`] | GitHub and local-directory content sources |
//! | [`llm`] | Text generation providers |
//! | [`summarize`] | File summarizer and query expander |
//! | [`embedding`] | Embedding providers and the retrying wrapper |
//! | [`store`] | SQLite, Chroma and in-memory vector stores |
//! | [`ingest`] | Bounded-concurrency incremental ingestion |
//! | [`query`] | Namespace-scoped retrieval |
//! | [`service`] | Wiring used by the CLI and server |
//! | [`server`] | HTTP API |
//!
//! Identity, chunk and store contracts live in `repo-help-core`.

pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod query;
pub mod server;
pub mod service;
pub mod source;
pub mod store;
pub mod summarize;

pub use error::{Error, Result};
pub use ingest::{IngestReport, Ingestor};
pub use query::QueryPipeline;
pub use service::RepoHelp;
