//! # repo-help core
//!
//! Runtime-agnostic logic for repo-help: data models, chunk identity,
//! the structured summary codec, the vector store contract and the
//! embedding trait.
//!
//! This crate contains no tokio, sqlx, HTTP clients or filesystem I/O.
//! Concrete adapters and the ingestion/query pipelines live in the
//! `repo-help` app crate.

pub mod embedding;
pub mod identity;
pub mod models;
pub mod store;
pub mod summary;
