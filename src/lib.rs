//! mnemos - memory and retrieval engine
//!
//! This crate provides:
//! - Chunkers for prose, markdown and source code
//! - Document ingestion (text, files, URLs) with batched embeddings
//! - Incremental, job-driven code indexing with semantic search
//! - Token budgeting and automatic conversation compaction
//! - A SQLite metadata store and an in-memory vector store

pub mod chunk;
pub mod commands;
pub mod config;
pub mod context;
pub mod embed;
pub mod error;
pub mod index;
pub mod ingest;
pub mod meta;
pub mod parse;
pub mod progress;
pub mod reconcile;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
