//! TokenLab Core: resumable downloads of token price history and metadata.
//!
//! This crate contains the download machinery:
//! - Entity and cursor identifiers
//! - Paginated fetch client with rate-limit backoff
//! - Atomic cursor checkpoints and append-only CSV sinks
//! - Resumable per-token OHLC download loop
//! - Batched token metadata loop with sink-based dedup

pub mod config;
pub mod data;
pub mod domain;
