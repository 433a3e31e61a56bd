//! Chat log style profiling
//!
//! A Rust library that turns a raw game chat log into per-author writing style
//! and posting cadence profiles, then groups authors by those profiles.
//!
//! # Stages
//!
//! - Ingest: parse the UTF-16 log, extract features, clean and stem messages,
//!   track per-author posting intervals and store one row per message
//! - Aggregate: summarize each author with TF-IDF self-similarity and interval
//!   statistics
//! - Cluster: PCA projection and K-means over the author summaries

/// Author summaries
pub mod aggregate;
/// PCA and K-means over author summaries
pub mod cluster;
/// Configuration management
pub mod config;
/// SQLite storage
pub mod db;
/// UTF-16 log decoding
pub mod decode;
/// Error types
pub mod error;
/// Character-class counts
pub mod features;
/// Log ingestion pipeline
pub mod ingest;
/// Per-author interval tracking
pub mod interval;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Message normalization and stemming
pub mod nlp;
/// Log line parsing
pub mod parser;
/// Database schema definitions
pub mod schema;
/// Descriptive statistics
pub mod stats;
/// TF-IDF vectorization
pub mod tfidf;
/// Input validation
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{ChatStyleError, Result};
pub use models::{AuthorCluster, AuthorSummary, MessageRecord};
pub use nlp::NlpProcessor;
