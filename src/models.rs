//! Data models for chat log records and author summaries
//!
//! This module contains the rows produced by each pipeline stage: one
//! [`MessageRecord`] per accepted log line, one [`AuthorSummary`] per qualifying
//! author and one [`AuthorCluster`] per clustered author.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::features::TextFeatures;

/// A log line split into its three fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Time the message was posted, second precision
    pub timestamp: NaiveDateTime,
    /// Author name exactly as logged
    pub author: String,
    /// Raw message text
    pub message: String,
}

/// One accepted log line with its derived features
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Time the message was posted
    pub timestamp: NaiveDateTime,
    /// Author name
    pub author: String,
    /// Raw message text
    pub message: String,
    /// Normalized and stemmed message text
    pub clean_message: String,
    /// Structural counts over the author name
    pub author_features: TextFeatures,
    /// Structural counts over the raw message
    pub message_features: TextFeatures,
    /// Seconds since this author's previous message, -1 for the first one
    pub interval: i64,
}

/// The slice of a stored message the aggregator needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Author name
    pub author: String,
    /// Normalized and stemmed message text
    pub clean_message: String,
    /// Seconds since the author's previous message, -1 for the first one
    pub interval: i64,
}

/// Style and cadence statistics for one author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    /// Author name
    pub author: String,
    /// Total messages (standardized after aggregation)
    pub num_messages: f64,
    /// Distinct clean messages (standardized after aggregation)
    pub unique_messages: f64,
    /// Distinct messages over total messages
    pub frac_unique: f64,
    /// Area under the mean-similarity percentile curve, in [0, 1]
    pub mean_area: f64,
    /// Median interval (standardized after aggregation)
    pub int_median: f64,
    /// Mean interval (standardized after aggregation)
    pub int_mean: f64,
    /// Interval standard deviation (standardized after aggregation)
    pub int_std: f64,
    /// Pearson's second skewness coefficient, NaN when undefined
    pub int_skew: f64,
}

/// Cluster assignment and 2-D projection for one author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorCluster {
    /// Author name
    pub author: String,
    /// K-means cluster label
    pub cluster: usize,
    /// First principal component coordinate
    pub pc1: f64,
    /// Second principal component coordinate
    pub pc2: f64,
}
