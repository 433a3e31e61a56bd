//! Database schema definitions
//!
//! Table and column names shared by the ingestion, aggregation and clustering
//! stages. Every SQL statement in [`crate::db`] is built from these constants so
//! the aggregator always reads exactly what the ingestor wrote.

/// Per-message table written by the ingestion pipeline
pub mod chat_log {
    /// Table name
    pub const TABLE: &str = "chat_log";
    /// Message timestamp column
    pub const MESSAGE_TIME: &str = "message_time";
    /// Author name column
    pub const AUTHOR: &str = "author";
    /// Raw message text column
    pub const MESSAGE: &str = "message";
    /// Normalized and stemmed message column
    pub const MESSAGE_CLEAN: &str = "message_clean";
    /// Author name length column
    pub const AUTHOR_LENGTH: &str = "author_length";
    /// Author characters that are not letters or space
    pub const AUTHOR_NON_ALPHA: &str = "author_non_alpha";
    /// Author characters that are not letters, digits or space
    pub const AUTHOR_NON_ALNUM: &str = "author_non_alnum";
    /// Author uppercase letter count
    pub const AUTHOR_CAPITALS: &str = "author_capitals";
    /// Author digit count
    pub const AUTHOR_NUMBERS: &str = "author_numbers";
    /// Message length column
    pub const MESSAGE_LENGTH: &str = "message_length";
    /// Message characters that are not letters or space
    pub const MESSAGE_NON_ALPHA: &str = "message_non_alpha";
    /// Message characters that are not letters, digits or space
    pub const MESSAGE_NON_ALNUM: &str = "message_non_alnum";
    /// Message digit count
    pub const MESSAGE_NUMBERS: &str = "message_numbers";
    /// Message uppercase letter count
    pub const MESSAGE_CAPITALS: &str = "message_capitals";
    /// Seconds since the author's previous message, -1 for the first one
    pub const MESSAGE_INTERVAL: &str = "message_interval";
}

/// Per-author summary table written by the aggregator
pub mod authors {
    /// Table name
    pub const TABLE: &str = "authors";
    /// Author name column
    pub const AUTHOR: &str = "author";
    /// Standardized message count
    pub const NUM_MESSAGES: &str = "num_messages";
    /// Standardized distinct message count
    pub const UNIQUE_MESSAGES: &str = "unique_messages";
    /// Fraction of distinct messages
    pub const FRAC_UNIQUE: &str = "frac_unique";
    /// Area under the similarity percentile curve
    pub const MEAN_AREA: &str = "mean_area";
    /// Standardized interval median
    pub const INT_MEDIAN: &str = "int_median";
    /// Standardized interval mean
    pub const INT_MEAN: &str = "int_mean";
    /// Standardized interval standard deviation
    pub const INT_STD: &str = "int_std";
    /// Pearson's second skewness coefficient of intervals
    pub const INT_SKEW: &str = "int_skew";
}

/// Cluster assignments written by the clustering stage
pub mod author_clusters {
    /// Table name
    pub const TABLE: &str = "author_clusters";
    /// Author name column
    pub const AUTHOR: &str = "author";
    /// Cluster label column
    pub const CLUSTER: &str = "cluster";
    /// First principal component coordinate
    pub const PC1: &str = "pc1";
    /// Second principal component coordinate
    pub const PC2: &str = "pc2";
}
