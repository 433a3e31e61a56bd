use std::path::{Path, PathBuf};

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage location
    pub database: DatabaseConfig,
    /// Log file to read
    pub input: InputConfig,
    /// Ingestion tuning
    pub ingest: IngestConfig,
    /// Author sampling and summary settings
    pub aggregate: AggregateConfig,
    /// PCA and K-means settings
    pub cluster: ClusterConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

/// Database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding every table
    pub path: PathBuf,
}

/// Chat log input settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// UTF-16 chat log to ingest
    pub log_path: PathBuf,
    /// Whether the first line is a header to discard
    pub has_header: bool,
}

/// Ingestion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records buffered before each write to storage
    pub batch_size: usize,
}

/// Author aggregation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Summarize a random subset of this many authors
    pub author_limit: Option<usize>,
    /// Cap on sampled messages per author
    pub message_limit: Option<usize>,
    /// Smallest interval a sampled message may have; `Some(0)` drops first messages
    pub min_interval: Option<i64>,
    /// Largest interval a sampled message may have, in seconds
    pub max_interval: Option<i64>,
    /// Shuffle each author's messages before capping
    pub randomize: bool,
    /// Authors with fewer sampled messages are excluded
    pub min_messages: usize,
    /// Seed for author and message sampling; entropy when unset
    pub seed: Option<u64>,
}

/// Clustering settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Number of K-means clusters
    pub n_clusters: usize,
    /// Independent K-means restarts; the lowest inertia wins
    pub n_init: usize,
    /// Lloyd iteration cap per restart
    pub max_iterations: usize,
    /// Seed for K-means initialization; entropy when unset
    pub seed: Option<u64>,
    /// Optional CSV export of author, cluster, pc1, pc2
    pub csv_path: Option<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level; `RUST_LOG` takes precedence
    pub level: String,
    /// Daily-rolling log file, in addition to stderr
    pub file_path: Option<PathBuf>,
    /// Log file format, `json` or `text`
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: PathBuf::from("data/chatlog.sqlite"),
            },
            input: InputConfig {
                log_path: PathBuf::from("data/chat.log"),
                has_header: true,
            },
            ingest: IngestConfig::default(),
            aggregate: AggregateConfig::default(),
            cluster: ClusterConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            author_limit: None,
            message_limit: Some(5000),
            min_interval: Some(0),
            max_interval: Some(1200),
            randomize: true,
            min_messages: 10,
            seed: None,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            n_init: 20,
            max_iterations: 300,
            seed: None,
            csv_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| anyhow::anyhow!("Failed to serialize default configuration: {e}"))?;

        let mut builder = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("chatlog-style").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix, e.g. CHATSTYLE_AGGREGATE__SEED=7
            .add_source(
                Environment::with_prefix("CHATSTYLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {e}"))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("database.path must not be empty"));
        }

        if self.ingest.batch_size == 0 {
            return Err(anyhow::anyhow!("batch_size must be greater than 0"));
        }

        self.aggregate.validate()?;

        if self.cluster.n_clusters == 0 {
            return Err(anyhow::anyhow!("n_clusters must be greater than 0"));
        }
        if self.cluster.n_init == 0 {
            return Err(anyhow::anyhow!("n_init must be greater than 0"));
        }
        if self.cluster.max_iterations == 0 {
            return Err(anyhow::anyhow!("max_iterations must be greater than 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Get log level from environment or config
    #[must_use]
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}

impl AggregateConfig {
    /// Validate sampling parameters
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_interval, self.max_interval) {
            if min > max {
                return Err(anyhow::anyhow!(
                    "min_interval ({min}) must not exceed max_interval ({max})"
                ));
            }
        }
        if self.message_limit == Some(0) {
            return Err(anyhow::anyhow!("message_limit must be greater than 0"));
        }
        if self.author_limit == Some(0) {
            return Err(anyhow::anyhow!("author_limit must be greater than 0"));
        }
        Ok(())
    }

    /// Whether an interval falls inside the configured range
    #[must_use]
    pub fn accepts_interval(&self, interval: i64) -> bool {
        !matches!(self.min_interval, Some(min) if interval < min)
            && !matches!(self.max_interval, Some(max) if interval > max)
    }
}
