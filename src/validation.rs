use anyhow::{anyhow, Result};
use std::path::Path;

use crate::config::AppConfig;

/// Checks run on paths and tuning values before a stage starts
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a path given on the command line or in configuration
    pub fn validate_file_path(path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        if path_str.trim().is_empty() {
            return Err(anyhow!("File path cannot be empty"));
        }

        if path_str.contains('\0') {
            return Err(anyhow!("File path contains a NUL byte"));
        }

        if path_str.len() > 4096 {
            return Err(anyhow!("File path too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// The chat log must be an existing regular file
    pub fn validate_log_path(path: &Path) -> Result<()> {
        Self::validate_file_path(path)?;

        if !path.exists() {
            return Err(anyhow!("Chat log does not exist: {}", path.display()));
        }

        if !path.is_file() {
            return Err(anyhow!("Chat log is not a file: {}", path.display()));
        }

        Ok(())
    }

    /// The database path may be missing but must not name a directory
    pub fn validate_database_path(path: &Path) -> Result<()> {
        Self::validate_file_path(path)?;

        if path.is_dir() {
            return Err(anyhow!("Database path is a directory: {}", path.display()));
        }

        Ok(())
    }

    /// Validate batch size for ingestion
    pub fn validate_batch_size(batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(anyhow!("Batch size must be greater than 0"));
        }

        if batch_size > 100_000 {
            return Err(anyhow!("Batch size too large (max 100,000)"));
        }

        Ok(())
    }

    /// Validate the accepted interval range, in seconds
    pub fn validate_interval_range(min: Option<i64>, max: Option<i64>) -> Result<()> {
        if let Some(max) = max {
            if max < 0 {
                return Err(anyhow!("max_interval cannot be negative"));
            }
        }

        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(anyhow!("min_interval ({min}) cannot exceed max_interval ({max})"));
            }
        }

        Ok(())
    }

    /// Validate the per-author sample cap
    pub fn validate_message_limit(limit: Option<usize>) -> Result<()> {
        match limit {
            Some(0) => Err(anyhow!("message_limit must be greater than 0")),
            Some(limit) if limit > 50_000 => {
                // Similarity work grows with the square of the sample in the worst case
                tracing::warn!(limit, "Large message_limit may be slow");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Validate clustering parameters against the number of authors available
    pub fn validate_cluster_count(n_clusters: usize, authors: usize) -> Result<()> {
        if n_clusters == 0 {
            return Err(anyhow!("n_clusters must be greater than 0"));
        }

        if authors < n_clusters {
            return Err(anyhow!(
                "{authors} summarized authors cannot form {n_clusters} clusters"
            ));
        }

        Ok(())
    }

    /// Run every configuration-level check
    pub fn validate_config(config: &AppConfig) -> Result<()> {
        Self::validate_database_path(&config.database.path)?;
        Self::validate_file_path(&config.input.log_path)?;
        Self::validate_batch_size(config.ingest.batch_size)?;
        Self::validate_interval_range(config.aggregate.min_interval, config.aggregate.max_interval)?;
        Self::validate_message_limit(config.aggregate.message_limit)?;
        if let Some(path) = &config.cluster.csv_path {
            Self::validate_file_path(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        assert!(InputValidator::validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_interval_range() {
        assert!(InputValidator::validate_interval_range(Some(0), Some(1200)).is_ok());
        assert!(InputValidator::validate_interval_range(None, None).is_ok());
        assert!(InputValidator::validate_interval_range(Some(10), Some(5)).is_err());
        assert!(InputValidator::validate_interval_range(None, Some(-1)).is_err());
    }
}
