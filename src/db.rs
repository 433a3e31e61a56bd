use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

use crate::error::{ChatStyleError, Result};
use crate::features::TextFeatures;
use crate::ingest::RecordSink;
use crate::models::{AuthorCluster, AuthorSummary, MessageRecord, StoredMessage};
use crate::schema::{author_clusters, authors, chat_log};

/// SQLite store holding the chat log, author summary and cluster tables
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened database");
        Ok(Self { conn })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Start replacing the chat log table.
    ///
    /// The old table is dropped inside the same transaction the new rows are
    /// written in, so nothing changes on disk until [`RecordSink::finish`].
    pub fn chat_log_writer(&mut self) -> Result<ChatLogWriter<'_>> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                {} TIMESTAMP NOT NULL,
                {} TEXT NOT NULL,
                {} TEXT NOT NULL,
                {} TEXT NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL,
                {} INTEGER NOT NULL
             );",
            chat_log::MESSAGE_TIME,
            chat_log::AUTHOR,
            chat_log::MESSAGE,
            chat_log::MESSAGE_CLEAN,
            chat_log::AUTHOR_LENGTH,
            chat_log::AUTHOR_NON_ALPHA,
            chat_log::AUTHOR_NON_ALNUM,
            chat_log::AUTHOR_CAPITALS,
            chat_log::AUTHOR_NUMBERS,
            chat_log::MESSAGE_LENGTH,
            chat_log::MESSAGE_NON_ALPHA,
            chat_log::MESSAGE_NON_ALNUM,
            chat_log::MESSAGE_NUMBERS,
            chat_log::MESSAGE_CAPITALS,
            chat_log::MESSAGE_INTERVAL,
            table = chat_log::TABLE,
        ))?;

        Ok(ChatLogWriter {
            tx: Some(tx),
            written: 0,
        })
    }

    /// Number of rows in the chat log table
    pub fn count_chat_log(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", chat_log::TABLE),
            [],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| ChatStyleError::MalformedRow(format!("negative count {count}")))
    }

    /// Load every chat log row in insertion order
    pub fn load_chat_log(&self) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {} FROM {} ORDER BY rowid",
            chat_log::MESSAGE_TIME,
            chat_log::AUTHOR,
            chat_log::MESSAGE,
            chat_log::MESSAGE_CLEAN,
            chat_log::AUTHOR_LENGTH,
            chat_log::AUTHOR_NON_ALPHA,
            chat_log::AUTHOR_NON_ALNUM,
            chat_log::AUTHOR_CAPITALS,
            chat_log::AUTHOR_NUMBERS,
            chat_log::MESSAGE_LENGTH,
            chat_log::MESSAGE_NON_ALPHA,
            chat_log::MESSAGE_NON_ALNUM,
            chat_log::MESSAGE_NUMBERS,
            chat_log::MESSAGE_CAPITALS,
            chat_log::MESSAGE_INTERVAL,
            chat_log::TABLE,
        ))?;

        let rows = stmt.query_map([], |row| {
            let count = |idx: usize| -> rusqlite::Result<usize> {
                let value: i64 = row.get(idx)?;
                usize::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
            };
            Ok(MessageRecord {
                timestamp: row.get(0)?,
                author: row.get(1)?,
                message: row.get(2)?,
                clean_message: row.get(3)?,
                author_features: TextFeatures {
                    length: count(4)?,
                    non_alpha: count(5)?,
                    non_alnum: count(6)?,
                    capitals: count(7)?,
                    numbers: count(8)?,
                },
                message_features: TextFeatures {
                    length: count(9)?,
                    non_alpha: count(10)?,
                    non_alnum: count(11)?,
                    numbers: count(12)?,
                    capitals: count(13)?,
                },
                interval: row.get(14)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Load the author, clean text and interval of every message in insertion order
    pub fn load_messages(&self) -> Result<Vec<StoredMessage>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, {}, {} FROM {} ORDER BY rowid",
            chat_log::AUTHOR,
            chat_log::MESSAGE_CLEAN,
            chat_log::MESSAGE_INTERVAL,
            chat_log::TABLE
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredMessage {
                author: row.get(0)?,
                clean_message: row.get(1)?,
                interval: row.get(2)?,
            })
        })?;

        let messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = messages.len(), "Loaded chat log messages");
        Ok(messages)
    }

    /// Replace the author summary table with `summaries`
    pub fn replace_authors(&mut self, summaries: &[AuthorSummary]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                {} TEXT NOT NULL,
                {} REAL,
                {} REAL,
                {} REAL,
                {} REAL,
                {} REAL,
                {} REAL,
                {} REAL,
                {} REAL
             );",
            authors::AUTHOR,
            authors::NUM_MESSAGES,
            authors::UNIQUE_MESSAGES,
            authors::FRAC_UNIQUE,
            authors::MEAN_AREA,
            authors::INT_MEDIAN,
            authors::INT_MEAN,
            authors::INT_STD,
            authors::INT_SKEW,
            table = authors::TABLE,
        ))?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                authors::TABLE,
                authors::AUTHOR,
                authors::NUM_MESSAGES,
                authors::UNIQUE_MESSAGES,
                authors::FRAC_UNIQUE,
                authors::MEAN_AREA,
                authors::INT_MEDIAN,
                authors::INT_MEAN,
                authors::INT_STD,
                authors::INT_SKEW
            ))?;

            for summary in summaries {
                stmt.execute(params![
                    summary.author,
                    finite(summary.num_messages),
                    finite(summary.unique_messages),
                    finite(summary.frac_unique),
                    finite(summary.mean_area),
                    finite(summary.int_median),
                    finite(summary.int_mean),
                    finite(summary.int_std),
                    finite(summary.int_skew),
                ])?;
            }
        }

        tx.commit()?;
        info!(rows = summaries.len(), table = authors::TABLE, "Replaced author summaries");
        Ok(())
    }

    /// Load the author summary table in insertion order; NULL reads back as NaN
    pub fn load_authors(&self) -> Result<Vec<AuthorSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {}, {} FROM {} ORDER BY rowid",
            authors::AUTHOR,
            authors::NUM_MESSAGES,
            authors::UNIQUE_MESSAGES,
            authors::FRAC_UNIQUE,
            authors::MEAN_AREA,
            authors::INT_MEDIAN,
            authors::INT_MEAN,
            authors::INT_STD,
            authors::INT_SKEW,
            authors::TABLE
        ))?;

        let rows = stmt.query_map([], |row| {
            let real = |idx: usize| -> rusqlite::Result<f64> {
                Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
            };
            Ok(AuthorSummary {
                author: row.get(0)?,
                num_messages: real(1)?,
                unique_messages: real(2)?,
                frac_unique: real(3)?,
                mean_area: real(4)?,
                int_median: real(5)?,
                int_mean: real(6)?,
                int_std: real(7)?,
                int_skew: real(8)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Replace the cluster assignment table with `clusters`
    pub fn replace_clusters(&mut self, clusters: &[AuthorCluster]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} ({} TEXT NOT NULL, {} INTEGER NOT NULL, {} REAL, {} REAL);",
            author_clusters::AUTHOR,
            author_clusters::CLUSTER,
            author_clusters::PC1,
            author_clusters::PC2,
            table = author_clusters::TABLE,
        ))?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}, {}) VALUES (?, ?, ?, ?)",
                author_clusters::TABLE,
                author_clusters::AUTHOR,
                author_clusters::CLUSTER,
                author_clusters::PC1,
                author_clusters::PC2
            ))?;

            for cluster in clusters {
                stmt.execute(params![
                    cluster.author,
                    cluster.cluster as i64,
                    finite(cluster.pc1),
                    finite(cluster.pc2),
                ])?;
            }
        }

        tx.commit()?;
        info!(rows = clusters.len(), table = author_clusters::TABLE, "Replaced author clusters");
        Ok(())
    }

    /// Load the cluster assignment table in insertion order
    pub fn load_clusters(&self) -> Result<Vec<AuthorCluster>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, {}, {}, {} FROM {} ORDER BY rowid",
            author_clusters::AUTHOR,
            author_clusters::CLUSTER,
            author_clusters::PC1,
            author_clusters::PC2,
            author_clusters::TABLE
        ))?;

        let rows = stmt.query_map([], |row| {
            let cluster: i64 = row.get(1)?;
            Ok(AuthorCluster {
                author: row.get(0)?,
                cluster: usize::try_from(cluster).unwrap_or_default(),
                pc1: row.get::<_, Option<f64>>(2)?.unwrap_or(f64::NAN),
                pc2: row.get::<_, Option<f64>>(3)?.unwrap_or(f64::NAN),
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

/// NaN and infinities are stored as SQL NULL
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Transactional writer for the chat log table
pub struct ChatLogWriter<'conn> {
    tx: Option<Transaction<'conn>>,
    written: usize,
}

impl ChatLogWriter<'_> {
    /// Rows written so far, committed or not
    #[cfg(test)]
    const fn written(&self) -> usize {
        self.written
    }
}

impl RecordSink for ChatLogWriter<'_> {
    fn write_batch(&mut self, records: &[MessageRecord]) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ChatStyleError::Other("chat log writer already finished".to_string()))?;

        let mut stmt = tx.prepare_cached(&format!(
            "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            chat_log::TABLE,
            chat_log::MESSAGE_TIME,
            chat_log::AUTHOR,
            chat_log::MESSAGE,
            chat_log::MESSAGE_CLEAN,
            chat_log::AUTHOR_LENGTH,
            chat_log::AUTHOR_NON_ALPHA,
            chat_log::AUTHOR_NON_ALNUM,
            chat_log::AUTHOR_CAPITALS,
            chat_log::AUTHOR_NUMBERS,
            chat_log::MESSAGE_LENGTH,
            chat_log::MESSAGE_NON_ALPHA,
            chat_log::MESSAGE_NON_ALNUM,
            chat_log::MESSAGE_NUMBERS,
            chat_log::MESSAGE_CAPITALS,
            chat_log::MESSAGE_INTERVAL
        ))?;

        for record in records {
            let author = &record.author_features;
            let message = &record.message_features;
            stmt.execute(params![
                record.timestamp,
                record.author,
                record.message,
                record.clean_message,
                author.length as i64,
                author.non_alpha as i64,
                author.non_alnum as i64,
                author.capitals as i64,
                author.numbers as i64,
                message.length as i64,
                message.non_alpha as i64,
                message.non_alnum as i64,
                message.numbers as i64,
                message.capitals as i64,
                record.interval,
            ])?;
        }

        self.written += records.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit()?;
            info!(rows = self.written, table = chat_log::TABLE, "Committed chat log");
        }
        Ok(())
    }
}
