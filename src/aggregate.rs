//! Per-author style and cadence summaries.
//!
//! Sampling runs sequentially from one seedable RNG; the TF-IDF similarity work
//! for each sampled author is independent and runs on the rayon pool.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AggregateConfig;
use crate::db::Database;
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::metrics::PipelineMetrics;
use crate::models::{AuthorSummary, StoredMessage};
use crate::stats;
use crate::tfidf::TfIdfVectorizer;

/// Why an author has no summary row
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateError {
    /// Too few messages survived interval filtering and sampling
    #[error("only {found} qualifying messages, {required} required")]
    TooFewMessages {
        /// Messages left after sampling
        found: usize,
        /// Configured minimum
        required: usize,
    },
    /// No sampled message contains a token
    #[error("no sampled message contains a token")]
    EmptyVocabulary,
    /// Every mean similarity is zero or undefined
    #[error("mean similarities have no positive maximum")]
    DegenerateSimilarity,
}

/// Counts for one aggregation run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Authors considered, after any author limit
    pub authors_seen: usize,
    /// Authors written to the authors table
    pub authors_summarized: usize,
    /// Authors excluded with an [`AggregateError`]
    pub authors_skipped: usize,
}

/// One author's messages after grouping and sampling
#[derive(Debug)]
struct AuthorSample<'a> {
    author: &'a str,
    all_messages: Vec<&'a str>,
    sampled: Vec<&'a str>,
    intervals: Vec<f64>,
}

/// Builds [`AuthorSummary`] rows from stored messages
#[derive(Debug)]
pub struct AuthorAggregator {
    config: AggregateConfig,
    vectorizer: TfIdfVectorizer,
    rng: StdRng,
    metrics: PipelineMetrics,
}

impl AuthorAggregator {
    /// Create an aggregator; an unset seed draws one from entropy
    pub fn new(config: AggregateConfig) -> Result<Self> {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            vectorizer: TfIdfVectorizer::new()?,
            config,
            rng,
            metrics: PipelineMetrics::default(),
        })
    }

    /// Authors summarized and skipped so far
    #[must_use]
    pub const fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Summarize every qualifying author, in first-appearance order.
    ///
    /// Authors that fail a check are dropped and logged at debug level.
    /// Summaries are not standardized; see [`standardize_summaries`].
    pub fn summarize(&mut self, messages: &[StoredMessage]) -> Vec<AuthorSummary> {
        let mut groups = group_by_author(messages);

        if let Some(limit) = self.config.author_limit {
            if limit < groups.len() {
                let mut keep = rand::seq::index::sample(&mut self.rng, groups.len(), limit).into_vec();
                keep.sort_unstable();
                let mut slots: Vec<Option<_>> = groups.into_iter().map(Some).collect();
                groups = keep.into_iter().filter_map(|idx| slots[idx].take()).collect();
            }
        }

        let samples: Vec<AuthorSample<'_>> = groups
            .into_iter()
            .map(|(author, authored)| self.sample(author, &authored))
            .collect();

        let vectorizer = &self.vectorizer;
        let min_messages = self.config.min_messages;
        let outcomes: Vec<(&str, std::result::Result<AuthorSummary, AggregateError>)> = samples
            .par_iter()
            .map(|sample| (sample.author, summarize_author(vectorizer, sample, min_messages)))
            .collect();

        let mut summaries = Vec::with_capacity(outcomes.len());
        for (author, outcome) in outcomes {
            match outcome {
                Ok(summary) => {
                    self.metrics.record_author(true);
                    summaries.push(summary);
                }
                Err(reason) => {
                    self.metrics.record_author(false);
                    debug!(author, %reason, "Excluded author");
                }
            }
        }
        summaries
    }

    fn sample<'a>(&mut self, author: &'a str, authored: &[&'a StoredMessage]) -> AuthorSample<'a> {
        let in_range: Vec<&StoredMessage> = authored
            .iter()
            .copied()
            .filter(|m| self.config.accepts_interval(m.interval))
            .collect();

        let intervals = in_range.iter().map(|m| m.interval as f64).collect();

        let mut sampled: Vec<&str> = in_range.iter().map(|m| m.clean_message.as_str()).collect();
        if self.config.randomize {
            sampled.shuffle(&mut self.rng);
        }
        if let Some(limit) = self.config.message_limit {
            sampled.truncate(limit);
        }

        AuthorSample {
            author,
            all_messages: authored.iter().map(|m| m.clean_message.as_str()).collect(),
            sampled,
            intervals,
        }
    }
}

/// Group messages by author, keeping first-appearance order of authors and
/// stream order within each author
fn group_by_author(messages: &[StoredMessage]) -> Vec<(&str, Vec<&StoredMessage>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&StoredMessage>)> = Vec::new();
    for message in messages {
        let slot = *index.entry(message.author.as_str()).or_insert_with(|| {
            groups.push((message.author.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(message);
    }
    groups
}

fn summarize_author(
    vectorizer: &TfIdfVectorizer,
    sample: &AuthorSample<'_>,
    min_messages: usize,
) -> std::result::Result<AuthorSummary, AggregateError> {
    let num_messages = sample.all_messages.len();
    let unique_messages = sample.all_messages.iter().collect::<HashSet<_>>().len();
    let frac_unique = if num_messages == 0 {
        f64::NAN
    } else {
        unique_messages as f64 / num_messages as f64
    };

    if sample.sampled.len() < min_messages {
        return Err(AggregateError::TooFewMessages {
            found: sample.sampled.len(),
            required: min_messages,
        });
    }

    let mean_area = similarity_area(vectorizer, &sample.sampled)?;

    let int_mean = stats::mean(&sample.intervals);
    let int_median = stats::median(&sample.intervals);
    let int_std = stats::std_dev(&sample.intervals);

    Ok(AuthorSummary {
        author: sample.author.to_string(),
        num_messages: num_messages as f64,
        unique_messages: unique_messages as f64,
        frac_unique,
        mean_area,
        int_median,
        int_mean,
        int_std,
        int_skew: stats::pearson_skew(int_mean, int_median, int_std),
    })
}

/// Area under the curve of mean-similarity deciles.
///
/// Mean similarities are rescaled by their maximum, the 10th..90th percentiles
/// are taken, and the curve (0,0), deciles, (1,1) is integrated over [0, 1].
/// An author whose messages are all near-duplicates scores close to 1.
fn similarity_area(
    vectorizer: &TfIdfVectorizer,
    documents: &[&str],
) -> std::result::Result<f64, AggregateError> {
    let matrix = vectorizer.fit_transform(documents)?;
    let mut means = matrix.mean_similarities();

    let max = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_nan() || max <= 0.0 {
        return Err(AggregateError::DegenerateSimilarity);
    }
    for mean in &mut means {
        *mean /= max;
    }
    means.sort_by(f64::total_cmp);

    let mut ys = Vec::with_capacity(11);
    ys.push(0.0);
    ys.extend(
        stats::linspace(10.0, 90.0, 9)
            .into_iter()
            .map(|q| stats::percentile_sorted(&means, q)),
    );
    ys.push(1.0);

    Ok(stats::find_area(&stats::linspace(0.0, 1.0, 11), &ys))
}

/// Standardize the count and interval columns across authors, in place
pub fn standardize_summaries(summaries: &mut [AuthorSummary]) {
    standardize_column(summaries, |s| &mut s.num_messages);
    standardize_column(summaries, |s| &mut s.unique_messages);
    standardize_column(summaries, |s| &mut s.int_mean);
    standardize_column(summaries, |s| &mut s.int_median);
    standardize_column(summaries, |s| &mut s.int_std);
}

fn standardize_column(summaries: &mut [AuthorSummary], field: fn(&mut AuthorSummary) -> &mut f64) {
    let mut column: Vec<f64> = summaries.iter_mut().map(|s| *field(s)).collect();
    stats::standardize(&mut column);
    for (summary, value) in summaries.iter_mut().zip(column) {
        *field(summary) = value;
    }
}

/// Summarize the stored chat log and replace the authors table
pub fn aggregate_authors(db: &mut Database, config: &AggregateConfig) -> Result<AggregateReport> {
    let timer = OperationTimer::new("aggregate");

    let messages = db.load_messages()?;
    let mut aggregator = AuthorAggregator::new(config.clone())?;
    let mut summaries = aggregator.summarize(&messages);
    standardize_summaries(&mut summaries);
    db.replace_authors(&summaries)?;

    let metrics = aggregator.metrics();
    let report = AggregateReport {
        authors_seen: (metrics.authors_summarized + metrics.authors_skipped) as usize,
        authors_summarized: metrics.authors_summarized as usize,
        authors_skipped: metrics.authors_skipped as usize,
    };
    if report.authors_seen > 0 && report.authors_summarized == 0 {
        warn!(authors = report.authors_seen, "No author qualified for a summary");
    }
    info!(
        summarized = report.authors_summarized,
        skipped = report.authors_skipped,
        "Aggregation complete"
    );

    timer.finish();
    Ok(report)
}
