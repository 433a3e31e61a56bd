use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use chatlog_style::aggregate::{aggregate_authors, AggregateReport};
use chatlog_style::cluster::{run_clustering, ClusterReport};
use chatlog_style::config::AppConfig;
use chatlog_style::ingest::{ingest_log_file, IngestReport};
use chatlog_style::logging::{init_logging, OperationTimer};
use chatlog_style::metrics::PipelineMetrics;
use chatlog_style::validation::InputValidator;
use chatlog_style::Database;

#[derive(Parser)]
#[command(author, version, about = "Profile chat log authors by writing style and posting cadence", long_about = None)]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct DatabaseArgs {
    /// SQLite database holding every table
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct IngestArgs {
    /// UTF-16 chat log to ingest
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Treat the first line as data instead of a header
    #[arg(long)]
    no_header: bool,

    /// Records written per batch
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Args, Debug, Default)]
struct AggregateArgs {
    /// Seed for author and message sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Summarize a random subset of this many authors
    #[arg(long)]
    author_limit: Option<usize>,
}

#[derive(Args, Debug, Default)]
struct ClusterArgs {
    /// Number of clusters
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Seed for K-means initialization
    #[arg(long)]
    cluster_seed: Option<u64>,

    /// Also export assignments to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a chat log into the chat_log table
    Ingest {
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        ingest: IngestArgs,
    },
    /// Summarize authors from the chat_log table into the authors table
    Aggregate {
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        aggregate: AggregateArgs,
    },
    /// Cluster the authors table into the author_clusters table
    Cluster {
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        cluster: ClusterArgs,
    },
    /// Ingest, aggregate and cluster in one go
    Run {
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        ingest: IngestArgs,
        #[command(flatten)]
        aggregate: AggregateArgs,
        #[command(flatten)]
        cluster: ClusterArgs,
    },
}

#[derive(Serialize)]
struct RunReport {
    ingest: IngestReport,
    aggregate: AggregateReport,
    cluster: ClusterReport,
}

impl DatabaseArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.database {
            config.database.path.clone_from(path);
        }
    }
}

impl IngestArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.input {
            config.input.log_path.clone_from(path);
        }
        if self.no_header {
            config.input.has_header = false;
        }
        if let Some(batch_size) = self.batch_size {
            config.ingest.batch_size = batch_size;
        }
    }
}

impl AggregateArgs {
    fn apply(&self, config: &mut AppConfig) {
        if self.seed.is_some() {
            config.aggregate.seed = self.seed;
        }
        if self.author_limit.is_some() {
            config.aggregate.author_limit = self.author_limit;
        }
    }
}

impl ClusterArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(clusters) = self.clusters {
            config.cluster.n_clusters = clusters;
        }
        if self.cluster_seed.is_some() {
            config.cluster.seed = self.cluster_seed;
        }
        if self.csv.is_some() {
            config.cluster.csv_path.clone_from(&self.csv);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration, then let command-line flags override it
    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    match &cli.command {
        Commands::Ingest { db, ingest } => {
            db.apply(&mut config);
            ingest.apply(&mut config);
        }
        Commands::Aggregate { db, aggregate } => {
            db.apply(&mut config);
            aggregate.apply(&mut config);
        }
        Commands::Cluster { db, cluster } => {
            db.apply(&mut config);
            cluster.apply(&mut config);
        }
        Commands::Run {
            db,
            ingest,
            aggregate,
            cluster,
        } => {
            db.apply(&mut config);
            ingest.apply(&mut config);
            aggregate.apply(&mut config);
            cluster.apply(&mut config);
        }
    }
    config.validate().context("Invalid configuration")?;
    InputValidator::validate_config(&config).context("Invalid configuration")?;

    // Initialize logging; the guard flushes the file layer on exit
    let _guard = init_logging(
        Some(config.get_log_level().as_str()),
        config.logging.file_path.as_deref(),
        config.logging.format == "json",
    )?;
    if let Err(e) = PipelineMetrics::init() {
        warn!("Metrics recorder unavailable: {e}");
    }

    info!("Starting chatlog-style");
    let timer = OperationTimer::new("total");

    let mut db = Database::open(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;

    match cli.command {
        Commands::Ingest { .. } => print_report(&ingest(&mut db, &config)?)?,
        Commands::Aggregate { .. } => print_report(&aggregate(&mut db, &config)?)?,
        Commands::Cluster { .. } => print_report(&cluster(&mut db, &config)?)?,
        Commands::Run { .. } => {
            let report = RunReport {
                ingest: ingest(&mut db, &config)?,
                aggregate: aggregate(&mut db, &config)?,
                cluster: cluster(&mut db, &config)?,
            };
            print_report(&report)?;
        }
    }

    timer.finish();
    Ok(())
}

fn ingest(db: &mut Database, config: &AppConfig) -> Result<IngestReport> {
    InputValidator::validate_log_path(&config.input.log_path)?;
    let report = ingest_log_file(db, &config.input, &config.ingest)
        .with_context(|| format!("Failed to ingest {}", config.input.log_path.display()))?;
    Ok(report)
}

fn aggregate(db: &mut Database, config: &AppConfig) -> Result<AggregateReport> {
    let rows = db
        .count_chat_log()
        .context("No chat log in the database; run ingest first")?;
    info!(rows, "Aggregating chat log");
    Ok(aggregate_authors(db, &config.aggregate)?)
}

fn cluster(db: &mut Database, config: &AppConfig) -> Result<ClusterReport> {
    let authors = db.load_authors().context("Failed to load author summaries")?;
    InputValidator::validate_cluster_count(config.cluster.n_clusters, authors.len())?;
    Ok(run_clustering(db, &config.cluster)?)
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, report)?;
    writeln!(stdout)?;
    Ok(())
}
