mod files;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use files::FileCorpus;
use kvsearch_core::{Corpus, EngineConfig, SearchEngine, SledStore, SyntheticCorpus};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "kvsearch-indexer")]
#[command(about = "Seed and inspect a kvsearch store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the store and bulk-load articles into it
    Build {
        /// Store directory
        #[arg(long)]
        data: PathBuf,
        /// Input path (file or directory of .json / .jsonl)
        #[arg(long, conflicts_with = "synthetic", required_unless_present = "synthetic")]
        input: Option<PathBuf>,
        /// Generate this many synthetic articles instead of reading input files
        #[arg(long)]
        synthetic: Option<usize>,
        /// Seed for synthetic articles
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run one query against a seeded store
    Search {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List stored articles in id order
    Records {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { data, input, synthetic, seed, config } => {
            let config = load_config(config.as_deref())?;
            match (input, synthetic) {
                (Some(input), _) => build(&data, config, &FileCorpus::open(&input)?).await,
                (None, Some(count)) => build(&data, config, &SyntheticCorpus::with_seed(count, seed)).await,
                (None, None) => anyhow::bail!("either --input or --synthetic is required"),
            }
        }
        Commands::Search { data, query, limit, config } => {
            let engine = attach(&data, load_config(config.as_deref())?).await?;
            let found = engine.search(&query, limit).await?;
            println!("{}", serde_json::to_string_pretty(&found)?);
            Ok(())
        }
        Commands::Records { data, limit, offset } => {
            let engine = attach(&data, EngineConfig::default()).await?;
            let page = engine.all_records(limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_json_file(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

async fn build<C: Corpus>(data: &Path, config: EngineConfig, corpus: &C) -> Result<()> {
    let store = SledStore::open(data).with_context(|| format!("opening store at {}", data.display()))?;
    let mut engine = SearchEngine::new(store, config)?;
    let report = engine.initialize(corpus).await?;
    for stats in &report.fields {
        tracing::info!(
            field = %stats.field,
            terms_written = stats.terms_written,
            flushes = stats.flushes,
            truncated = stats.truncated,
            "field index built"
        );
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn attach(data: &Path, config: EngineConfig) -> Result<SearchEngine<SledStore>> {
    let store = SledStore::open(data).with_context(|| format!("opening store at {}", data.display()))?;
    let mut engine = SearchEngine::new(store, config)?;
    let meta = engine
        .attach()
        .await
        .with_context(|| format!("{} holds no completed seed; run `build` first", data.display()))?;
    tracing::info!(documents = meta.num_docs, created_at = %meta.created_at, "store attached");
    Ok(engine)
}
