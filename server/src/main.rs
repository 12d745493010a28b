use anyhow::{Context, Result};
use clap::Parser;
use kvsearch_core::{EngineConfig, SearchEngine, SledConfig, SledStore, SyntheticCorpus};
use kvsearch_server::{build_app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "kvsearch-server", about = "HTTP search over a sled-backed kvsearch store")]
struct Args {
    /// Store directory; a temporary store is used when omitted
    #[arg(long)]
    data: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Number of synthetic articles to seed
    #[arg(long, default_value_t = 10_000)]
    documents: usize,
    /// Seed for synthetic articles
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serve the already-seeded store at --data instead of re-seeding it
    #[arg(long, default_value_t = false, requires = "data")]
    attach: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(p) => EngineConfig::from_json_file(p).with_context(|| format!("loading config {}", p.display()))?,
        None => EngineConfig::default(),
    };
    let sled_config = match &args.data {
        Some(path) => SledConfig { path: path.clone(), ..SledConfig::default() },
        None => SledConfig { temporary: true, ..SledConfig::default() },
    };
    let store = SledStore::with_config(&sled_config).context("opening sled store")?;
    let mut engine = SearchEngine::new(store, config)?;

    if args.attach {
        let meta = engine.attach().await.context("store holds no completed seed")?;
        tracing::info!(documents = meta.num_docs, "serving existing data");
    } else {
        tracing::info!(documents = args.documents, seed = args.seed, "initializing");
        let report = engine
            .initialize(&SyntheticCorpus::with_seed(args.documents, args.seed))
            .await
            .context("initialization failed")?;
        tracing::info!(documents = report.documents, attempts = report.attempts, "initialized");
    }

    let app = build_app(AppState::new(engine, "sled"));
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
    }
    tracing::info!("shutting down");
}
