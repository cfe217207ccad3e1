//! Regulation ingestion
//!
//! Embeds every YAML/JSON knowledge file in a directory and upserts the
//! clauses into the configured index. With the in-memory backend this is a
//! dry run that only checks the files parse and embed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use site_inspector_config::{load_settings, IndexBackend, Settings};
use site_inspector_rag::{
    build_embedder, InMemoryIndex, KnowledgeLoader, SimilarityIndex, VectorStore,
    VectorStoreConfig,
};

#[derive(Parser, Debug)]
#[command(name = "ingest-knowledge", version, about = "Load regulation clauses into the index")]
struct Args {
    /// Directory with knowledge files; defaults to `rag.knowledge_dir`
    dir: Option<PathBuf>,

    /// Configuration overlay loaded after config/default.*
    #[arg(long, env = "SITE_INSPECTOR_ENV")]
    env: Option<String>,

    /// Drop and recreate the Qdrant collection first
    #[arg(long)]
    recreate: bool,

    /// Write a sample knowledge file to this path and exit
    #[arg(long, value_name = "PATH")]
    sample: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = load_settings(args.env.as_deref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("site_inspector={}", settings.observability.log_level).into()
            }),
        )
        .init();

    if let Some(path) = args.sample {
        KnowledgeLoader::create_sample_file(&path)?;
        return Ok(());
    }

    let dir = args
        .dir
        .unwrap_or_else(|| PathBuf::from(&settings.rag.knowledge_dir));
    anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());

    let embedder = build_embedder(&settings)?;

    let index: Arc<dyn SimilarityIndex> = match settings.rag.backend {
        IndexBackend::Qdrant => {
            let store = VectorStore::new(VectorStoreConfig::from_settings(
                &settings,
                embedder.dimension(),
            ))
            .await
            .context("failed to connect to Qdrant")?;
            if args.recreate {
                store.drop_collection().await?;
            }
            store.ensure_collection().await?;
            Arc::new(store)
        },
        IndexBackend::Memory => {
            tracing::info!("In-memory backend configured; nothing is persisted");
            Arc::new(InMemoryIndex::new(embedder.dimension()))
        },
    };

    let loaded = KnowledgeLoader::load_directory(&dir, index.as_ref(), embedder.as_ref()).await?;
    let total = index.count().await?;

    tracing::info!(
        dir = %dir.display(),
        index = index.name(),
        loaded,
        total,
        "Knowledge ingestion finished"
    );
    println!("Loaded {} clauses; index now holds {}", loaded, total);
    Ok(())
}
