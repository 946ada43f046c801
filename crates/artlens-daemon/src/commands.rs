//! Command implementations for the artlens CLI.
//!
//! Handles:
//! - serve: Load model and store, start the HTTP API
//! - ingest: Stream a catalog CSV into the vector store
//! - create-collection, search, filter-catalog, status

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use artlens_catalog::{filter_catalog, CatalogReader, FetcherConfig, ImageSource, MetCatalogClient};
use artlens_embeddings::{CandleEmbedder, ImageEmbedder, ModelCache};
use artlens_indexing::{
    BatchEmbeddingPipeline, IngestConfig, IngestStats, Ingestor, LoggingProgressCallback,
};
use artlens_service::{run_server_with_shutdown, AppState, SearchService};
use artlens_types::config::expand_home;
use artlens_types::{SearchHit, Settings};
use artlens_vector::{LocalVectorStore, StoreStats, VectorStore};

/// Sub-batches between progress log lines during ingest.
const PROGRESS_EVERY: usize = 10;

/// Load settings from all sources, then apply the global CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let subscriber = fmt().with_env_filter(filter).with_target(true).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_store(settings: &Settings) -> Result<Arc<LocalVectorStore>> {
    let store = LocalVectorStore::from_settings(settings).with_context(|| {
        format!(
            "Failed to open vector store at {:?}",
            settings.expanded_index_path()
        )
    })?;
    Ok(Arc::new(store))
}

fn model_cache(settings: &Settings) -> ModelCache {
    let defaults = ModelCache::default();
    let cache_dir = settings
        .model
        .cache_dir
        .as_deref()
        .map(expand_home)
        .unwrap_or(defaults.cache_dir);
    ModelCache::new(
        cache_dir,
        settings.model.repo_id.clone(),
        settings.model.weights_file.clone(),
    )
}

/// Load the embedding model, downloading weights on first use.
async fn load_embedder(settings: &Settings) -> Result<Arc<dyn ImageEmbedder>> {
    let cache = model_cache(settings);
    info!(repo = %cache.repo_id, cache_dir = ?cache.cache_dir, "Loading embedding model");

    let embedder = tokio::task::spawn_blocking(move || CandleEmbedder::load(&cache))
        .await
        .context("Model loading task failed")?
        .context("Failed to load embedding model")?;

    let dim = embedder.info().dimension;
    if dim != settings.dimension {
        bail!(
            "Model produces {}-dimensional vectors but the store is configured for {}",
            dim,
            settings.dimension
        );
    }
    Ok(Arc::new(embedder))
}

fn open_fetcher(settings: &Settings) -> Result<Arc<MetCatalogClient>> {
    let client = MetCatalogClient::new(FetcherConfig::from(&settings.catalog))
        .context("Failed to build catalog client")?;
    Ok(Arc::new(client))
}

/// Serve the search API until SIGINT or SIGTERM.
pub async fn serve(settings: Settings) -> Result<()> {
    info!("Starting artlens server...");
    info!("  Index: {:?}", settings.expanded_index_path());
    info!("  Payloads: {:?}", settings.expanded_payload_db_path());
    info!("  HTTP: {}", settings.http_addr());

    let store = open_store(&settings)?;
    let embedder = load_embedder(&settings).await?;
    let images: Arc<dyn ImageSource> = open_fetcher(&settings)?;

    let addr: SocketAddr = settings
        .http_addr()
        .parse()
        .with_context(|| format!("Invalid address: {}", settings.http_addr()))?;

    let search = Arc::new(SearchService::new(embedder, store));
    let state = AppState::new(
        search,
        images,
        settings.server.clone(),
        settings.search.clone(),
    );

    run_server_with_shutdown(addr, state, shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Ingest a catalog CSV.
///
/// Setup failures abort before the first row is read. On Ctrl+C the run
/// stops after dropping the in-flight batch and the store is flushed.
pub async fn ingest(settings: Settings, csv: &str) -> Result<Option<IngestStats>> {
    let store = open_store(&settings)?;
    let embedder = load_embedder(&settings).await?;
    let fetcher = open_fetcher(&settings)?;

    let classification = match settings.ingest.classification.trim() {
        "" => None,
        c => Some(c.to_string()),
    };
    let mut reader = CatalogReader::open(csv, classification)
        .with_context(|| format!("Failed to open catalog {csv}"))?;

    let pipeline = BatchEmbeddingPipeline::new(fetcher, embedder);
    let mut ingestor = Ingestor::new(
        pipeline,
        store.clone(),
        IngestConfig::from(&settings.ingest),
    );
    let progress = LoggingProgressCallback::new(PROGRESS_EVERY);

    let outcome = tokio::select! {
        result = ingestor.run(&mut reader, &progress) => Some(result),
        _ = signal::ctrl_c() => None,
    };
    drop(ingestor);

    match outcome {
        Some(result) => {
            let stats = result.context("Ingestion failed")?;
            print_ingest_summary(&stats);
            Ok(Some(stats))
        }
        None => {
            warn!("Ingestion interrupted, flushing store");
            store
                .flush()
                .await
                .context("Failed to flush store after interrupt")?;
            Ok(None)
        }
    }
}

fn print_ingest_summary(stats: &IngestStats) {
    println!("Ingestion complete");
    println!("  Rows read:          {}", stats.rows_read);
    println!("  Rows invalid:       {}", stats.rows_invalid);
    println!("  Rows filtered:      {}", stats.rows_filtered);
    println!("  Batches:            {}", stats.batches);
    println!("  Batches failed:     {}", stats.batches_failed);
    println!("  Images missing:     {}", stats.images_missing);
    println!("  Images undecodable: {}", stats.images_undecodable);
    println!("  Records upserted:   {}", stats.records_upserted);
    println!("  Elapsed:            {} ms", stats.elapsed_ms);
}

/// Initialise an empty collection.
pub async fn create_collection(settings: &Settings, recreate: bool) -> Result<()> {
    let store = open_store(settings)?;
    store
        .create_collection(recreate)
        .await
        .context("Failed to create collection (use --recreate to overwrite)")?;
    println!(
        "Collection ready at {:?} ({} dimensions)",
        settings.expanded_index_path(),
        store.dimension()
    );
    Ok(())
}

/// Search with a local image file and print the hits as JSON.
pub async fn search(settings: &Settings, image: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k
        .unwrap_or(settings.search.default_top_k)
        .min(settings.search.max_top_k);
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {image}"))?;

    let store = open_store(settings)?;
    let embedder = load_embedder(settings).await?;
    let service = SearchService::new(embedder, store);

    let hits = service
        .search(Bytes::from(bytes), top_k)
        .await
        .context("Search failed")?;

    println!("{}", format_hits(&hits)?);
    Ok(())
}

fn format_hits(hits: &[SearchHit]) -> Result<String> {
    serde_json::to_string_pretty(hits).context("Failed to serialize results")
}

/// Write the rows of `input` matching `category` to `output`.
pub fn run_filter_catalog(input: &str, output: &str, category: &str) -> Result<usize> {
    if !Path::new(input).exists() {
        bail!("Catalog file not found: {}", input);
    }
    let written = filter_catalog(input, output, category)
        .with_context(|| format!("Failed to filter {input}"))?;
    info!(written, category, "Filtered catalog");
    println!("Wrote {} rows to {}", written, output);
    Ok(written)
}

/// Collect store statistics.
pub async fn collection_stats(settings: &Settings) -> Result<StoreStats> {
    let store = open_store(settings)?;
    store.stats().await.context("Failed to read store stats")
}

/// Print store statistics.
pub async fn show_status(settings: &Settings) -> Result<()> {
    let stats = collection_stats(settings).await?;
    println!("artlens collection");
    println!("  Index:     {:?}", stats.index_path);
    println!("  Vectors:   {}", stats.vector_count);
    println!("  Payloads:  {}", stats.payload_count);
    println!("  Dimension: {}", stats.dimension);
    println!("  Size:      {} bytes", stats.size_bytes);
    Ok(())
}
