//! artlens
//!
//! Content-based artwork image retrieval.
//!
//! # Usage
//!
//! ```bash
//! artlens create-collection [--recreate]
//! artlens ingest paintings.csv [--batch-size N]
//! artlens serve [--port PORT]
//! artlens search query.jpg [--top-k K]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/artlens/config.toml)
//! 3. Environment variables (ARTLENS_*)
//! 4. CLI flags

use anyhow::Result;

use artlens_daemon::{
    create_collection, ingest, init_logging, load_settings, run_filter_catalog, search, serve,
    show_status, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let mut settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            init_logging(&settings)?;
            serve(settings).await?;
        }
        Commands::Ingest {
            csv,
            chunk_size,
            batch_size,
            classification,
        } => {
            if let Some(size) = chunk_size {
                settings.ingest.chunk_size = size;
            }
            if let Some(size) = batch_size {
                settings.ingest.sub_batch_size = size;
            }
            if let Some(classification) = classification {
                settings.ingest.classification = classification;
            }
            init_logging(&settings)?;
            if ingest(settings, &csv).await?.is_none() {
                std::process::exit(130);
            }
        }
        Commands::CreateCollection { recreate } => {
            init_logging(&settings)?;
            create_collection(&settings, recreate).await?;
        }
        Commands::Search { image, top_k } => {
            init_logging(&settings)?;
            search(&settings, &image, top_k).await?;
        }
        Commands::FilterCatalog {
            input,
            output,
            category,
        } => {
            init_logging(&settings)?;
            run_filter_catalog(&input, &output, &category)?;
        }
        Commands::Status => {
            show_status(&settings).await?;
        }
    }

    Ok(())
}
