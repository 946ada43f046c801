//! CLI argument parsing for artlens.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// artlens
///
/// Find artworks that look like a given image.
#[derive(Parser, Debug)]
#[command(name = "artlens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/artlens/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the search HTTP API
    Serve {
        /// Override bind host
        #[arg(long)]
        host: Option<String>,

        /// Override HTTP port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch, embed and index every artwork in a catalog CSV
    Ingest {
        /// Catalog CSV file
        csv: String,

        /// Rows read per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Rows embedded per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Only ingest rows whose classification contains this text ("" for all)
        #[arg(long)]
        classification: Option<String>,
    },

    /// Create an empty collection
    CreateCollection {
        /// Wipe any existing vectors and payloads first
        #[arg(long)]
        recreate: bool,
    },

    /// Search the collection with a local image file
    Search {
        /// Query image
        image: String,

        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Write the rows of a catalog CSV matching one classification to a new file
    FilterCatalog {
        /// Full catalog export
        input: String,

        /// Destination CSV
        output: String,

        /// Classification to keep
        #[arg(long, default_value = "Paintings")]
        category: String,
    },

    /// Show collection statistics
    Status,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_serve_port() {
        let cli = Cli::parse_from(["artlens", "serve", "--port", "9000"]);
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_ingest_overrides() {
        let cli = Cli::parse_from([
            "artlens",
            "ingest",
            "paintings.csv",
            "--batch-size",
            "64",
            "--classification",
            "",
        ]);
        match cli.command {
            Commands::Ingest {
                csv,
                chunk_size,
                batch_size,
                classification,
            } => {
                assert_eq!(csv, "paintings.csv");
                assert!(chunk_size.is_none());
                assert_eq!(batch_size, Some(64));
                assert_eq!(classification.as_deref(), Some(""));
            }
            _ => panic!("Expected Ingest command"),
        }
    }

    #[test]
    fn test_cli_create_collection() {
        let cli = Cli::parse_from(["artlens", "create-collection", "--recreate"]);
        assert!(matches!(
            cli.command,
            Commands::CreateCollection { recreate: true }
        ));
    }

    #[test]
    fn test_cli_search_top_k() {
        let cli = Cli::parse_from(["artlens", "search", "query.jpg", "-k", "3"]);
        match cli.command {
            Commands::Search { image, top_k } => {
                assert_eq!(image, "query.jpg");
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_filter_catalog_default_category() {
        let cli = Cli::parse_from(["artlens", "filter-catalog", "MetObjects.csv", "paintings.csv"]);
        match cli.command {
            Commands::FilterCatalog {
                input,
                output,
                category,
            } => {
                assert_eq!(input, "MetObjects.csv");
                assert_eq!(output, "paintings.csv");
                assert_eq!(category, "Paintings");
            }
            _ => panic!("Expected FilterCatalog command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["artlens", "status", "--config", "a.toml", "-l", "debug"]);
        assert_eq!(cli.config.as_deref(), Some("a.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Status));
    }
}
