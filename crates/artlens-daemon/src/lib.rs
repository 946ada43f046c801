//! artlens CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (serve, ingest, search, ...)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    collection_stats, create_collection, ingest, init_logging, load_settings,
    run_filter_catalog, search, serve, show_status,
};
