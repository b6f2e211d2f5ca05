//! tagcache - build and browse an enriched song metadata cache.
//!
//! Index a music directory, scan it for enriched metadata, then list songs
//! and playlists with the cached metadata applied.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tagcache::{cli, config};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("tagcache=info".parse()?))
        .init();

    let config = config::load();
    cli::run_command(&args, config)
}
