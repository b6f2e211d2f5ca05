//! Command-line interface for tagcache.
//!
//! Provides commands for indexing a music directory, building the enriched
//! metadata cache and listing songs and playlists with the overlay applied.

mod commands;

pub use commands::{Cli, Commands, PlaylistCommand, run_command};
