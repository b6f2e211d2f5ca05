//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `library`: base index building and overlaid song/playlist listings
//! - `scan`: metadata cache building, artist listing and export
//! - `tags`: tag inspection and delimiter configuration

mod library;
mod scan;
mod tags;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::db;

pub use library::{cmd_index, cmd_playlist_create, cmd_playlist_show, cmd_playlists, cmd_songs};
pub use scan::{cmd_artists, cmd_export, cmd_scan};
pub use tags::{cmd_delimiters, cmd_tags};

/// tagcache CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database file (overrides the configured path)
    #[arg(long, global = true, env = "TAGCACHE_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Index a music directory into the base media index
    Index {
        /// Directory to index (defaults to the last indexed directory)
        path: Option<PathBuf>,
    },
    /// Build enriched metadata for songs not yet cached
    Scan {
        /// Report progress for skipped songs too
        #[arg(long)]
        all_progress: bool,
    },
    /// List songs, enriched where cached
    Songs {
        /// Show base index values without the overlay
        #[arg(long)]
        raw: bool,
    },
    /// List playlists
    Playlists,
    /// Create or show a playlist
    Playlist {
        #[command(subcommand)]
        command: PlaylistCommand,
    },
    /// List split artists with their stable ids
    Artists,
    /// Show every recognized tag of an audio file
    Tags {
        /// Path to the audio file
        path: PathBuf,
    },
    /// Export the metadata cache as JSON
    Export {
        /// Output file
        output: PathBuf,
    },
    /// Show or change the artist delimiters
    Delimiters {
        /// Replace the configured delimiters
        #[arg(long, num_args = 1.., conflicts_with_all = ["defaults", "reset"])]
        set: Option<Vec<String>>,
        /// Use the built-in delimiter list
        #[arg(long, conflicts_with = "reset")]
        defaults: bool,
        /// Disable artist splitting
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand)]
pub enum PlaylistCommand {
    /// Create a playlist (or append to it) from song ids
    Create {
        name: String,
        /// Song ids in play order
        #[arg(required = true)]
        song_ids: Vec<i64>,
    },
    /// Show the songs of a playlist
    Show {
        name: String,
        /// Show base index values without the overlay
        #[arg(long)]
        raw: bool,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli, config: Config) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let db_path = cli.db.as_deref();

    match &cli.command {
        Commands::Index { path } => cmd_index(&rt, db_path, config, path.as_deref()),
        Commands::Scan { all_progress } => cmd_scan(&rt, db_path, &config, *all_progress),
        Commands::Songs { raw } => cmd_songs(&rt, db_path, &config, *raw),
        Commands::Playlists => cmd_playlists(&rt, db_path, &config),
        Commands::Playlist {
            command: PlaylistCommand::Create { name, song_ids },
        } => cmd_playlist_create(&rt, db_path, &config, name, song_ids),
        Commands::Playlist {
            command: PlaylistCommand::Show { name, raw },
        } => cmd_playlist_show(&rt, db_path, &config, name, *raw),
        Commands::Artists => cmd_artists(&rt, db_path, &config),
        Commands::Tags { path } => cmd_tags(path, &config),
        Commands::Export { output } => cmd_export(&rt, db_path, &config, output),
        Commands::Delimiters {
            set,
            defaults,
            reset,
        } => cmd_delimiters(config, set.as_deref(), *defaults, *reset),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the database: `--db` first, then the configured path, then the
/// default file in the working directory.
pub(crate) async fn open_pool(db_path: Option<&Path>, config: &Config) -> anyhow::Result<SqlitePool> {
    let path = db_path.or(config.library.db_path.as_deref());
    let url = db::db_url(path);
    db::init_db(&url)
        .await
        .with_context(|| format!("Failed to open database {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_db() {
        let cli = Cli::try_parse_from(["tagcache", "scan", "--db", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(cli.command, Commands::Scan { all_progress: false }));
    }

    #[test]
    fn test_cli_delimiters_set() {
        let cli = Cli::try_parse_from(["tagcache", "delimiters", "--set", ";", " feat. "]).unwrap();
        match cli.command {
            Commands::Delimiters { set, defaults, reset } => {
                assert_eq!(set, Some(vec![";".to_string(), " feat. ".to_string()]));
                assert!(!defaults && !reset);
            }
            _ => panic!("expected delimiters command"),
        }
        assert!(Cli::try_parse_from(["tagcache", "delimiters", "--set", ";", "--reset"]).is_err());
    }

    #[test]
    fn test_cli_playlist_create_requires_songs() {
        assert!(Cli::try_parse_from(["tagcache", "playlist", "create", "Mix"]).is_err());
        let cli = Cli::try_parse_from(["tagcache", "playlist", "create", "Mix", "3", "1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Playlist { command: PlaylistCommand::Create { ref song_ids, .. } } if song_ids == &[3, 1]
        ));
    }

    #[tokio::test]
    async fn test_open_pool_prefers_cli_path() {
        let dir = tempfile::tempdir().unwrap();
        let cli_path = dir.path().join("cli.db");
        let mut config = Config::default();
        config.library.db_path = Some(dir.path().join("config.db"));

        open_pool(Some(&cli_path), &config).await.unwrap();
        assert!(cli_path.exists());
        assert!(!dir.path().join("config.db").exists());
    }
}
