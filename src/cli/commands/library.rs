//! Base index building and overlaid listings.

use anyhow::Context;
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;

use super::open_pool;
use crate::config::{self, Config};
use crate::index::{self, IndexEvent, MediaIndex, SongSource};
use crate::model::Song;
use crate::overlay::{MetadataOverlay, PlaylistRepository, SongRepository, display_artists};

/// Index a music directory into the base tables
pub fn cmd_index(
    rt: &Runtime,
    db_path: Option<&Path>,
    mut config: Config,
    path: Option<&Path>,
) -> anyhow::Result<()> {
    let root = path
        .map(Path::to_path_buf)
        .or_else(|| config.library.last_index_path.clone())
        .context("No directory given and none indexed before")?;

    rt.block_on(async {
        let pool = open_pool(db_path, &config).await?;
        println!("Indexing directory: {}", root.display());

        let stream = index::index_directory(pool, root.clone());
        let mut stream = std::pin::pin!(stream);
        let mut indexed = 0;
        let mut failed = 0;

        while let Some(event) = stream.next().await {
            match event {
                IndexEvent::Indexed { .. } => {
                    indexed += 1;
                    if indexed % 100 == 0 {
                        print!("\rIndexed {} files...", indexed);
                        std::io::stdout().flush()?;
                    }
                }
                IndexEvent::Failed { path, error } => {
                    failed += 1;
                    eprintln!("\nError indexing {}: {}", path.display(), error);
                }
            }
        }
        info!(target: "index", indexed, failed, "Index complete");
        println!("\nIndex complete: {} indexed, {} failed.", indexed, failed);
        anyhow::Ok(())
    })?;

    if config.library.last_index_path.as_deref() != Some(root.as_path()) {
        config.library.last_index_path = Some(root);
        config::save(&config)?;
    }
    Ok(())
}

/// List all songs, enriched unless `raw`
pub fn cmd_songs(rt: &Runtime, db_path: Option<&Path>, config: &Config, raw: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path, config).await?;
        let prefer = config.metadata.prefer_enriched_metadata && !raw;
        let repo = SongRepository::new(
            Arc::new(MediaIndex::new(pool.clone())),
            Arc::new(MetadataOverlay::new(pool)),
            prefer,
        );
        for song in repo.songs().await? {
            println!("{}", format_song(&song, prefer));
        }
        anyhow::Ok(())
    })
}

/// List all playlists
pub fn cmd_playlists(rt: &Runtime, db_path: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path, config).await?;
        let playlists = MediaIndex::new(pool).playlists().await?;
        if playlists.is_empty() {
            println!("No playlists.");
        }
        for playlist in playlists {
            println!("{:>5}  {}", playlist.id, playlist.name);
        }
        anyhow::Ok(())
    })
}

/// Create a playlist, or append to an existing one
pub fn cmd_playlist_create(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    name: &str,
    song_ids: &[i64],
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path, config).await?;
        let index = MediaIndex::new(pool);
        let id = index.add_to_playlist(name, song_ids).await?;
        println!("Added {} songs to playlist '{}' (id {}).", song_ids.len(), name, id);
        anyhow::Ok(())
    })
}

/// Show the members of a playlist
pub fn cmd_playlist_show(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    name: &str,
    raw: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path, config).await?;
        let enrich = config.metadata.enrich_playlist_songs && !raw;
        let repo = PlaylistRepository::new(
            Arc::new(MediaIndex::new(pool.clone())),
            Arc::new(MetadataOverlay::new(pool)),
            enrich,
        );

        let playlist = repo.playlist_by_name(name).await?;
        if playlist.is_empty() {
            anyhow::bail!("Playlist '{}' not found", name);
        }
        println!("{} ({})", playlist.name, playlist.id);
        for member in repo.playlist_songs(playlist.id).await? {
            println!("{}", format_song(&member.song, enrich));
        }
        anyhow::Ok(())
    })
}

/// One listing line: id, artists, title, year and album.
pub(crate) fn format_song(song: &Song, prefer: bool) -> String {
    let artists = display_artists(song, prefer);
    let artists = if artists.is_empty() {
        song.artist_name.clone()
    } else {
        artists.join(" / ")
    };
    match song.year.as_deref().filter(|y| !y.is_empty()) {
        Some(year) => format!(
            "{:>5}  {} - {} ({}) [{}]",
            song.id, artists, song.title, year, song.album_name
        ),
        None => format!("{:>5}  {} - {} [{}]", song.id, artists, song.title, song.album_name),
    }
}
