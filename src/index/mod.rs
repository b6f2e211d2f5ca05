//! Base media index.
//!
//! Walks a music directory, reads the basic tags of every audio file and
//! upserts them into the base tables. This is the only writer of `songs`,
//! `artists`, `albums` and `playlists`; the metadata scanner and the overlay
//! read it through [`SongSource`].
//!
//! The index keeps only what a platform media store typically reports: one
//! primary artist string and a year truncated to four digits. Splitting
//! artists and reading full dates is the metadata scanner's job.

pub mod walk;

pub use walk::{AUDIO_EXTENSIONS, audio_files, is_audio_file};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::db::{self, NewSong};
use crate::error::{Error, Result, ResultExt};
use crate::metadata;
use crate::model::{Playlist, PlaylistSong, Song};

/// Read-only access to base songs and playlists.
#[async_trait]
pub trait SongSource: Send + Sync {
    /// All songs, ordered by id.
    async fn songs(&self) -> Result<Vec<Song>>;

    async fn playlists(&self) -> Result<Vec<Playlist>>;

    async fn playlist(&self, id: i64) -> Result<Option<Playlist>>;

    async fn playlist_by_name(&self, name: &str) -> Result<Option<Playlist>>;

    /// Members of a playlist in play order. Unknown playlists are empty.
    async fn playlist_songs(&self, playlist_id: i64) -> Result<Vec<PlaylistSong>>;
}

/// [`SongSource`] over the SQLite base tables.
#[derive(Debug, Clone)]
pub struct MediaIndex {
    pool: SqlitePool,
}

impl MediaIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the playlist if needed and append songs to it.
    ///
    /// Returns the playlist id.
    pub async fn add_to_playlist(&self, name: &str, song_ids: &[i64]) -> Result<i64> {
        let id = db::get_or_create_playlist(&self.pool, name)
            .await
            .with_context(format!("creating playlist '{name}'"))?;
        db::add_playlist_songs(&self.pool, id, song_ids)
            .await
            .with_context(format!("adding songs to playlist '{name}'"))?;
        Ok(id)
    }
}

#[async_trait]
impl SongSource for MediaIndex {
    async fn songs(&self) -> Result<Vec<Song>> {
        Ok(db::get_all_songs(&self.pool).await?)
    }

    async fn playlists(&self) -> Result<Vec<Playlist>> {
        Ok(db::get_playlists(&self.pool).await?)
    }

    async fn playlist(&self, id: i64) -> Result<Option<Playlist>> {
        Ok(db::get_playlist_by_id(&self.pool, id).await?)
    }

    async fn playlist_by_name(&self, name: &str) -> Result<Option<Playlist>> {
        Ok(db::get_playlist_by_name(&self.pool, name).await?)
    }

    async fn playlist_songs(&self, playlist_id: i64) -> Result<Vec<PlaylistSong>> {
        Ok(db::get_playlist_songs(&self.pool, playlist_id).await?)
    }
}

/// Outcome of indexing one file.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    Indexed { path: PathBuf, id: i64 },
    Failed { path: PathBuf, error: String },
}

/// Index every audio file below `root`, yielding one event per file.
///
/// Files are processed ten at a time, so events arrive out of walk order.
pub fn index_directory(pool: SqlitePool, root: PathBuf) -> impl Stream<Item = IndexEvent> {
    audio_files(root)
        .map(move |path| {
            let pool = pool.clone();
            async move {
                match index_file(&pool, &path).await {
                    Ok(id) => {
                        debug!(target: "index", id, path = %path.display(), "Indexed");
                        IndexEvent::Indexed { path, id }
                    }
                    Err(e) => {
                        warn!(target: "index", path = %path.display(), error = %e, "Failed to index file");
                        IndexEvent::Failed {
                            path,
                            error: e.to_string(),
                        }
                    }
                }
            }
        })
        .buffer_unordered(10)
}

/// Read one file's base tags and upsert it. Returns the song id.
pub async fn index_file(pool: &SqlitePool, path: &Path) -> Result<i64> {
    let owned = path.to_path_buf();
    let tags = tokio::task::spawn_blocking(move || metadata::read_base_tags(&owned)).await??;

    let data = path
        .to_str()
        .ok_or_else(|| Error::metadata(path, "path is not valid UTF-8"))?
        .to_string();
    let date_modified = modified_timestamp(path).await?;

    let artist_id = db::get_or_create_artist(pool, &tags.artist).await?;
    let album_id = db::get_or_create_album(pool, &tags.album, Some(artist_id)).await?;

    let id = db::upsert_song(
        pool,
        &NewSong {
            title: tags.title,
            track_number: track_number(tags.track_number),
            year: tags.year,
            duration: tags.duration_ms as i64,
            data,
            date_modified,
            album_id,
            artist_id,
            composer: tags.composer,
            album_artist: tags.album_artist,
        },
    )
    .await
    .with_context(format!("storing {}", path.display()))?;

    Ok(id)
}

/// Track number as stored in the index; missing or out-of-range values become 0.
fn track_number(track: Option<u32>) -> i32 {
    track.and_then(|n| i32::try_from(n).ok()).unwrap_or(0)
}

async fn modified_timestamp(path: &Path) -> Result<i64> {
    let modified = tokio::fs::metadata(path).await?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_mock_song, temp_db};
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_track_number_out_of_range_is_zero() {
        assert_eq!(track_number(Some(7)), 7);
        assert_eq!(track_number(None), 0);
        assert_eq!(track_number(Some(u32::MAX)), 0);
        assert_eq!(track_number(Some(i32::MAX as u32 + 1)), 0);
    }

    #[tokio::test]
    async fn test_media_index_reads_songs() {
        let (pool, _dir) = temp_db().await;
        let a = insert_mock_song(&pool, "/music/a.flac").await;
        let b = insert_mock_song(&pool, "/music/b.flac").await;

        let index = MediaIndex::new(pool);
        let songs = index.songs().await.unwrap();
        let ids: Vec<i64> = songs.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(songs[0].artist_name, "Test Artist");
        assert_eq!(songs[0].album_name, "Test Album");
        assert_eq!(songs[0].artist_names, None);
    }

    #[tokio::test]
    async fn test_playlist_order_and_lookup() {
        let (pool, _dir) = temp_db().await;
        let a = insert_mock_song(&pool, "/music/a.flac").await;
        let b = insert_mock_song(&pool, "/music/b.flac").await;

        let index = MediaIndex::new(pool);
        let id = index.add_to_playlist("Road", &[b, a]).await.unwrap();
        // Appending again keeps the existing playlist
        assert_eq!(index.add_to_playlist("Road", &[b]).await.unwrap(), id);

        let playlist = index.playlist_by_name("Road").await.unwrap().unwrap();
        assert_eq!(playlist.id, id);
        assert_eq!(index.playlist(id).await.unwrap(), Some(playlist));

        let members = index.playlist_songs(id).await.unwrap();
        let song_ids: Vec<i64> = members.iter().map(|m| m.song.id).collect();
        assert_eq!(song_ids, vec![b, a, b]);
        assert!(members.iter().all(|m| m.playlist_id == id));
        assert_ne!(members[0].id_in_playlist, members[2].id_in_playlist);
    }

    #[tokio::test]
    async fn test_unknown_playlist_is_empty() {
        let (pool, _dir) = temp_db().await;
        let index = MediaIndex::new(pool);
        assert!(index.playlist_songs(Playlist::EMPTY_ID).await.unwrap().is_empty());
        assert!(index.playlist(42).await.unwrap().is_none());
        assert!(index.playlists().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_directory_reports_unreadable_files() {
        let (pool, _dir) = temp_db().await;
        let music = tempdir().unwrap();
        // Zero-byte files are not valid audio
        File::create(music.path().join("broken.mp3")).unwrap();
        File::create(music.path().join("readme.txt")).unwrap();

        let events: Vec<IndexEvent> = index_directory(pool.clone(), music.path().to_path_buf())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], IndexEvent::Failed { path, .. } if path.ends_with("broken.mp3")));
        assert!(db::get_all_songs(&pool).await.unwrap().is_empty());
    }
}
