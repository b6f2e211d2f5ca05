//! Test utilities and fixtures for tagcache tests.
//!
//! Provides a throwaway database, base-song factories and a
//! [`MockTagExtractor`] that records every file it is asked to read.
//!
//! # Example
//!
//! ```ignore
//! use tagcache::test_utils::{temp_db, insert_mock_song};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let id = insert_mock_song(&pool, "/music/a.flac").await;
//!     // ... test logic
//! }
//! ```

use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::db::NewSong;
use crate::error::{Error, Result};
use crate::metadata::{TagExtractor, TagMap};
use crate::model::Song;

/// Creates a temporary database with all migrations applied.
///
/// Keep the returned `TempDir` alive for the duration of the test; the
/// database is deleted when it is dropped.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates a base song with sensible defaults.
///
/// ```ignore
/// let custom = Song { title: "Custom".into(), ..mock_song(3, "/music/c.flac") };
/// ```
pub fn mock_song(id: i64, path: &str) -> Song {
    Song {
        id,
        title: format!("Song {}", id),
        track_number: id as i32,
        year: Some("2023".to_string()),
        duration: 180_000,
        data: path.to_string(),
        date_modified: 1_700_000_000,
        album_id: 1,
        album_name: "Test Album".to_string(),
        artist_id: 1,
        artist_name: "Test Artist".to_string(),
        composer: None,
        album_artist: None,
        artist_ids: None,
        artist_names: None,
    }
}

/// Inserts a base song into the media index and returns its id.
pub async fn insert_mock_song(pool: &SqlitePool, path: &str) -> i64 {
    let artist_id = crate::db::get_or_create_artist(pool, "Test Artist")
        .await
        .expect("Failed to create artist");
    let album_id = crate::db::get_or_create_album(pool, "Test Album", Some(artist_id))
        .await
        .expect("Failed to create album");

    crate::db::upsert_song(
        pool,
        &NewSong {
            title: "Test Song".to_string(),
            track_number: 1,
            year: Some("2023".to_string()),
            duration: 180_000,
            data: path.to_string(),
            date_modified: 1_700_000_000,
            album_id,
            artist_id,
            composer: None,
            album_artist: None,
        },
    )
    .await
    .expect("Failed to insert song")
}

/// Tag extractor that serves canned tag maps and counts calls per path.
#[derive(Default)]
pub struct MockTagExtractor {
    tags: HashMap<PathBuf, TagMap>,
    failing: HashSet<PathBuf>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockTagExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `tags` for `path`. Unknown paths get an empty map.
    pub fn with_tags(mut self, path: impl Into<PathBuf>, tags: TagMap) -> Self {
        self.tags.insert(path.into(), tags);
        self
    }

    /// Make extraction of `path` fail.
    pub fn failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    pub fn calls_for(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.calls.lock().iter().filter(|p| p.as_path() == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

impl TagExtractor for MockTagExtractor {
    fn extract(&self, path: &Path) -> Result<TagMap> {
        self.calls.lock().push(path.to_path_buf());
        if self.failing.contains(path) {
            return Err(Error::metadata(path, "mock extraction failure"));
        }
        Ok(self.tags.get(path).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TagKey;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;
        let songs = crate::db::get_all_songs(&pool).await.unwrap();
        assert!(songs.is_empty());
    }

    #[tokio::test]
    async fn test_insert_mock_song() {
        let (pool, _dir) = temp_db().await;

        let id = insert_mock_song(&pool, "/test/song.mp3").await;
        assert!(id > 0);

        let songs = crate::db::get_all_songs(&pool).await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].data, "/test/song.mp3");
    }

    #[test]
    fn test_mock_song_defaults() {
        let song = mock_song(42, "/music/song.flac");
        assert_eq!(song.id, 42);
        assert_eq!(song.data, "/music/song.flac");
        assert_eq!(song.title, "Song 42");
    }

    #[test]
    fn test_mock_extractor_counts_calls() {
        let mock = MockTagExtractor::new()
            .with_tags("/a.flac", TagMap::new().with(TagKey::Date, ["1999"]))
            .failing("/b.flac");

        let tags = mock.extract(Path::new("/a.flac")).unwrap();
        assert_eq!(tags.first(TagKey::Date), Some("1999"));
        assert!(mock.extract(Path::new("/b.flac")).is_err());
        assert!(mock.extract(Path::new("/c.flac")).unwrap().is_empty());

        assert_eq!(mock.calls_for("/a.flac"), 1);
        assert_eq!(mock.total_calls(), 3);
    }
}
