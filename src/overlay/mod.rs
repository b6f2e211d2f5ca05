//! Metadata overlay: enriched records layered over base songs at read time.
//!
//! The base index stays the source of truth for which songs and playlists
//! exist. When a feature flag is on and a song has a cached
//! [`SongMetadata`] record, every non-null field of that record replaces
//! the base value; null fields keep the base value. Identity fields (`id`,
//! `playlist_id`, `id_in_playlist`) always come from the base.
//!
//! ```rust,ignore
//! let overlay = Arc::new(MetadataOverlay::new(pool.clone()));
//! let songs = SongRepository::new(source, overlay, true).songs().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::db;
use crate::error::{Result, ResultExt};
use crate::index::SongSource;
use crate::model::{Playlist, PlaylistSong, Song, SongMetadata};

/// Overlay `enriched` onto `base`.
///
/// With `prefer` off, or without a record, `base` is returned unchanged.
pub fn merge_song(base: Song, enriched: Option<&SongMetadata>, prefer: bool) -> Song {
    let Some(meta) = enriched.filter(|_| prefer) else {
        return base;
    };

    Song {
        id: base.id,
        title: meta.title.clone().unwrap_or(base.title),
        track_number: meta.track_number.unwrap_or(base.track_number),
        year: meta.year.clone().or(base.year),
        duration: meta.duration.unwrap_or(base.duration),
        data: meta.data.clone().unwrap_or(base.data),
        date_modified: meta.date_modified.unwrap_or(base.date_modified),
        album_id: meta.album_id.unwrap_or(base.album_id),
        album_name: meta.album_name.clone().unwrap_or(base.album_name),
        artist_id: meta.artist_id.unwrap_or(base.artist_id),
        artist_name: meta.artist_name.clone().unwrap_or(base.artist_name),
        composer: meta.composer.clone().or(base.composer),
        album_artist: meta.album_artist.clone().or(base.album_artist),
        artist_ids: meta.artist_ids.clone().or(base.artist_ids),
        artist_names: meta.artist_names.clone().or(base.artist_names),
    }
}

/// [`merge_song`] for a playlist member, keeping its playlist identity.
pub fn merge_playlist_song(
    base: PlaylistSong,
    enriched: Option<&SongMetadata>,
    prefer: bool,
) -> PlaylistSong {
    PlaylistSong {
        song: merge_song(base.song, enriched, prefer),
        playlist_id: base.playlist_id,
        id_in_playlist: base.id_in_playlist,
    }
}

/// Artist names to show for a song.
///
/// With `prefer` on, the split artist names (empty when the song has none).
/// Otherwise the album artist and primary artist, trimmed, blank and
/// duplicate entries dropped.
pub fn display_artists(song: &Song, prefer: bool) -> Vec<String> {
    if prefer {
        return song
            .artist_names
            .as_deref()
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
    }

    let mut artists: Vec<String> = Vec::new();
    for name in [song.album_artist.as_deref(), Some(song.artist_name.as_str())]
        .into_iter()
        .flatten()
        .map(str::trim)
    {
        if !name.is_empty() && !artists.iter().any(|a| a == name) {
            artists.push(name.to_string());
        }
    }
    artists
}

/// Lazily loaded, read-only view of the metadata cache.
///
/// All records are loaded on the first lookup and kept for the lifetime of
/// the overlay. Records written afterwards are not seen; build a new
/// overlay after a scan.
pub struct MetadataOverlay {
    pool: sqlx::SqlitePool,
    records: OnceCell<HashMap<i64, SongMetadata>>,
}

impl MetadataOverlay {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            pool,
            records: OnceCell::new(),
        }
    }

    async fn records(&self) -> Result<&HashMap<i64, SongMetadata>> {
        self.records.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<HashMap<i64, SongMetadata>> {
        let all = db::get_all_metadata(&self.pool)
            .await
            .with_context("loading metadata overlay")?;
        debug!(target: "overlay", records = all.len(), "Loaded metadata cache");
        Ok(all.into_iter().map(|m| (m.id, m)).collect())
    }

    /// Cached record for one song, if it has been scanned.
    pub async fn get(&self, id: i64) -> Result<Option<&SongMetadata>> {
        Ok(self.records().await?.get(&id))
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.records().await?.len())
    }

    /// Overlay a batch of songs.
    pub async fn apply(&self, songs: Vec<Song>, prefer: bool) -> Result<Vec<Song>> {
        if !prefer {
            return Ok(songs);
        }
        let records = self.records().await?;
        Ok(songs
            .into_iter()
            .map(|s| {
                let meta = records.get(&s.id);
                merge_song(s, meta, true)
            })
            .collect())
    }

    /// Overlay a batch of playlist members.
    pub async fn apply_playlist(
        &self,
        members: Vec<PlaylistSong>,
        prefer: bool,
    ) -> Result<Vec<PlaylistSong>> {
        if !prefer {
            return Ok(members);
        }
        let records = self.records().await?;
        Ok(members
            .into_iter()
            .map(|m| {
                let meta = records.get(&m.song.id);
                merge_playlist_song(m, meta, true)
            })
            .collect())
    }
}

/// Library songs with the overlay applied.
pub struct SongRepository {
    source: Arc<dyn SongSource>,
    overlay: Arc<MetadataOverlay>,
    prefer_enriched: bool,
}

impl SongRepository {
    pub fn new(source: Arc<dyn SongSource>, overlay: Arc<MetadataOverlay>, prefer_enriched: bool) -> Self {
        Self {
            source,
            overlay,
            prefer_enriched,
        }
    }

    /// All base songs, enriched where cached.
    pub async fn songs(&self) -> Result<Vec<Song>> {
        let songs = self.source.songs().await?;
        info!(target: "overlay", count = songs.len(), prefer = self.prefer_enriched, "Resolving songs");
        self.overlay.apply(songs, self.prefer_enriched).await
    }
}

/// Playlists and their members with the overlay applied.
pub struct PlaylistRepository {
    source: Arc<dyn SongSource>,
    overlay: Arc<MetadataOverlay>,
    enrich_members: bool,
}

impl PlaylistRepository {
    pub fn new(source: Arc<dyn SongSource>, overlay: Arc<MetadataOverlay>, enrich_members: bool) -> Self {
        Self {
            source,
            overlay,
            enrich_members,
        }
    }

    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        self.source.playlists().await
    }

    /// The playlist with `id`, or [`Playlist::empty`] if there is none.
    pub async fn playlist(&self, id: i64) -> Result<Playlist> {
        Ok(self.source.playlist(id).await?.unwrap_or_else(Playlist::empty))
    }

    pub async fn playlist_by_name(&self, name: &str) -> Result<Playlist> {
        Ok(self
            .source
            .playlist_by_name(name)
            .await?
            .unwrap_or_else(Playlist::empty))
    }

    /// Members of a playlist in play order, enriched where cached.
    pub async fn playlist_songs(&self, playlist_id: i64) -> Result<Vec<PlaylistSong>> {
        if playlist_id == Playlist::EMPTY_ID {
            return Ok(Vec::new());
        }
        let members = self.source.playlist_songs(playlist_id).await?;
        self.overlay.apply_playlist(members, self.enrich_members).await
    }

    /// Blocking form of [`playlist_songs`](Self::playlist_songs) for callers
    /// outside the runtime.
    ///
    /// Panics if called from within an async context, like
    /// [`Handle::block_on`].
    pub fn playlist_songs_blocking(&self, handle: &Handle, playlist_id: i64) -> Result<Vec<PlaylistSong>> {
        handle.block_on(self.playlist_songs(playlist_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MediaIndex;
    use crate::test_utils::{insert_mock_song, mock_song, temp_db};

    fn enriched(id: i64) -> SongMetadata {
        SongMetadata {
            id,
            year: Some("1999-04-01".into()),
            artist_ids: Some("1,2".into()),
            artist_names: Some("Alice, Bob".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_overrides_non_null_fields() {
        let base = mock_song(5, "/music/5.flac");
        let meta = SongMetadata {
            title: Some("Enriched".into()),
            composer: Some("Carol".into()),
            ..enriched(5)
        };

        let merged = merge_song(base.clone(), Some(&meta), true);
        assert_eq!(merged.id, 5);
        assert_eq!(merged.title, "Enriched");
        assert_eq!(merged.year.as_deref(), Some("1999-04-01"));
        assert_eq!(merged.composer.as_deref(), Some("Carol"));
        assert_eq!(merged.artist_names.as_deref(), Some("Alice, Bob"));
        // Null fields fall back to the base
        assert_eq!(merged.album_name, base.album_name);
        assert_eq!(merged.track_number, base.track_number);
        assert_eq!(merged.data, base.data);
    }

    #[test]
    fn test_merge_flag_off_or_missing_record() {
        let base = mock_song(5, "/music/5.flac");
        assert_eq!(merge_song(base.clone(), Some(&enriched(5)), false), base);
        assert_eq!(merge_song(base.clone(), None, true), base);
    }

    #[test]
    fn test_merge_empty_year_overrides_base() {
        let base = mock_song(5, "/music/5.flac");
        let meta = SongMetadata {
            year: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(merge_song(base, Some(&meta), true).year.as_deref(), Some(""));
    }

    #[test]
    fn test_merge_playlist_song_keeps_identity() {
        let base = PlaylistSong {
            song: mock_song(5, "/music/5.flac"),
            playlist_id: 3,
            id_in_playlist: 77,
        };
        let meta = SongMetadata { id: 999, ..enriched(5) };

        let merged = merge_playlist_song(base, Some(&meta), true);
        assert_eq!(merged.song.id, 5);
        assert_eq!(merged.playlist_id, 3);
        assert_eq!(merged.id_in_playlist, 77);
        assert_eq!(merged.song.year.as_deref(), Some("1999-04-01"));
    }

    #[test]
    fn test_display_artists() {
        let mut song = mock_song(1, "/music/1.flac");
        song.album_artist = Some(" Test Artist ".into());
        assert_eq!(display_artists(&song, false), vec!["Test Artist"]);
        assert!(display_artists(&song, true).is_empty());

        song.album_artist = Some("Various".into());
        song.artist_names = Some("Alice, Bob".into());
        assert_eq!(display_artists(&song, false), vec!["Various", "Test Artist"]);
        assert_eq!(display_artists(&song, true), vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_song_repository_overlays_cached_songs() {
        let (pool, _dir) = temp_db().await;
        let a = insert_mock_song(&pool, "/music/a.flac").await;
        let b = insert_mock_song(&pool, "/music/b.flac").await;
        db::insert_metadata(&pool, &enriched(a)).await.unwrap();

        let source: Arc<dyn SongSource> = Arc::new(MediaIndex::new(pool.clone()));
        let overlay = Arc::new(MetadataOverlay::new(pool));

        let songs = SongRepository::new(source.clone(), overlay.clone(), true)
            .songs()
            .await
            .unwrap();
        assert_eq!(songs[0].id, a);
        assert_eq!(songs[0].year.as_deref(), Some("1999-04-01"));
        assert_eq!(songs[1].id, b);
        assert_eq!(songs[1].year.as_deref(), Some("2023"));
        assert_eq!(songs[1].artist_names, None);

        let plain = SongRepository::new(source, overlay, false).songs().await.unwrap();
        assert_eq!(plain[0].year.as_deref(), Some("2023"));
    }

    #[tokio::test]
    async fn test_overlay_loads_once() {
        let (pool, _dir) = temp_db().await;
        db::insert_metadata(&pool, &enriched(1)).await.unwrap();

        let overlay = MetadataOverlay::new(pool.clone());
        assert!(overlay.get(1).await.unwrap().is_some());

        db::insert_metadata(&pool, &enriched(2)).await.unwrap();
        assert!(overlay.get(2).await.unwrap().is_none());
        assert_eq!(overlay.len().await.unwrap(), 1);

        assert!(MetadataOverlay::new(pool).get(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_playlist_repository() {
        let (pool, _dir) = temp_db().await;
        let a = insert_mock_song(&pool, "/music/a.flac").await;
        let b = insert_mock_song(&pool, "/music/b.flac").await;
        db::insert_metadata(&pool, &enriched(b)).await.unwrap();

        let index = MediaIndex::new(pool.clone());
        let id = index.add_to_playlist("Mix", &[b, a]).await.unwrap();

        let source: Arc<dyn SongSource> = Arc::new(index);
        let overlay = Arc::new(MetadataOverlay::new(pool));
        let repo = PlaylistRepository::new(source.clone(), overlay.clone(), true);

        assert_eq!(repo.playlist(id).await.unwrap().name, "Mix");
        assert!(repo.playlist(id + 100).await.unwrap().is_empty());
        assert!(repo.playlist_by_name("Nope").await.unwrap().is_empty());
        assert!(repo.playlist_songs(Playlist::EMPTY_ID).await.unwrap().is_empty());

        let members = repo.playlist_songs(id).await.unwrap();
        assert_eq!(members[0].song.id, b);
        assert_eq!(members[0].song.artist_names.as_deref(), Some("Alice, Bob"));
        assert_eq!(members[1].song.artist_names, None);

        let plain = PlaylistRepository::new(source, overlay, false)
            .playlist_songs(id)
            .await
            .unwrap();
        assert_eq!(plain[0].song.artist_names, None);
    }

    #[test]
    fn test_playlist_songs_blocking() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (pool, _dir) = rt.block_on(temp_db());
        let id = rt.block_on(async {
            let a = insert_mock_song(&pool, "/music/a.flac").await;
            db::insert_metadata(&pool, &enriched(a)).await.unwrap();
            MediaIndex::new(pool.clone()).add_to_playlist("Mix", &[a]).await.unwrap()
        });

        let repo = PlaylistRepository::new(
            Arc::new(MediaIndex::new(pool.clone())),
            Arc::new(MetadataOverlay::new(pool)),
            true,
        );
        let members = repo.playlist_songs_blocking(rt.handle(), id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].song.year.as_deref(), Some("1999-04-01"));
    }
}
