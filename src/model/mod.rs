//! Core data models.
//!
//! Defines the base records read from the media index ([`Song`],
//! [`PlaylistSong`], [`Playlist`]) and the enriched record cached by the
//! metadata scanner ([`SongMetadata`]). All of them map to SQLx rows.
//!
//! # Database Schema
//!
//! - `songs`, `artists`, `albums` - base media index
//! - `playlists`, `playlist_members` - base playlists
//! - `song_metadata` - enriched records, keyed by the base song id

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A song as reported by the base media index, before enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct Song {
    /// Media index id, shared with the enriched record
    pub id: i64,
    pub title: String,
    pub track_number: i32,
    /// Year as the index reports it (often truncated or missing)
    pub year: Option<String>,
    /// Duration in milliseconds
    pub duration: i64,
    /// Absolute file path
    pub data: String,
    /// Last-modified timestamp (seconds since epoch)
    pub date_modified: i64,
    pub album_id: i64,
    pub album_name: String,
    /// Primary artist only
    pub artist_id: i64,
    pub artist_name: String,
    pub composer: Option<String>,
    pub album_artist: Option<String>,
    /// Comma-joined split artist ids; never set by the index itself
    #[sqlx(default)]
    pub artist_ids: Option<String>,
    /// `", "`-joined split artist names; never set by the index itself
    #[sqlx(default)]
    pub artist_names: Option<String>,
}

/// A song entry within a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct PlaylistSong {
    #[sqlx(flatten)]
    pub song: Song,
    pub playlist_id: i64,
    /// Row id of the membership, distinct from the song id
    pub id_in_playlist: i64,
}

/// A named playlist.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
}

impl Playlist {
    /// Id used for "no playlist" lookups.
    pub const EMPTY_ID: i64 = -1;

    /// Placeholder returned when a playlist lookup finds nothing.
    pub fn empty() -> Self {
        Self {
            id: Self::EMPTY_ID,
            name: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id == Self::EMPTY_ID
    }
}

/// Enriched, tag-derived metadata for one song.
///
/// Written once by the metadata scanner and never updated. Every column
/// other than `id` is nullable in storage: rows created before the
/// split-artist columns existed carry `None` for `artist_ids` and
/// `artist_names`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct SongMetadata {
    pub id: i64,
    pub title: Option<String>,
    pub track_number: Option<i32>,
    /// First `DATE` tag value, empty when the file had none
    pub year: Option<String>,
    pub duration: Option<i64>,
    pub data: Option<String>,
    pub date_modified: Option<i64>,
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
    pub album_name: Option<String>,
    pub artist_name: Option<String>,
    pub composer: Option<String>,
    pub album_artist: Option<String>,
    pub artist_ids: Option<String>,
    pub artist_names: Option<String>,
}

impl SongMetadata {
    /// Build a record from the base song plus the scan results.
    pub fn from_scan(song: &Song, year: String, artist_ids: String, artist_names: String) -> Self {
        Self {
            id: song.id,
            title: Some(song.title.clone()),
            track_number: Some(song.track_number),
            year: Some(year),
            duration: Some(song.duration),
            data: Some(song.data.clone()),
            date_modified: Some(song.date_modified),
            artist_id: Some(song.artist_id),
            album_id: Some(song.album_id),
            album_name: Some(song.album_name.clone()),
            artist_name: Some(song.artist_name.clone()),
            composer: song.composer.clone(),
            album_artist: song.album_artist.clone(),
            artist_ids: Some(artist_ids),
            artist_names: Some(artist_names),
        }
    }

    /// Raw `(name, id token)` pairs of the split-artist columns, trimmed.
    ///
    /// Returns nothing for rows without split-artist data, and nothing for
    /// rows whose name and id counts disagree (a name that itself contained
    /// a comma), since positional pairing would attach ids to the wrong
    /// names. Empty names are dropped.
    pub fn artist_tokens(&self) -> Vec<(&str, &str)> {
        let (Some(names), Some(ids)) = (&self.artist_names, &self.artist_ids) else {
            return Vec::new();
        };
        let names: Vec<&str> = names.split(',').map(str::trim).collect();
        let ids: Vec<&str> = ids.split(',').map(str::trim).collect();
        if names.len() != ids.len() {
            return Vec::new();
        }
        names
            .into_iter()
            .zip(ids)
            .filter(|(name, _)| !name.is_empty())
            .collect()
    }

    /// Every integer in the `artistIds` column, whether or not it pairs
    /// up with a name.
    pub fn artist_id_values(&self) -> impl Iterator<Item = i64> + '_ {
        self.artist_ids
            .as_deref()
            .into_iter()
            .flat_map(|ids| ids.split(','))
            .filter_map(|id| id.trim().parse::<i64>().ok())
    }

    /// Split-artist `(name, id)` pairs, skipping malformed ids.
    pub fn artist_pairs(&self) -> Vec<(String, i64)> {
        self.artist_tokens()
            .into_iter()
            .filter_map(|(name, id)| id.parse::<i64>().ok().map(|id| (name.to_string(), id)))
            .collect()
    }
}
