//! Database module for the media index and the metadata cache.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. Two groups of
//! tables share one pool:
//!
//! - the base media index (`songs`, `artists`, `albums`, `playlists`,
//!   `playlist_members`), written by [`crate::index`] and read through
//!   [`crate::index::SongSource`]
//! - the enriched metadata cache (`song_metadata`), see [`metadata`]
//!
//! # Example
//!
//! ```ignore
//! use tagcache::db::{init_db, get_all_songs};
//!
//! let pool = init_db("sqlite:tagcache.db").await?;
//! let songs = get_all_songs(&pool).await?;
//! ```

pub mod metadata;

pub use metadata::{count_metadata, get_all_metadata, get_metadata_by_id, insert_metadata};

use crate::model::{Playlist, PlaylistSong, Song};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "tagcache.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations. The
/// `song_metadata` migrations carry existing rows forward, so a cache
/// built by an older version survives the upgrade.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

// ============================================================================
// Media index writes
// ============================================================================

/// Get or create an artist by name.
///
/// Idempotent: calling with the same name always returns the same ID.
pub async fn get_or_create_artist(pool: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM artists WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    if let Some((id,)) = row {
        Ok(id)
    } else {
        let result = sqlx::query("INSERT INTO artists (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

/// Get or create an album by title and artist.
pub async fn get_or_create_album(
    pool: &SqlitePool,
    title: &str,
    artist_id: Option<i64>,
) -> sqlx::Result<i64> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM albums WHERE title = ? AND artist_id IS ?")
            .bind(title)
            .bind(artist_id)
            .fetch_optional(pool)
            .await?;

    if let Some((id,)) = row {
        Ok(id)
    } else {
        let result = sqlx::query("INSERT INTO albums (title, artist_id) VALUES (?, ?)")
            .bind(title)
            .bind(artist_id)
            .execute(pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

/// Base-index fields for one song row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSong {
    pub title: String,
    pub track_number: i32,
    pub year: Option<String>,
    /// Duration in milliseconds
    pub duration: i64,
    pub data: String,
    pub date_modified: i64,
    pub album_id: i64,
    pub artist_id: i64,
    pub composer: Option<String>,
    pub album_artist: Option<String>,
}

/// Insert or update a song row keyed by its file path.
///
/// Re-indexing a known path keeps its id, which is what the metadata cache
/// is keyed on.
pub async fn upsert_song(pool: &SqlitePool, song: &NewSong) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO songs (
            title, track_number, year, duration, data, date_modified,
            album_id, artist_id, composer, album_artist
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(data) DO UPDATE SET
            title = excluded.title,
            track_number = excluded.track_number,
            year = excluded.year,
            duration = excluded.duration,
            date_modified = excluded.date_modified,
            album_id = excluded.album_id,
            artist_id = excluded.artist_id,
            composer = excluded.composer,
            album_artist = excluded.album_artist
        RETURNING id
        "#,
    )
    .bind(&song.title)
    .bind(song.track_number)
    .bind(&song.year)
    .bind(song.duration)
    .bind(&song.data)
    .bind(song.date_modified)
    .bind(song.album_id)
    .bind(song.artist_id)
    .bind(&song.composer)
    .bind(&song.album_artist)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Get or create a playlist by name.
pub async fn get_or_create_playlist(pool: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    if let Some(playlist) = get_playlist_by_name(pool, name).await? {
        return Ok(playlist.id);
    }
    let result = sqlx::query("INSERT INTO playlists (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Append songs to the end of a playlist in a single transaction.
///
/// Returns the number of members added.
pub async fn add_playlist_songs(
    pool: &SqlitePool,
    playlist_id: i64,
    song_ids: &[i64],
) -> sqlx::Result<usize> {
    let mut tx = pool.begin().await?;

    let (mut next_order,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(play_order), 0) + 1 FROM playlist_members WHERE playlist_id = ?",
    )
    .bind(playlist_id)
    .fetch_one(&mut *tx)
    .await?;

    for song_id in song_ids {
        sqlx::query(
            "INSERT INTO playlist_members (playlist_id, audio_id, play_order) VALUES (?, ?, ?)",
        )
        .bind(playlist_id)
        .bind(song_id)
        .bind(next_order)
        .execute(&mut *tx)
        .await?;
        next_order += 1;
    }

    tx.commit().await?;
    Ok(song_ids.len())
}

// ============================================================================
// Media index reads
// ============================================================================

const SONG_SELECT: &str = r#"
    SELECT
        s.id, s.title, s.track_number, s.year, s.duration, s.data, s.date_modified,
        s.album_id, al.title AS album_name,
        s.artist_id, a.name AS artist_name,
        s.composer, s.album_artist
    FROM songs s
    JOIN artists a ON s.artist_id = a.id
    JOIN albums al ON s.album_id = al.id
"#;

/// Get every song in the index, ordered by id.
pub async fn get_all_songs(pool: &SqlitePool) -> sqlx::Result<Vec<Song>> {
    let sql = format!("{SONG_SELECT} ORDER BY s.id");
    sqlx::query_as::<_, Song>(&sql).fetch_all(pool).await
}

/// Get a song by its index id.
pub async fn get_song_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Song>> {
    let sql = format!("{SONG_SELECT} WHERE s.id = ?");
    sqlx::query_as::<_, Song>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Get all playlists, ordered by name.
pub async fn get_playlists(pool: &SqlitePool) -> sqlx::Result<Vec<Playlist>> {
    sqlx::query_as::<_, Playlist>("SELECT id, name FROM playlists ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_playlist_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Playlist>> {
    sqlx::query_as::<_, Playlist>("SELECT id, name FROM playlists WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_playlist_by_name(
    pool: &SqlitePool,
    name: &str,
) -> sqlx::Result<Option<Playlist>> {
    sqlx::query_as::<_, Playlist>("SELECT id, name FROM playlists WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
}

/// Get the songs of a playlist in play order.
pub async fn get_playlist_songs(
    pool: &SqlitePool,
    playlist_id: i64,
) -> sqlx::Result<Vec<PlaylistSong>> {
    sqlx::query_as::<_, PlaylistSong>(
        r#"
        SELECT
            s.id, s.title, s.track_number, s.year, s.duration, s.data, s.date_modified,
            s.album_id, al.title AS album_name,
            s.artist_id, a.name AS artist_name,
            s.composer, s.album_artist,
            pm.playlist_id, pm.id AS id_in_playlist
        FROM playlist_members pm
        JOIN songs s ON pm.audio_id = s.id
        JOIN artists a ON s.artist_id = a.id
        JOIN albums al ON s.album_id = al.id
        WHERE pm.playlist_id = ?
        ORDER BY pm.play_order
        "#,
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await
}
