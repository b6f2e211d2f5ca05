//! Enriched metadata cache store (`song_metadata` table).
//!
//! Rows are keyed by the base song id and written once by the metadata
//! scanner. Inserting an id that already exists is ignored rather than
//! treated as an error or an update.

use sqlx::sqlite::SqlitePool;

use crate::model::SongMetadata;

const METADATA_COLUMNS: &str = "id, title, trackNumber, year, duration, data, dateModified, \
     artistId, albumId, albumName, artistName, composer, albumArtist, artistIds, artistNames";

/// Look up the enriched record for one song.
pub async fn get_metadata_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<SongMetadata>> {
    let sql = format!("SELECT {METADATA_COLUMNS} FROM song_metadata WHERE id = ?");
    sqlx::query_as::<_, SongMetadata>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Load every enriched record, ordered by id.
pub async fn get_all_metadata(pool: &SqlitePool) -> sqlx::Result<Vec<SongMetadata>> {
    let sql = format!("SELECT {METADATA_COLUMNS} FROM song_metadata ORDER BY id");
    sqlx::query_as::<_, SongMetadata>(&sql).fetch_all(pool).await
}

/// Insert an enriched record unless one already exists for its id.
///
/// Returns `true` if a row was written.
pub async fn insert_metadata(pool: &SqlitePool, meta: &SongMetadata) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO song_metadata (
            id, title, trackNumber, year, duration, data, dateModified,
            artistId, albumId, albumName, artistName, composer, albumArtist,
            artistIds, artistNames
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(meta.id)
    .bind(&meta.title)
    .bind(meta.track_number)
    .bind(&meta.year)
    .bind(meta.duration)
    .bind(&meta.data)
    .bind(meta.date_modified)
    .bind(meta.artist_id)
    .bind(meta.album_id)
    .bind(&meta.album_name)
    .bind(&meta.artist_name)
    .bind(&meta.composer)
    .bind(&meta.album_artist)
    .bind(&meta.artist_ids)
    .bind(&meta.artist_names)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Number of cached records.
pub async fn count_metadata(pool: &SqlitePool) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM song_metadata")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
