//! Metadata scanner: builds the enriched metadata cache.
//!
//! For every base song that has no cached record yet, the scanner reads the
//! file's tags, splits and resolves the artists, and writes one
//! [`SongMetadata`] row. Songs that already have a row are never touched
//! again, so a scan interrupted halfway simply resumes at the first
//! unscanned song next time.
//!
//! # Design
//!
//! - **Sequential**: songs are processed strictly in input order, one at a
//!   time, so artist ids are assigned deterministically.
//! - **Degrade, don't abort**: a file whose tags cannot be read still gets a
//!   record built from its base fields (empty year, no split artists).
//! - **Store failures abort**: a failed read or write of the cache ends the
//!   scan with an error; rows written so far stay.
//!
//! # Usage
//!
//! ```rust,ignore
//! let scanner = MetadataScanner::new(pool, Arc::new(LoftyTagExtractor), &delimiters)?;
//! let summary = scanner
//!     .scan_if_not_exists(&songs, |p| println!("[{}/{}] {}", p.index, p.total, p.title))
//!     .await?;
//! ```

pub mod artists;

pub use artists::{ArtistDelimiters, ArtistIdResolver, ArtistSplitter, DEFAULT_DELIMITERS};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{Result, ResultExt};
use crate::metadata::{TagExtractor, TagKey, TagMap};
use crate::model::{Song, SongMetadata};

/// Which songs trigger a progress callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Only songs that are actually scanned.
    #[default]
    ScannedOnly,
    /// Every candidate song, including ones skipped as already cached.
    AllCandidates,
}

/// Progress of one song within a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress<'a> {
    pub title: &'a str,
    /// 1-based position in the full input list
    pub index: usize,
    /// Length of the full input list
    pub total: usize,
    /// The song already had a cached record
    pub skipped: bool,
}

/// Outcome of one scan invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: usize,
    /// Records written
    pub scanned: usize,
    /// Songs that already had a record
    pub skipped: usize,
    /// Records written without tag data because extraction failed
    pub degraded: usize,
}

/// Builds enriched metadata records for songs not yet cached.
pub struct MetadataScanner {
    pool: SqlitePool,
    extractor: Arc<dyn TagExtractor>,
    splitter: ArtistSplitter,
    progress_mode: ProgressMode,
}

impl MetadataScanner {
    /// Create a scanner writing to `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Delimiter`] if the delimiter set cannot
    /// be compiled.
    pub fn new(
        pool: SqlitePool,
        extractor: Arc<dyn TagExtractor>,
        delimiters: &ArtistDelimiters,
    ) -> Result<Self> {
        Ok(Self {
            pool,
            extractor,
            splitter: ArtistSplitter::new(delimiters)?,
            progress_mode: ProgressMode::default(),
        })
    }

    pub fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }

    /// Scan every song in `songs` that has no cached record yet.
    ///
    /// Artist ids are seeded once from the cache before the first song, so
    /// names from earlier scans keep their ids and new names get ids above
    /// all existing ones.
    pub async fn scan_if_not_exists<F>(&self, songs: &[Song], mut on_progress: F) -> Result<ScanSummary>
    where
        F: FnMut(&ScanProgress<'_>),
    {
        let existing = db::get_all_metadata(&self.pool)
            .await
            .with_context("seeding artist ids")?;
        let mut resolver = ArtistIdResolver::seeded(&existing);
        drop(existing);

        let total = songs.len();
        let mut summary = ScanSummary {
            total,
            ..Default::default()
        };

        info!(
            target: "scanner::metadata",
            total,
            known_artists = resolver.len(),
            splitting = self.splitter.is_splitting(),
            "Starting metadata scan"
        );

        for (idx, song) in songs.iter().enumerate() {
            let progress = ScanProgress {
                title: &song.title,
                index: idx + 1,
                total,
                skipped: false,
            };

            let cached = db::get_metadata_by_id(&self.pool, song.id)
                .await
                .with_context(format!("checking cache for song {}", song.id))?;
            if cached.is_some() {
                summary.skipped += 1;
                if self.progress_mode == ProgressMode::AllCandidates {
                    on_progress(&ScanProgress {
                        skipped: true,
                        ..progress
                    });
                }
                continue;
            }

            on_progress(&progress);

            let (tags, degraded) = match self.extract(&song.data).await {
                Ok(tags) => (tags, false),
                Err(e) => {
                    warn!(target: "scanner::metadata", song_id = song.id, path = %song.data, error = %e, "Tag extraction failed, storing base fields only");
                    (TagMap::new(), true)
                }
            };

            let record = enrich(song, &tags, &self.splitter, &mut resolver);
            debug!(
                target: "scanner::metadata",
                song_id = song.id,
                year = record.year.as_deref().unwrap_or(""),
                artists = record.artist_names.as_deref().unwrap_or(""),
                "Scanned song"
            );

            let written = db::insert_metadata(&self.pool, &record)
                .await
                .with_context(format!("storing metadata for song {}", song.id))?;
            if written {
                summary.scanned += 1;
                if degraded {
                    summary.degraded += 1;
                }
            } else {
                // Another writer stored this song between the lookup and the insert
                debug!(target: "scanner::metadata", song_id = song.id, "Record already present, kept existing");
                summary.skipped += 1;
            }
        }

        info!(
            target: "scanner::metadata",
            scanned = summary.scanned,
            skipped = summary.skipped,
            degraded = summary.degraded,
            "Metadata scan complete"
        );
        Ok(summary)
    }

    /// Read tags on the blocking pool. A panicking extractor counts as a
    /// failed read.
    async fn extract(&self, data: &str) -> Result<TagMap> {
        let extractor = Arc::clone(&self.extractor);
        let path = PathBuf::from(data);
        tokio::task::spawn_blocking(move || extractor.extract(&path)).await?
    }
}

/// Build the enriched record for `song` from its extracted tags.
pub fn enrich(
    song: &Song,
    tags: &TagMap,
    splitter: &ArtistSplitter,
    resolver: &mut ArtistIdResolver,
) -> SongMetadata {
    let year = tags.first(TagKey::Date).unwrap_or_default().to_string();
    let names = splitter.split(tags.get(TagKey::Artist));
    let ids: Vec<String> = names
        .iter()
        .map(|name| resolver.resolve(name).to_string())
        .collect();
    SongMetadata::from_scan(song, year, ids.join(","), names.join(", "))
}
