//! Metadata cache commands.

use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use super::open_pool;
use crate::config::Config;
use crate::db;
use crate::index::{MediaIndex, SongSource};
use crate::metadata::LoftyTagExtractor;
use crate::model::SongMetadata;
use crate::scanner::{MetadataScanner, ProgressMode, ScanProgress};

/// Build enriched metadata for every indexed song not yet cached
pub fn cmd_scan(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    all_progress: bool,
) -> anyhow::Result<()> {
    let mode = if all_progress {
        ProgressMode::AllCandidates
    } else {
        config.metadata.progress_mode
    };

    rt.block_on(async {
        let pool = open_pool(db_path, config).await?;
        let songs = MediaIndex::new(pool.clone()).songs().await?;
        if songs.is_empty() {
            println!("No songs indexed. Run `tagcache index <dir>` first.");
            return anyhow::Ok(());
        }

        let scanner = MetadataScanner::new(pool, Arc::new(LoftyTagExtractor), &config.metadata.delimiters())?
            .with_progress_mode(mode);

        let summary = scanner
            .scan_if_not_exists(&songs, |p| println!("{}", progress_line(p)))
            .await?;

        println!(
            "Scan complete: {} scanned, {} already cached, {} without readable tags.",
            summary.scanned, summary.skipped, summary.degraded
        );
        anyhow::Ok(())
    })
}

/// List every split artist in the cache with its id
pub fn cmd_artists(rt: &Runtime, db_path: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path, config).await?;
        let records = db::get_all_metadata(&pool).await?;
        let artists = collect_artists(&records);
        if artists.is_empty() {
            println!("No artists cached. Run `tagcache scan` first.");
        }
        for (id, (name, songs)) in artists {
            println!("{:>5}  {} ({} songs)", id, name, songs);
        }
        anyhow::Ok(())
    })
}

/// Write the metadata cache to a JSON file
pub fn cmd_export(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    output: &Path,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path, config).await?;
        let records = db::get_all_metadata(&pool).await?;
        let json = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(output, json)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Exported {} records to {}", records.len(), output.display());
        anyhow::Ok(())
    })
}

/// One progress line per reported song.
fn progress_line(p: &ScanProgress<'_>) -> String {
    let marker = if p.skipped { "cached" } else { "scan" };
    format!("[{}/{}] {:<6} {}", p.index, p.total, marker, p.title)
}

/// Distinct split artists keyed by id, with the number of songs naming them.
fn collect_artists(records: &[SongMetadata]) -> BTreeMap<i64, (String, usize)> {
    let mut artists: BTreeMap<i64, (String, usize)> = BTreeMap::new();
    for record in records {
        for (name, id) in record.artist_pairs() {
            artists.entry(id).or_insert_with(|| (name, 0)).1 += 1;
        }
    }
    artists
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, ids: &str, names: &str) -> SongMetadata {
        SongMetadata {
            id,
            artist_ids: Some(ids.into()),
            artist_names: Some(names.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_progress_line() {
        let progress = ScanProgress {
            title: "Song 2",
            index: 2,
            total: 10,
            skipped: true,
        };
        assert_eq!(progress_line(&progress), "[2/10] cached Song 2");
        assert_eq!(
            progress_line(&ScanProgress { skipped: false, ..progress }),
            "[2/10] scan   Song 2"
        );
    }

    #[test]
    fn test_collect_artists_counts_songs() {
        let records = vec![
            record(1, "1,2", "Alice, Bob"),
            record(2, "1", "Alice"),
            record(3, "", ""),
            SongMetadata {
                id: 4,
                ..Default::default()
            },
        ];
        let artists = collect_artists(&records);
        assert_eq!(artists.len(), 2);
        assert_eq!(artists[&1], ("Alice".to_string(), 2));
        assert_eq!(artists[&2], ("Bob".to_string(), 1));
    }
}
