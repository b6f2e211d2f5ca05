//! Audio file tag reading.
//!
//! Uses the lofty crate for format-independent tag access. Two readers
//! live here:
//!
//! - [`read_base_tags`]: the handful of fields the media index stores
//!   (title, primary artist, album, year, track number, duration).
//! - [`TagExtractor`]: the richer, multi-valued view the metadata scanner
//!   needs (every `ARTIST` value, the full `DATE` string, ...), returned as
//!   a typed [`TagMap`].

use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Tag properties the scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKey {
    Artist,
    Date,
    Title,
    Album,
    AlbumArtist,
    Composer,
    TrackNumber,
    Genre,
}

impl TagKey {
    pub const ALL: [TagKey; 8] = [
        TagKey::Title,
        TagKey::Artist,
        TagKey::Album,
        TagKey::AlbumArtist,
        TagKey::Composer,
        TagKey::Date,
        TagKey::TrackNumber,
        TagKey::Genre,
    ];

    /// Property-map style name (`ARTIST`, `DATE`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            TagKey::Artist => "ARTIST",
            TagKey::Date => "DATE",
            TagKey::Title => "TITLE",
            TagKey::Album => "ALBUM",
            TagKey::AlbumArtist => "ALBUMARTIST",
            TagKey::Composer => "COMPOSER",
            TagKey::TrackNumber => "TRACKNUMBER",
            TagKey::Genre => "GENRE",
        }
    }

    /// Lofty item keys to try, in order. The first key with values wins.
    fn item_keys(self) -> Vec<ItemKey> {
        match self {
            TagKey::Artist => vec![ItemKey::TrackArtist],
            TagKey::Date => vec![ItemKey::RecordingDate, ItemKey::Year],
            TagKey::Title => vec![ItemKey::TrackTitle],
            TagKey::Album => vec![ItemKey::AlbumTitle],
            TagKey::AlbumArtist => vec![ItemKey::AlbumArtist],
            TagKey::Composer => vec![ItemKey::Composer],
            TagKey::TrackNumber => vec![ItemKey::TrackNumber],
            TagKey::Genre => vec![ItemKey::Genre],
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values of a single tag key. Nearly always exactly one.
pub type TagValues = SmallVec<[String; 1]>;

/// Multi-valued tag properties of one file.
///
/// A key is either absent or maps to at least one value; inserting an
/// empty value list is a no-op, so `get` never returns an empty slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: BTreeMap<TagKey, TagValues>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the values for `key`, replacing any previous ones.
    pub fn insert<I, S>(&mut self, key: TagKey, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: TagValues = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, values);
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<I, S>(mut self, key: TagKey, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(key, values);
        self
    }

    /// All values for `key`, or `None` when the file has no such tag.
    pub fn get(&self, key: TagKey) -> Option<&[String]> {
        self.entries.get(&key).map(|v| v.as_slice())
    }

    pub fn first(&self, key: TagKey) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn contains(&self, key: TagKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagKey, &[String])> {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

/// Source of multi-valued tag data for the metadata scanner.
///
/// Implementations do blocking file I/O; the scanner calls them from the
/// blocking thread pool.
pub trait TagExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<TagMap>;
}

/// [`TagExtractor`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagExtractor;

impl TagExtractor for LoftyTagExtractor {
    fn extract(&self, path: &Path) -> Result<TagMap> {
        let tagged_file = probe(path)?;
        let Some(tag) = primary_or_first(&tagged_file) else {
            return Ok(TagMap::new());
        };
        Ok(tag_map(tag))
    }
}

fn probe(path: &Path) -> Result<TaggedFile> {
    Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read tags: {e}")))
}

fn primary_or_first(tagged_file: &TaggedFile) -> Option<&Tag> {
    tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
}

fn tag_map(tag: &Tag) -> TagMap {
    let mut map = TagMap::new();
    for key in TagKey::ALL {
        for item_key in key.item_keys() {
            let values: Vec<&str> = tag
                .get_strings(&item_key)
                .filter(|v| !v.trim().is_empty())
                .collect();
            if !values.is_empty() {
                map.insert(key, values);
                break;
            }
        }
    }
    map
}

/// Fields the media index keeps for every file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: Option<String>,
    pub composer: Option<String>,
    /// Year only, the way a media index usually truncates dates
    pub year: Option<String>,
    pub track_number: Option<u32>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

pub const UNKNOWN_ARTIST: &str = "<unknown>";
pub const UNKNOWN_ALBUM: &str = "<unknown>";

/// Read the base-index fields of an audio file.
///
/// Missing titles fall back to the file stem, missing artist and album to
/// [`UNKNOWN_ARTIST`] / [`UNKNOWN_ALBUM`].
pub fn read_base_tags(path: &Path) -> Result<BaseTags> {
    let tagged_file = probe(path)?;
    let tag = primary_or_first(&tagged_file);

    let title = tag
        .and_then(|t| t.title().map(|s| s.to_string()))
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let artist = tag
        .and_then(|t| t.artist().map(|s| s.to_string()))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let album = tag
        .and_then(|t| t.album().map(|s| s.to_string()))
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

    let album_artist = tag.and_then(|t| t.get_string(&ItemKey::AlbumArtist).map(str::to_string));
    let composer = tag.and_then(|t| t.get_string(&ItemKey::Composer).map(str::to_string));
    let year = tag.and_then(|t| t.year()).map(|y| y.to_string());
    let track_number = tag.and_then(|t| t.track());

    let duration_ms = tagged_file.properties().duration().as_millis() as u64;

    Ok(BaseTags {
        title,
        artist,
        album,
        album_artist,
        composer,
        year,
        track_number,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write");

        assert!(read_base_tags(file.path()).is_err());
        assert!(LoftyTagExtractor.extract(file.path()).is_err());
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        let path = Path::new("non_existent_file.mp3");
        let err = LoftyTagExtractor.extract(path).unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
        assert!(err.to_string().contains("non_existent_file.mp3"));
    }

    #[test]
    fn test_tag_map_absent_vs_present() {
        let map = TagMap::new().with(TagKey::Artist, ["Alice; Bob"]);
        assert_eq!(map.get(TagKey::Artist), Some(&["Alice; Bob".to_string()][..]));
        assert_eq!(map.get(TagKey::Date), None);
        assert!(!map.contains(TagKey::Date));
    }

    #[test]
    fn test_tag_map_empty_insert_removes_key() {
        let mut map = TagMap::new().with(TagKey::Date, ["2001"]);
        map.insert(TagKey::Date, Vec::<String>::new());
        assert!(map.is_empty());
        assert_eq!(map.first(TagKey::Date), None);
    }

    #[test]
    fn test_tag_map_multi_value_order() {
        let map = TagMap::new().with(TagKey::Artist, ["Alice", "Bob"]);
        assert_eq!(map.first(TagKey::Artist), Some("Alice"));
        assert_eq!(map.get(TagKey::Artist).map(|v| v.len()), Some(2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_tag_key_names() {
        assert_eq!(TagKey::Artist.to_string(), "ARTIST");
        assert_eq!(TagKey::Date.as_str(), "DATE");
        assert_eq!(TagKey::ALL.len(), 8);
    }
}
