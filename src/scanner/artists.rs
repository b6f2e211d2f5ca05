//! Artist name splitting and stable artist id assignment.
//!
//! A single `ARTIST` tag frequently names several people
//! (`"Alice; Bob"`). [`ArtistSplitter`] turns the raw tag values into
//! individual names using the configured delimiters, and
//! [`ArtistIdResolver`] hands out integer ids for those names that stay the
//! same from one scan to the next.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::model::SongMetadata;

/// Delimiters offered to users when configuring artist splitting.
pub const DEFAULT_DELIMITERS: &[&str] = &[
    ";", "/", ",", "&", "+", " feat. ", " ft. ", " x ", " vs. ", " with ",
];

/// User-selected artist delimiters.
///
/// `None` and an empty list both mean "do not split".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistDelimiters {
    pub custom: Option<Vec<String>>,
}

impl ArtistDelimiters {
    /// No custom delimiters: artist tag values are used as-is.
    pub fn none() -> Self {
        Self { custom: None }
    }

    pub fn custom<I, S>(delimiters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            custom: Some(delimiters.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether a non-empty custom delimiter set is configured.
    pub fn is_configured(&self) -> bool {
        self.custom.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// Non-blank configured delimiters, deduplicated in configured order.
    pub fn effective(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.custom
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|d| !d.trim().is_empty())
            .filter(|d| seen.insert(*d))
            .collect()
    }
}

/// Splits raw `ARTIST` tag values into individual artist names.
#[derive(Debug, Clone)]
pub struct ArtistSplitter {
    pattern: Option<Regex>,
}

impl ArtistSplitter {
    /// Compile the delimiter set into one literal alternation.
    ///
    /// A set with no usable delimiters produces a splitter that only trims.
    pub fn new(delimiters: &ArtistDelimiters) -> Result<Self, regex::Error> {
        let effective = delimiters.effective();
        let pattern = if !delimiters.is_configured() || effective.is_empty() {
            None
        } else {
            let alternation = effective
                .iter()
                .map(|d| regex::escape(d))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&alternation)?)
        };
        Ok(Self { pattern })
    }

    pub fn is_splitting(&self) -> bool {
        self.pattern.is_some()
    }

    /// Individual artist names for the raw tag values.
    ///
    /// With delimiters, every value is split, trimmed, emptied pieces are
    /// dropped and duplicates removed keeping the first occurrence. Without
    /// delimiters each value is one name, trimmed. `None` (no `ARTIST` tag)
    /// yields an empty list.
    pub fn split(&self, raw: Option<&[String]>) -> Vec<String> {
        let raw = raw.unwrap_or_default();
        match &self.pattern {
            Some(pattern) => {
                let mut seen = HashSet::new();
                raw.iter()
                    .flat_map(|value| pattern.split(value))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .filter(|name| seen.insert(*name))
                    .map(str::to_string)
                    .collect()
            }
            None => raw
                .iter()
                .map(|value| value.trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Assigns stable integer ids to artist names.
///
/// Scoped to one scan: build it with [`seeded`](Self::seeded) from the
/// cached records so names seen in earlier scans keep their ids, resolve
/// names in input order, then drop it.
#[derive(Debug, Clone)]
pub struct ArtistIdResolver {
    ids: HashMap<String, i64>,
    next_id: i64,
}

impl Default for ArtistIdResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtistIdResolver {
    /// An empty resolver; the first minted id is 1.
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            next_id: 1,
        }
    }

    /// Replay the `artistNames`/`artistIds` pairs of cached records.
    ///
    /// The first id seen for a name wins. Non-integer id tokens are skipped
    /// along with their name. The next minted id is one above the largest
    /// id stored in any record, including rows whose names could not be
    /// paired with their ids.
    pub fn seeded<'a>(records: impl IntoIterator<Item = &'a SongMetadata>) -> Self {
        let mut resolver = Self::new();
        let mut skipped = 0usize;
        for record in records {
            for (name, token) in record.artist_tokens() {
                let Ok(id) = token.parse::<i64>() else {
                    skipped += 1;
                    debug!(target: "scanner::artists", song_id = record.id, token, "Skipping malformed artist id");
                    continue;
                };
                resolver.ids.entry(name.to_string()).or_insert(id);
            }
            // Rows whose names and ids cannot be paired still reserve their ids
            if let Some(max) = record.artist_id_values().max() {
                resolver.next_id = resolver.next_id.max(max + 1);
            }
        }
        debug!(
            target: "scanner::artists",
            artists = resolver.ids.len(),
            next_id = resolver.next_id,
            skipped,
            "Seeded artist ids"
        );
        resolver
    }

    /// The id for `name`, minting a new one if the name is unknown.
    pub fn resolve(&mut self, name: &str) -> i64 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.ids.get(name).copied()
    }

    /// The id the next unknown name will receive.
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
