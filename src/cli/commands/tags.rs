//! Tag inspection and delimiter configuration.

use std::path::Path;

use crate::config::{self, Config};
use crate::metadata::{self, LoftyTagExtractor, TagExtractor};
use crate::scanner::{ArtistSplitter, DEFAULT_DELIMITERS};

/// Print every recognized tag of a file, plus how its artists would split
pub fn cmd_tags(path: &Path, config: &Config) -> anyhow::Result<()> {
    let base = metadata::read_base_tags(path)?;
    let tags = LoftyTagExtractor.extract(path)?;

    println!("File:     {}", path.display());
    println!("Duration: {:.1}s", base.duration_ms as f64 / 1000.0);
    if tags.is_empty() {
        println!("No tags.");
    }
    for (key, values) in tags.iter() {
        println!("{:<12} {}", key.as_str(), values.join(" | "));
    }

    let splitter = ArtistSplitter::new(&config.metadata.delimiters())?;
    if splitter.is_splitting() {
        let names = splitter.split(tags.get(metadata::TagKey::Artist));
        println!("Split artists: {}", names.join(", "));
    }
    Ok(())
}

/// Show the artist delimiters, or change them
pub fn cmd_delimiters(
    mut config: Config,
    set: Option<&[String]>,
    defaults: bool,
    reset: bool,
) -> anyhow::Result<()> {
    let updated = if reset {
        Some(None)
    } else if defaults {
        Some(Some(DEFAULT_DELIMITERS.iter().map(|d| d.to_string()).collect()))
    } else {
        set.map(|s| Some(s.to_vec()))
    };

    if let Some(delimiters) = updated {
        config.metadata.artist_delimiters = delimiters;
        // Reject sets the splitter cannot compile before persisting them
        ArtistSplitter::new(&config.metadata.delimiters())?;
        config::save(&config)?;
    }

    let current = config.metadata.delimiters();
    let effective = current.effective();
    if effective.is_empty() {
        println!("Artist splitting: off");
    } else {
        println!("Artist splitting: {}", quote_all(&effective));
    }
    println!("Built-in set:     {}", quote_all(DEFAULT_DELIMITERS));
    Ok(())
}

/// Quote delimiters so leading and trailing spaces stay visible.
fn quote_all(delimiters: &[&str]) -> String {
    delimiters
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
