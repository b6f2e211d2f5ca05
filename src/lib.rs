//! tagcache - enriched song metadata over a base media index.
//!
//! The [`scanner`] reads the tags of every indexed song once, splits
//! multi-artist tags into individual names with stable ids and stores the
//! result in the metadata cache ([`db::metadata`]). The [`overlay`] then
//! layers those cached records over the base songs and playlist members
//! whenever they are read.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod metadata;
pub mod model;
pub mod overlay;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

pub use error::{Error, Result};
