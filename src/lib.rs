//! Xtream provider acquisition and enrichment engine.
//!
//! Fetches live/VOD/series listings and EPG data from an Xtream-protocol
//! IPTV provider, caches listings per calendar day, filters channels by
//! category/name terms, enriches matches with EPG entry counts and ffprobe
//! stream details, and archives full acquisition runs into timestamped,
//! credential-masked snapshots with retention pruning.

pub mod api;
pub mod archive;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod epg;
pub mod error;
pub mod filter;
pub mod models;
pub mod output;
pub mod probe;

pub use error::{Result, ScoutError};
