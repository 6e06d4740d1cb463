//! Song metadata

use crate::cache::CacheOutcome;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A playable item returned by search.
///
/// Identity is the media id alone: two songs with the same id are equal
/// regardless of metadata or cache flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    /// Platform media id
    pub id: String,
    pub title: String,
    /// Artist line as displayed, possibly several names joined
    pub artist: String,
    /// Largest available thumbnail
    pub thumbnail_url: Option<String>,
    /// The item is an album page rather than a single track
    pub is_album: bool,
    /// Album browse id: the album a track belongs to, or the album itself
    pub album_id: Option<String>,
    /// Duration in milliseconds, 0 when unknown
    pub duration_ms: u64,
    /// Committed in the content cache
    #[serde(default)]
    pub is_cached: bool,
    /// Last cache attempt failed
    #[serde(default)]
    pub cache_failed: bool,
}

impl Song {
    /// Create a new Song
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail_url: None,
            is_album: false,
            album_id: None,
            duration_ms: 0,
            is_cached: false,
            cache_failed: false,
        }
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Link a track to the album it appears on
    pub fn with_album(mut self, album_id: impl Into<String>) -> Self {
        self.album_id = Some(album_id.into());
        self
    }

    /// An album entry, identified by its browse id
    pub fn album(
        browse_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        let browse_id = browse_id.into();
        let mut album = Self::new(browse_id.clone(), title, artist).with_album(browse_id);
        album.is_album = true;
        album
    }

    /// Record the result of a cache attempt
    pub fn apply_cache_outcome(&mut self, outcome: &CacheOutcome) {
        self.is_cached = outcome.is_success();
        self.cache_failed = matches!(outcome, CacheOutcome::Failed(_));
    }

    /// Duration formatted as `m:ss` or `h:mm:ss`
    pub fn duration_label(&self) -> String {
        let total = self.duration_ms / 1000;
        let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
        if h > 0 {
            format!("{}:{:02}:{:02}", h, m, s)
        } else {
            format!("{}:{:02}", m, s)
        }
    }
}

impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Song {}

impl Hash for Song {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Parse a displayed duration (`3:25`, `1:02:03`) into milliseconds
pub fn parse_duration_ms(text: &str) -> Option<u64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let mut total: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value: u64 = part.parse().ok()?;
        if i > 0 && value >= 60 {
            return None;
        }
        total = total * 60 + value;
    }
    Some(total * 1000)
}
