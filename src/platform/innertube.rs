//! Request bodies and response shapes of the music platform's JSON API.
//!
//! Response types mirror only the fields this crate reads. Every field is
//! optional so a missing node never fails deserialization; each place where a
//! song can be dropped is an explicit branch in [`song_from_item`].

use crate::config::ClientIdentity;
use crate::core::song::{parse_duration_ms, Song};
use crate::error::RytmError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Separator the platform places between artist, album and duration runs
const RUN_SEPARATOR: &str = " • ";

/// Browse-id prefix of album pages
const ALBUM_BROWSE_PREFIX: &str = "MPREb";

/// Build the `context` block shared by every request
pub fn context(identity: &ClientIdentity, hl: &str, gl: &str) -> Value {
    json!({
        "client": {
            "clientName": identity.name,
            "clientVersion": identity.version,
            "platform": identity.platform,
            "hl": hl,
            "gl": gl,
            "userAgent": identity.user_agent,
        }
    })
}

/// Build a search request body
pub fn search_body(identity: &ClientIdentity, query: &str, params: &str) -> Value {
    json!({
        "context": context(identity, "en", "US"),
        "query": query,
        "params": params,
    })
}

/// Build a player request body
pub fn player_body(identity: &ClientIdentity, video_id: &str) -> Value {
    json!({
        "context": context(identity, "en", "US"),
        "videoId": video_id,
        "contentCheckOk": true,
        "racyCheckOk": true,
    })
}

// Search response

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub contents: Option<SearchContents>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContents {
    #[serde(default)]
    pub tabbed_search_results_renderer: Option<TabbedResults>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TabbedResults {
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    #[serde(default)]
    pub tab_renderer: Option<TabRenderer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TabRenderer {
    #[serde(default)]
    pub content: Option<TabContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabContent {
    #[serde(default)]
    pub section_list_renderer: Option<SectionList>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SectionList {
    /// Sections are kept raw: a malformed section must not hide its siblings
    #[serde(default)]
    pub contents: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub music_shelf_renderer: Option<MusicShelf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MusicShelf {
    /// Items are kept raw and parsed one by one
    #[serde(default)]
    pub contents: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfItem {
    #[serde(default)]
    pub music_responsive_list_item_renderer: Option<ListItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    #[serde(default)]
    pub flex_columns: Option<Vec<FlexColumn>>,
    #[serde(default)]
    pub playlist_item_data: Option<PlaylistItemData>,
    #[serde(default)]
    pub thumbnail: Option<ThumbnailRenderer>,
    #[serde(default)]
    pub navigation_endpoint: Option<NavigationEndpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexColumn {
    #[serde(default)]
    pub music_responsive_list_item_flex_column_renderer: Option<FlexColumnRenderer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FlexColumnRenderer {
    #[serde(default)]
    pub text: Option<Runs>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Runs {
    #[serde(default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub navigation_endpoint: Option<NavigationEndpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemData {
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRenderer {
    #[serde(default)]
    pub music_thumbnail_renderer: Option<MusicThumbnail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MusicThumbnail {
    #[serde(default)]
    pub thumbnail: Option<Thumbnails>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEndpoint {
    #[serde(default)]
    pub browse_endpoint: Option<BrowseEndpoint>,
    #[serde(default)]
    pub watch_endpoint: Option<WatchEndpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseEndpoint {
    #[serde(default)]
    pub browse_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEndpoint {
    #[serde(default)]
    pub video_id: Option<String>,
}

/// Why a search item was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAListItem,
    MissingFlexColumns,
    MissingTitle,
    MissingId,
}

/// Walk the search response and build songs, skipping malformed items.
///
/// Returns an empty list when the top-level container is absent.
pub fn parse_songs(response: &SearchResponse) -> Vec<Song> {
    try_parse_songs(response).unwrap_or_else(|e| {
        debug!("{}", e);
        Vec::new()
    })
}

/// Like [`parse_songs`], but reports a missing top-level container as a parse error
pub fn try_parse_songs(response: &SearchResponse) -> Result<Vec<Song>, RytmError> {
    let tabs = response
        .contents
        .as_ref()
        .and_then(|c| c.tabbed_search_results_renderer.as_ref())
        .map(|r| &r.tabs)
        .ok_or_else(|| RytmError::Parse("search response has no tabbed results".to_string()))?;

    let mut songs = Vec::new();
    let mut skipped = 0usize;

    let sections = tabs
        .iter()
        .filter_map(|tab| tab.tab_renderer.as_ref()?.content.as_ref()?.section_list_renderer.as_ref())
        .flat_map(|list| list.contents.iter());

    for raw_section in sections {
        let Ok(section) = Section::deserialize(raw_section) else {
            continue;
        };
        let Some(shelf) = section.music_shelf_renderer else {
            continue;
        };

        for raw_item in &shelf.contents {
            match song_from_value(raw_item) {
                Ok(song) => songs.push(song),
                Err(reason) => {
                    skipped += 1;
                    debug!("Skipping search item: {:?}", reason);
                }
            }
        }
    }

    debug!("Parsed {} songs, skipped {}", songs.len(), skipped);
    Ok(songs)
}

/// Parse one raw shelf item
pub fn song_from_value(raw: &Value) -> Result<Song, SkipReason> {
    let item = ShelfItem::deserialize(raw).map_err(|_| SkipReason::NotAListItem)?;
    let renderer = item
        .music_responsive_list_item_renderer
        .ok_or(SkipReason::NotAListItem)?;
    song_from_item(&renderer)
}

/// Build a song from a list item renderer
pub fn song_from_item(item: &ListItem) -> Result<Song, SkipReason> {
    let columns = item
        .flex_columns
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(SkipReason::MissingFlexColumns)?;

    let title = column_runs(columns, 0)
        .and_then(|runs| runs.first())
        .map(|run| run.text.trim())
        .filter(|t| !t.is_empty())
        .ok_or(SkipReason::MissingTitle)?;

    let video_id = item
        .playlist_item_data
        .as_ref()
        .and_then(|d| d.video_id.clone())
        .or_else(|| {
            column_runs(columns, 0)?
                .first()?
                .navigation_endpoint
                .as_ref()?
                .watch_endpoint
                .as_ref()?
                .video_id
                .clone()
        })
        .filter(|id| !id.is_empty());

    let detail = column_runs(columns, 1).unwrap_or(&[]);
    let mut song = match video_id {
        Some(id) => {
            let mut song = Song::new(id, title, artist_line(detail));
            if let Some(album) = detail
                .iter()
                .filter_map(|r| r.navigation_endpoint.as_ref())
                .find_map(album_browse_id)
            {
                song = song.with_album(album);
            }
            song
        }
        // Album rows carry no media id, only a browse link on the row itself
        None => {
            let browse_id = item
                .navigation_endpoint
                .as_ref()
                .and_then(album_browse_id)
                .ok_or(SkipReason::MissingId)?;
            Song::album(browse_id, title, artist_line(detail))
        }
    };

    if let Some(url) = largest_thumbnail(item) {
        song = song.with_thumbnail(url);
    }
    if let Some(duration) = detail.iter().rev().find_map(|r| parse_duration_ms(&r.text)) {
        song = song.with_duration_ms(duration);
    }
    Ok(song)
}

fn column_runs(columns: &[FlexColumn], index: usize) -> Option<&[Run]> {
    columns
        .get(index)?
        .music_responsive_list_item_flex_column_renderer
        .as_ref()?
        .text
        .as_ref()
        .map(|t| t.runs.as_slice())
}

/// Runs before the first separator form the artist line
fn artist_line(detail: &[Run]) -> String {
    let joined: String = detail.iter().map(|r| r.text.as_str()).collect();
    joined
        .split(RUN_SEPARATOR)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn largest_thumbnail(item: &ListItem) -> Option<String> {
    item.thumbnail
        .as_ref()?
        .music_thumbnail_renderer
        .as_ref()?
        .thumbnail
        .as_ref()?
        .thumbnails
        .iter()
        .filter(|t| !t.url.is_empty())
        .max_by_key(|t| u64::from(t.width) * u64::from(t.height))
        .map(|t| t.url.clone())
}

fn album_browse_id(endpoint: &NavigationEndpoint) -> Option<String> {
    endpoint
        .browse_endpoint
        .as_ref()?
        .browse_id
        .clone()
        .filter(|id| id.starts_with(ALBUM_BROWSE_PREFIX))
}

// Player response

pub const PLAYABLE_STATUS: &str = "OK";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    #[serde(default)]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    pub streaming_data: Option<StreamingData>,
}

impl PlayerResponse {
    /// Whether the status field carries the playable sentinel
    pub fn is_playable(&self) -> bool {
        self.status() == Some(PLAYABLE_STATUS)
    }

    pub fn status(&self) -> Option<&str> {
        self.playability_status.as_ref()?.status.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.playability_status.as_ref()?.reason.as_deref()
    }

    /// Adaptive formats that deserialize, in response order
    pub fn adaptive_formats(&self) -> Vec<FormatData> {
        self.streaming_data
            .as_ref()
            .map(|d| {
                d.adaptive_formats
                    .iter()
                    .filter_map(|raw| FormatData::deserialize(raw).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    #[serde(default)]
    pub adaptive_formats: Vec<Value>,
}

/// One adaptive format entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatData {
    #[serde(default)]
    pub itag: u32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub signature_cipher: Option<String>,
    #[serde(default)]
    pub cipher: Option<String>,
    /// Sent as a decimal string
    #[serde(default)]
    pub content_length: Option<String>,
}
