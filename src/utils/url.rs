//! URL utilities for extracting media ids from platform URLs

use crate::error::RytmError;
use url::Url;

/// Length of a platform media id
pub const VIDEO_ID_LEN: usize = 11;

/// Check if the input is a bare media id
pub fn is_video_id(input: &str) -> bool {
    input.len() == VIDEO_ID_LEN
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract a media id from a bare id or from a watch, short or music URL
pub fn extract_video_id(input: &str) -> Result<String, RytmError> {
    let input = input.trim();
    if is_video_id(input) {
        return Ok(input.to_string());
    }

    let parsed = Url::parse(input)?;
    let host = parsed
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .unwrap_or_default();

    let id = match host.as_str() {
        "youtu.be" => parsed.path().trim_start_matches('/').to_string(),
        "youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            if parsed.path().starts_with("/watch") {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string())
                    .ok_or_else(|| RytmError::InvalidUrl("Missing v parameter".to_string()))?
            } else if let Some(rest) = parsed.path().strip_prefix("/shorts/") {
                rest.to_string()
            } else {
                return Err(RytmError::InvalidUrl(
                    "Unsupported media URL format".to_string(),
                ));
            }
        }
        _ => {
            return Err(RytmError::InvalidUrl(
                "Not a supported platform URL".to_string(),
            ))
        }
    };

    if id.is_empty() {
        return Err(RytmError::InvalidUrl("Missing media id".to_string()));
    }
    Ok(id)
}
