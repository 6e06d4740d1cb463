//! MIME type utilities for cached audio files

/// Extensions a committed cache file may carry
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "webm", "mp3", "ogg", "opus", "aac", "flac", "wav"];

/// Fallback when a stream declares an unknown audio type
pub const DEFAULT_AUDIO_EXTENSION: &str = "m4a";

/// Strip parameters such as `; codecs="mp4a.40.2"`
pub fn essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}

/// Get the audio container extension for a MIME type
pub fn audio_ext_from_mime(mime_type: &str) -> &'static str {
    match essence(mime_type).to_ascii_lowercase().as_str() {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/webm" => "webm",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/vorbis" => "ogg",
        "audio/opus" => "opus",
        "audio/aac" | "audio/x-aac" => "aac",
        "audio/flac" => "flac",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => DEFAULT_AUDIO_EXTENSION,
    }
}

/// Check if MIME type is an audio format
pub fn is_audio_mime(mime_type: &str) -> bool {
    essence(mime_type).starts_with("audio/")
}

/// Check if an extension belongs to a committed audio file
pub fn is_audio_extension(extension: &str) -> bool {
    let ext = extension.trim_start_matches('.');
    AUDIO_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_ext_from_mime() {
        assert_eq!(audio_ext_from_mime("audio/mp4"), "m4a");
        assert_eq!(audio_ext_from_mime("audio/mp4; codecs=\"mp4a.40.2\""), "m4a");
        assert_eq!(audio_ext_from_mime("audio/webm; codecs=\"opus\""), "webm");
        assert_eq!(audio_ext_from_mime("AUDIO/MPEG"), "mp3");
        assert_eq!(audio_ext_from_mime("application/octet-stream"), "m4a");
    }

    #[test]
    fn test_is_audio_mime() {
        assert!(is_audio_mime("audio/mp4"));
        assert!(is_audio_mime("audio/webm; codecs=\"opus\""));
        assert!(!is_audio_mime("video/mp4"));
        assert!(!is_audio_mime("text/plain"));
    }

    #[test]
    fn test_is_audio_extension() {
        assert!(is_audio_extension("m4a"));
        assert!(is_audio_extension(".WEBM"));
        assert!(!is_audio_extension("part"));
        assert!(!is_audio_extension("mp4"));
    }
}
