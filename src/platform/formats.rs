//! Stream candidate parsing and audio stream selection

use super::innertube::FormatData;
use crate::error::RytmError;
use crate::utils::mime::is_audio_mime;
use url::{form_urlencoded, Url};

/// Container preferred for broad player compatibility
pub const PREFERRED_AUDIO_MIME: &str = "audio/mp4";

/// Query key used when a ciphered format names none
pub const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// Where the playable URL of a candidate comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLocator {
    /// Ready to play
    Direct(String),
    /// Needs its signature deciphered and appended as `signature_param`
    Ciphered {
        base_url: String,
        signature: String,
        signature_param: String,
    },
}

/// One adaptive format offered for a media id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCandidate {
    pub itag: u32,
    pub mime_type: String,
    pub bitrate: u64,
    pub locator: StreamLocator,
    pub content_length: Option<u64>,
}

impl StreamCandidate {
    /// Build a candidate from a format entry. Entries with neither a URL nor
    /// a parsable cipher yield `None`.
    pub fn from_format(format: &FormatData) -> Option<Self> {
        let locator = match (&format.url, format.signature_cipher.as_ref().or(format.cipher.as_ref())) {
            (Some(url), _) if !url.is_empty() => StreamLocator::Direct(url.clone()),
            (_, Some(cipher)) => parse_signature_cipher(cipher).ok()?,
            _ => return None,
        };

        Some(Self {
            itag: format.itag,
            mime_type: format.mime_type.clone(),
            bitrate: format.bitrate,
            locator,
            content_length: format.content_length.as_deref().and_then(|s| s.parse().ok()),
        })
    }

    pub fn is_audio(&self) -> bool {
        is_audio_mime(&self.mime_type)
    }

    pub fn is_ciphered(&self) -> bool {
        matches!(self.locator, StreamLocator::Ciphered { .. })
    }
}

/// Audio candidates from a list of format entries, in response order
pub fn audio_candidates(formats: &[FormatData]) -> Vec<StreamCandidate> {
    formats
        .iter()
        .filter_map(StreamCandidate::from_format)
        .filter(StreamCandidate::is_audio)
        .collect()
}

/// Pick the audio stream to play.
///
/// The first candidate in the preferred container wins outright. Otherwise
/// the highest bitrate wins, with ties going to the earlier candidate.
pub fn select_audio_stream(candidates: &[StreamCandidate]) -> Option<&StreamCandidate> {
    let audio = || candidates.iter().filter(|c| c.is_audio());

    if let Some(preferred) = audio().find(|c| c.mime_type.starts_with(PREFERRED_AUDIO_MIME)) {
        return Some(preferred);
    }

    audio().fold(None, |best: Option<&StreamCandidate>, c| match best {
        Some(b) if b.bitrate >= c.bitrate => Some(b),
        _ => Some(c),
    })
}

/// Split a `signatureCipher` blob into base URL, obfuscated signature and key
pub fn parse_signature_cipher(cipher: &str) -> Result<StreamLocator, RytmError> {
    let mut base_url = None;
    let mut signature = None;
    let mut signature_param = None;

    for (key, value) in form_urlencoded::parse(cipher.as_bytes()) {
        match key.as_ref() {
            "url" => base_url = Some(value.into_owned()),
            "s" => signature = Some(value.into_owned()),
            "sp" => signature_param = Some(value.into_owned()),
            _ => {}
        }
    }

    match (base_url, signature) {
        (Some(base_url), Some(signature)) => Ok(StreamLocator::Ciphered {
            base_url,
            signature,
            signature_param: signature_param
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_SIGNATURE_PARAM.to_string()),
        }),
        _ => Err(RytmError::Parse("signature cipher lacks url or s".to_string())),
    }
}

/// Append `key=value` to `base_url`, replacing any existing `key`
pub fn assemble_url(base_url: &str, key: &str, value: &str) -> Result<String, RytmError> {
    let mut url = Url::parse(base_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(itag: u32, mime: &str, bitrate: u64) -> StreamCandidate {
        StreamCandidate {
            itag,
            mime_type: mime.to_string(),
            bitrate,
            locator: StreamLocator::Direct(format!("https://media/{}", itag)),
            content_length: None,
        }
    }

    #[test]
    fn test_prefers_compatible_container_over_bitrate() {
        let candidates = vec![
            direct(249, "audio/webm; codecs=\"opus\"", 160_000),
            direct(140, "audio/mp4; codecs=\"mp4a.40.2\"", 128_000),
            direct(251, "audio/webm; codecs=\"opus\"", 256_000),
        ];
        assert_eq!(select_audio_stream(&candidates).unwrap().itag, 140);
    }

    #[test]
    fn test_highest_bitrate_fallback_first_wins_ties() {
        let candidates = vec![
            direct(249, "audio/webm", 160_000),
            direct(250, "audio/webm", 256_000),
            direct(251, "audio/webm", 256_000),
            direct(137, "video/mp4", 4_000_000),
        ];
        assert_eq!(select_audio_stream(&candidates).unwrap().itag, 250);
    }

    #[test]
    fn test_no_audio() {
        assert!(select_audio_stream(&[direct(137, "video/mp4", 1)]).is_none());
        assert!(select_audio_stream(&[]).is_none());
    }

    #[test]
    fn test_parse_signature_cipher() {
        let cipher = "s=AB%3DCD&sp=sig&url=https%3A%2F%2Fmedia.example%2Fplayback%3Fitag%3D140%26id%3Dx";
        let locator = parse_signature_cipher(cipher).unwrap();
        assert_eq!(
            locator,
            StreamLocator::Ciphered {
                base_url: "https://media.example/playback?itag=140&id=x".to_string(),
                signature: "AB=CD".to_string(),
                signature_param: "sig".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_signature_cipher_defaults_param() {
        let locator = parse_signature_cipher("s=abc&url=https%3A%2F%2Fm%2Fp").unwrap();
        match locator {
            StreamLocator::Ciphered {
                signature_param, ..
            } => assert_eq!(signature_param, "signature"),
            other => panic!("unexpected locator {:?}", other),
        }
        assert!(parse_signature_cipher("sp=sig").is_err());
    }

    #[test]
    fn test_assemble_url() {
        let url = assemble_url("https://m.example/p?itag=140&sig=old", "sig", "new=").unwrap();
        assert_eq!(url, "https://m.example/p?itag=140&sig=new%3D");
        assert!(assemble_url("not a url", "sig", "x").is_err());
    }

    #[test]
    fn test_candidate_from_format() {
        let format = FormatData {
            itag: 140,
            mime_type: "audio/mp4".to_string(),
            bitrate: 128_000,
            signature_cipher: Some("s=xyz&url=https%3A%2F%2Fm%2Fp".to_string()),
            content_length: Some("12345".to_string()),
            ..FormatData::default()
        };
        let candidate = StreamCandidate::from_format(&format).unwrap();
        assert!(candidate.is_ciphered());
        assert_eq!(candidate.content_length, Some(12345));

        let bare = FormatData {
            itag: 1,
            mime_type: "audio/mp4".to_string(),
            ..FormatData::default()
        };
        assert!(StreamCandidate::from_format(&bare).is_none());
    }
}
