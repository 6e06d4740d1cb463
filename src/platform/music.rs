//! Music platform client: search and stream resolution

use super::client::HttpClient;
use super::formats::{assemble_url, audio_candidates, select_audio_stream, StreamLocator};
use super::innertube::{self, PlayerResponse, SearchResponse};
use crate::cache::source::{ResolvedStream, StreamSource};
use crate::cipher::{CipherEngine, ProfileStore};
use crate::config::ClientConfig;
use crate::core::Song;
use crate::error::RytmError;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Inner {
    http: HttpClient,
    config: ClientConfig,
    cipher: CipherEngine,
    streams: Cache<String, ResolvedStream>,
}

/// Client for search and stream resolution.
///
/// The `try_*` methods report typed errors. The plain methods never fail:
/// they log and degrade to an empty list or `None`.
#[derive(Clone)]
pub struct MusicClient {
    inner: Arc<Inner>,
}

impl MusicClient {
    /// Create a new client backed by `store` for the cipher profile
    pub fn new(config: ClientConfig, store: Arc<dyn ProfileStore>) -> Result<Self, RytmError> {
        let http = HttpClient::new(&config)?;
        let cipher = CipherEngine::new(http.clone(), &config, store);
        let streams = Cache::builder()
            .time_to_live(config.stream_url_ttl)
            .max_capacity(512)
            .build();

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                cipher,
                streams,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cipher(&self) -> &CipherEngine {
        &self.inner.cipher
    }

    pub fn http(&self) -> &HttpClient {
        &self.inner.http
    }

    /// Search for songs. Any failure yields an empty list.
    pub async fn search(&self, query: &str) -> Vec<Song> {
        match self.try_search(query).await {
            Ok(songs) => songs,
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Search for songs
    pub async fn try_search(&self, query: &str) -> Result<Vec<Song>, RytmError> {
        let config = &self.inner.config;
        info!("Searching for: {}", query);

        let body = innertube::search_body(&config.search_identity, query, &config.search_params);
        let request = self
            .inner
            .http
            .api_request("search", &config.search_identity)
            .json(&body);

        let response: SearchResponse = self.inner.http.execute_with_retry(request, "search").await?;
        let songs = innertube::try_parse_songs(&response)?;
        info!("Search returned {} songs", songs.len());
        Ok(songs)
    }

    /// Fetch the raw player response for a media id
    pub async fn player(&self, video_id: &str) -> Result<PlayerResponse, RytmError> {
        let identity = &self.inner.config.player_identity;
        let body = innertube::player_body(identity, video_id);
        let request = self.inner.http.api_request("player", identity).json(&body);
        self.inner.http.execute_with_retry(request, "player").await
    }

    /// Resolve a playable audio URL. Any failure yields `None`.
    pub async fn resolve_stream(&self, video_id: &str) -> Option<String> {
        self.resolve_audio(video_id).await.map(|s| s.url)
    }

    /// Resolve the audio stream for a media id
    pub async fn try_resolve_audio(&self, video_id: &str) -> Result<ResolvedStream, RytmError> {
        if let Some(stream) = self.inner.streams.get(video_id).await {
            debug!("Stream URL cache hit for {}", video_id);
            return Ok(stream);
        }

        let response = self.player(video_id).await?;
        if !response.is_playable() {
            let reason = response
                .reason()
                .or(response.status())
                .unwrap_or("missing playability status");
            return Err(RytmError::Unplayable(reason.to_string()));
        }

        let candidates = audio_candidates(&response.adaptive_formats());
        let selected = select_audio_stream(&candidates).ok_or(RytmError::NoStream)?;
        debug!(
            "Selected itag {} ({}, {} bps) for {}",
            selected.itag, selected.mime_type, selected.bitrate, video_id
        );

        let url = match &selected.locator {
            StreamLocator::Direct(url) => url.clone(),
            StreamLocator::Ciphered {
                base_url,
                signature,
                signature_param,
            } => {
                let deciphered = self.inner.cipher.decipher(signature).await?;
                assemble_url(base_url, signature_param, &deciphered)?
            }
        };

        let stream = ResolvedStream {
            url,
            mime_type: selected.mime_type.clone(),
            content_length: selected.content_length,
            headers: self.playback_headers(),
        };
        self.inner
            .streams
            .insert(video_id.to_string(), stream.clone())
            .await;
        Ok(stream)
    }

    /// Headers to send when fetching media from a resolved URL
    pub fn playback_headers(&self) -> Vec<(String, String)> {
        let config = &self.inner.config;
        vec![
            (
                "User-Agent".to_string(),
                config.player_identity.user_agent.clone(),
            ),
            ("Origin".to_string(), config.web_base.clone()),
            ("Referer".to_string(), format!("{}/", config.web_base)),
        ]
    }

    /// Forget a memoized stream URL
    pub async fn invalidate_stream(&self, video_id: &str) {
        self.inner.streams.invalidate(video_id).await;
    }
}

#[async_trait]
impl StreamSource for MusicClient {
    async fn resolve_audio(&self, id: &str) -> Option<ResolvedStream> {
        match self.try_resolve_audio(id).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("No stream for {}: {}", id, e);
                None
            }
        }
    }

    /// A rejected URL may mean the player script changed under the stored
    /// cipher, so the script version is rechecked.
    async fn report_rejected(&self, id: &str) {
        self.invalidate_stream(id).await;
        if self.inner.cipher.stored_profile().is_some() {
            if let Err(e) = self.inner.cipher.refresh_if_outdated().await {
                warn!("Cipher recheck after rejected stream failed: {}", e);
            }
        }
    }
}
