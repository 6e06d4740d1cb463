//! Client and cache configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default search params blob that restricts results to songs
pub const SONG_SEARCH_PARAMS: &str = "EgWKAQIIAWoKEAkQBRAKEAMQBA%3D%3D";

/// Generic desktop browser user agent used for the landing page and script fetches
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Identity block a request declares to the remote API.
///
/// The body's `context.client` object and the request headers are both derived
/// from the same identity so they never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Value of `clientName` in the request body
    pub name: String,
    /// Value of `clientVersion` in the request body
    pub version: String,
    /// Value of `platform` in the request body
    pub platform: String,
    /// Numeric client id sent in `X-YouTube-Client-Name`
    pub client_id: String,
    /// User agent matching the declared client
    pub user_agent: String,
    /// API version sent in `X-Goog-Api-Format-Version`
    pub api_format_version: String,
}

impl ClientIdentity {
    /// Desktop web music client, used for search
    pub fn web_remix() -> Self {
        Self {
            name: "WEB_REMIX".to_string(),
            version: "1.20241127.01.00".to_string(),
            platform: "DESKTOP".to_string(),
            client_id: "67".to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            api_format_version: "2".to_string(),
        }
    }

    /// Android music client, used for player requests
    pub fn android_music() -> Self {
        Self {
            name: "ANDROID_MUSIC".to_string(),
            version: "7.27.52".to_string(),
            platform: "MOBILE".to_string(),
            client_id: "21".to_string(),
            user_agent: "com.google.android.apps.youtube.music/7.27.52 (Linux; U; Android 14) gzip"
                .to_string(),
            api_format_version: "2".to_string(),
        }
    }
}

/// Content cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Application-private directory holding cached media
    pub dir: PathBuf,
    /// Free space that must remain on the device before admitting new media
    pub min_free_bytes: u64,
    /// Extension of in-progress downloads
    pub staging_extension: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("rytm-cache"),
            min_free_bytes: 1024 * 1024 * 1024, // 1 GiB
            staging_extension: "part".to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a cache configuration rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Set the free-space floor
    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }
}

/// Protocol client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the JSON API
    pub api_base: String,
    /// Base URL of the landing page and player scripts
    pub web_base: String,
    /// HTTP timeout
    pub timeout: Duration,
    /// Maximum attempts for API requests
    pub max_retries: u32,
    /// Identity used for search requests
    pub search_identity: ClientIdentity,
    /// Identity used for player requests
    pub player_identity: ClientIdentity,
    /// User agent for landing page and script fetches
    pub browser_user_agent: String,
    /// Accept-Language preference
    pub accept_language: String,
    /// Fixed result-shape parameter blob for search
    pub search_params: String,
    /// Age after which a stored cipher profile is re-extracted
    pub profile_max_age: Duration,
    /// Minimum spacing between two extraction runs
    pub extraction_cooldown: Duration,
    /// Lifetime of memoized stream URLs
    pub stream_url_ttl: Duration,
    /// Lifetime of memoized player scripts
    pub script_cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://music.youtube.com".to_string(),
            web_base: "https://music.youtube.com".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            search_identity: ClientIdentity::web_remix(),
            player_identity: ClientIdentity::android_music(),
            browser_user_agent: BROWSER_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            search_params: SONG_SEARCH_PARAMS.to_string(),
            profile_max_age: Duration::from_secs(24 * 3600),
            extraction_cooldown: Duration::from_secs(30),
            stream_url_ttl: Duration::from_secs(1800),
            script_cache_ttl: Duration::from_secs(600),
        }
    }
}

impl ClientConfig {
    /// Point both the API and the landing page at one host (tests, mirrors)
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_base = base.to_string();
        self.web_base = base.to_string();
        self
    }

    /// Set HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the identity used for player requests
    pub fn with_player_identity(mut self, identity: ClientIdentity) -> Self {
        self.player_identity = identity;
        self
    }

    /// Set the profile staleness threshold
    pub fn with_profile_max_age(mut self, max_age: Duration) -> Self {
        self.profile_max_age = max_age;
        self
    }

    /// Set the extraction cooldown
    pub fn with_extraction_cooldown(mut self, cooldown: Duration) -> Self {
        self.extraction_cooldown = cooldown;
        self
    }
}
