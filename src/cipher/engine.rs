//! Cipher engine: keeps the stored profile current and deciphers signatures

use super::extract::CipherExtractor;
use super::profile::CipherProfile;
use super::store::ProfileStore;
use crate::config::ClientConfig;
use crate::error::RytmError;
use crate::platform::client::HttpClient;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Coordinates extraction runs against a profile store.
///
/// At most one extraction runs at a time. Callers that queued behind a
/// running extraction reuse its result instead of starting another one.
pub struct CipherEngine {
    extractor: CipherExtractor,
    store: Arc<dyn ProfileStore>,
    run_lock: Mutex<()>,
    limiter: Option<DefaultDirectRateLimiter>,
    max_age: Duration,
}

impl CipherEngine {
    /// Create a new engine
    pub fn new(http: HttpClient, config: &ClientConfig, store: Arc<dyn ProfileStore>) -> Self {
        let limiter = Quota::with_period(config.extraction_cooldown).map(RateLimiter::direct);

        Self {
            extractor: CipherExtractor::new(http, config),
            store,
            run_lock: Mutex::new(()),
            limiter,
            max_age: config.profile_max_age,
        }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn extractor(&self) -> &CipherExtractor {
        &self.extractor
    }

    /// Stored profile, fresh or not, without triggering extraction
    pub fn stored_profile(&self) -> Option<Arc<CipherProfile>> {
        self.store.load()
    }

    /// Return a usable profile, extracting one if none is stored or the stored
    /// one is older than the configured maximum age.
    ///
    /// When a refresh of a stale profile fails, the stale profile is returned.
    pub async fn current_profile(&self) -> Result<Arc<CipherProfile>, RytmError> {
        if let Some(profile) = self.fresh_profile() {
            return Ok(profile);
        }

        let _guard = self.run_lock.lock().await;
        if let Some(profile) = self.fresh_profile() {
            debug!("Cipher profile refreshed by a concurrent caller");
            return Ok(profile);
        }

        match self.run_locked().await {
            Ok(profile) => Ok(profile),
            Err(e) => match self.store.load() {
                Some(stale) => {
                    warn!(
                        "Cipher refresh failed ({}), using stale profile {}",
                        e,
                        stale.version()
                    );
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// Run the extraction pipeline and store its result. Returns the version tag.
    pub async fn run_pipeline(&self) -> Result<String, RytmError> {
        let _guard = self.run_lock.lock().await;
        Ok(self.run_locked().await?.version().to_string())
    }

    /// Re-extract regardless of the stored profile's age
    pub async fn force_refresh(&self) -> Result<Arc<CipherProfile>, RytmError> {
        let _guard = self.run_lock.lock().await;
        self.run_locked().await
    }

    /// Re-extract when the landing page references a different script version
    /// than the stored profile. Returns the profile in effect afterwards.
    pub async fn refresh_if_outdated(&self) -> Result<Arc<CipherProfile>, RytmError> {
        let stored = match self.store.load() {
            Some(profile) => profile,
            None => return self.current_profile().await,
        };

        let live = self.extractor.current_version().await?;
        if live == stored.version() {
            debug!("Cipher profile {} is current", live);
            return Ok(stored);
        }

        info!(
            "Player script changed from {} to {}, refreshing cipher",
            stored.version(),
            live
        );
        let _guard = self.run_lock.lock().await;
        match self.store.load() {
            Some(profile) if profile.version() == live => Ok(profile),
            _ => self.run_locked().await,
        }
    }

    /// Decipher a signature with the current profile
    pub async fn decipher(&self, signature: &str) -> Result<String, RytmError> {
        let profile = self.current_profile().await?;
        Ok(profile.decipher(signature))
    }

    fn fresh_profile(&self) -> Option<Arc<CipherProfile>> {
        self.store
            .load()
            .filter(|p| !p.is_stale(self.max_age, Utc::now()))
    }

    async fn run_locked(&self) -> Result<Arc<CipherProfile>, RytmError> {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                warn!("Cipher extraction skipped, last run was too recent");
                return Err(RytmError::Cooldown);
            }
        }

        let profile = self.extractor.extract().await?;
        let version = profile.version().to_string();
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(profile))
            .await
            .map_err(|e| RytmError::Profile(format!("profile save task failed: {}", e)))??;
        info!("Stored cipher profile {}", version);

        self.store
            .load()
            .ok_or_else(|| RytmError::Profile("profile missing after save".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::profile::CipherOperation;
    use crate::cipher::store::{FileProfileStore, MemoryProfileStore};
    use mockito::{Mock, Server, ServerGuard};

    const PLAYER_SCRIPT: &str = concat!(
        r#"var Xy={abc:function(a){a.reverse()},xyz:function(a,b){a.splice(0,b)}};"#,
        r#"Abc=function(a){a=a.split("");Xy.xyz(a,3);Xy.abc(a);Xy.xyz(a,1);return a.join("")};"#,
        r#"c&&(c=Abc(decodeURIComponent(c)))"#,
    );

    fn landing(version: &str) -> String {
        format!(r#"<script>{{"jsUrl":"/s/player/{}/base.js"}}</script>"#, version)
    }

    async fn mock_player(server: &mut ServerGuard, version: &str, hits: usize) -> (Mock, Mock) {
        let landing_mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(landing(version))
            .expect_at_least(1)
            .create_async()
            .await;
        let script_mock = server
            .mock("GET", format!("/s/player/{}/base.js", version).as_str())
            .with_status(200)
            .with_body(PLAYER_SCRIPT)
            .expect(hits)
            .create_async()
            .await;
        (landing_mock, script_mock)
    }

    fn engine(server: &ServerGuard, store: Arc<dyn ProfileStore>, cooldown: Duration) -> CipherEngine {
        let config = ClientConfig::default()
            .with_base_url(&server.url())
            .with_max_retries(1)
            .with_extraction_cooldown(cooldown);
        let http = HttpClient::new(&config).unwrap();
        CipherEngine::new(http, &config, store)
    }

    #[tokio::test]
    async fn test_run_pipeline_stores_profile() {
        let mut server = Server::new_async().await;
        let (_landing, script) = mock_player(&mut server, "0ab1c2d3", 1).await;
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
        let engine = engine(&server, store.clone(), Duration::ZERO);

        let version = engine.run_pipeline().await.unwrap();
        assert_eq!(version, "0ab1c2d3");

        let profile = store.load().unwrap();
        assert_eq!(
            profile.operations(),
            &[
                CipherOperation::Splice(3),
                CipherOperation::Reverse,
                CipherOperation::Splice(1)
            ]
        );
        script.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_pipeline_persists_to_file() {
        let mut server = Server::new_async().await;
        let (_landing, _script) = mock_player(&mut server, "f1le", 1).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cipher.json");
        let engine = engine(
            &server,
            Arc::new(FileProfileStore::new(&path)),
            Duration::ZERO,
        );

        assert_eq!(engine.run_pipeline().await.unwrap(), "f1le");
        let reopened = FileProfileStore::new(&path);
        assert_eq!(reopened.load().unwrap().version(), "f1le");
        assert_eq!(engine.stored_profile().unwrap().operations().len(), 3);
    }

    #[tokio::test]
    async fn test_fresh_profile_skips_extraction() {
        let mut server = Server::new_async().await;
        let landing = server.mock("GET", "/").expect(0).create_async().await;
        let store = Arc::new(MemoryProfileStore::with_profile(
            CipherProfile::new("cached", vec![CipherOperation::Reverse]).unwrap(),
        ));
        let engine = engine(&server, store, Duration::ZERO);

        assert_eq!(engine.decipher("abc").await.unwrap(), "cba");
        landing.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_extraction() {
        let mut server = Server::new_async().await;
        let (_landing, script) = mock_player(&mut server, "v1", 1).await;
        let engine = Arc::new(engine(
            &server,
            Arc::new(MemoryProfileStore::new()),
            Duration::ZERO,
        ));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.current_profile().await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().version(), "v1");
        }
        script.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_extraction_keeps_prior_profile() {
        let mut server = Server::new_async().await;
        let _landing = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html>no script here</html>")
            .create_async()
            .await;
        let prior = CipherProfile::new("old", vec![CipherOperation::Swap(1)]).unwrap();
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::with_profile(prior));
        let engine = engine(&server, store.clone(), Duration::ZERO);

        let err = engine.force_refresh().await.unwrap_err();
        assert!(err.is_extraction_error());
        assert_eq!(store.load().unwrap().version(), "old");
    }

    #[tokio::test]
    async fn test_cooldown_blocks_back_to_back_runs() {
        let mut server = Server::new_async().await;
        let (_landing, script) = mock_player(&mut server, "v2", 1).await;
        let engine = engine(
            &server,
            Arc::new(MemoryProfileStore::new()),
            Duration::from_secs(60),
        );

        engine.force_refresh().await.unwrap();
        let err = engine.force_refresh().await.unwrap_err();
        assert!(matches!(err, RytmError::Cooldown));
        script.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_if_outdated_detects_new_version() {
        let mut server = Server::new_async().await;
        let (_landing, script) = mock_player(&mut server, "new", 1).await;
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::with_profile(
            CipherProfile::new("old", vec![CipherOperation::Reverse]).unwrap(),
        ));
        let engine = engine(&server, store.clone(), Duration::ZERO);

        let profile = engine.refresh_if_outdated().await.unwrap();
        assert_eq!(profile.version(), "new");
        assert_eq!(store.load().unwrap().version(), "new");

        // Same version now: no further script fetch
        let profile = engine.refresh_if_outdated().await.unwrap();
        assert_eq!(profile.version(), "new");
        script.assert_async().await;
    }

    #[tokio::test]
    async fn test_stale_profile_is_refreshed() {
        let mut server = Server::new_async().await;
        let (_landing, script) = mock_player(&mut server, "v3", 1).await;
        let stale = CipherProfile::with_timestamp(
            "v0",
            vec![CipherOperation::Reverse],
            Utc::now() - chrono::Duration::days(3),
        )
        .unwrap();
        let engine = engine(
            &server,
            Arc::new(MemoryProfileStore::with_profile(stale)),
            Duration::ZERO,
        );

        assert_eq!(engine.current_profile().await.unwrap().version(), "v3");
        script.assert_async().await;
    }
}
