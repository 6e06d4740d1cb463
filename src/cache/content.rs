//! Content cache: one committed audio file per media id

use super::source::{ResolvedStream, StreamSource};
use super::staging::StagingFile;
use super::storage::{self, FsStorageProbe, StorageProbe};
use crate::config::CacheConfig;
use crate::core::Song;
use crate::error::RytmError;
use crate::utils::{audio_ext_from_mime, cache_file_name, cache_file_stem, is_audio_extension};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use futures_util::StreamExt;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of a [`ContentCache::cache`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    Success,
    /// Free space is below the configured floor; nothing was fetched
    StorageLow,
    Failed(String),
}

impl CacheOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CacheOutcome::Success)
    }
}

impl From<RytmError> for CacheOutcome {
    fn from(err: RytmError) -> Self {
        match err {
            RytmError::StorageLow => CacheOutcome::StorageLow,
            other => CacheOutcome::Failed(other.to_string()),
        }
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOutcome::Success => f.write_str("cached"),
            CacheOutcome::StorageLow => f.write_str("storage low"),
            CacheOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

type OutcomeFuture = BoxFuture<'static, CacheOutcome>;

struct Inner {
    config: CacheConfig,
    source: Arc<dyn StreamSource>,
    probe: Arc<dyn StorageProbe>,
    http: reqwest::Client,
    in_flight: Mutex<HashMap<String, WeakShared<OutcomeFuture>>>,
}

/// Local media cache with storage-aware admission.
///
/// A media id is cached exactly when its committed file exists. Downloads are
/// written to a staging file next to it and renamed into place once complete.
/// Concurrent requests for one id share a single download.
#[derive(Clone)]
pub struct ContentCache {
    inner: Arc<Inner>,
}

impl ContentCache {
    /// Create a cache that probes the real filesystem for free space
    pub fn new(config: CacheConfig, source: Arc<dyn StreamSource>) -> Result<Self, RytmError> {
        Self::with_probe(config, source, Arc::new(FsStorageProbe))
    }

    pub fn with_probe(
        config: CacheConfig,
        source: Arc<dyn StreamSource>,
        probe: Arc<dyn StorageProbe>,
    ) -> Result<Self, RytmError> {
        std::fs::create_dir_all(&config.dir)?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                source,
                probe,
                http,
                in_flight: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn dir(&self) -> &Path {
        &self.inner.config.dir
    }

    /// Whether a committed file exists for `id`
    pub fn is_cached(&self, id: &str) -> bool {
        self.inner.committed_path(id).is_some()
    }

    /// Path of the committed file for `id`, if cached
    pub fn path_of(&self, id: &str) -> Option<PathBuf> {
        self.inner.committed_path(id)
    }

    /// Size of the committed file for `id`
    pub fn size_of(&self, id: &str) -> Option<u64> {
        let path = self.inner.committed_path(id)?;
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    /// Total bytes held by committed files. Staging files are not counted.
    pub fn total_size(&self) -> u64 {
        self.inner
            .entries()
            .filter(|(path, _)| self.inner.is_committed_file(path))
            .map(|(_, len)| len)
            .sum()
    }

    /// Whether enough free space remains to admit new media
    pub fn has_headroom(&self) -> bool {
        self.inner.has_headroom()
    }

    /// Download and persist the audio for `song`.
    ///
    /// Callers asking for an id that is already being cached wait on the
    /// same download and receive the same outcome.
    pub async fn cache(&self, song: &Song) -> CacheOutcome {
        let id = song.id.clone();
        let shared = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match in_flight.get(&id).and_then(WeakShared::upgrade) {
                Some(existing) => {
                    debug!("Joining in-flight cache of {}", id);
                    existing
                }
                None => {
                    // Entries whose every caller went away are dead weight
                    in_flight.retain(|_, weak| weak.upgrade().is_some());

                    let inner = Arc::clone(&self.inner);
                    let key = id.clone();
                    let future: Shared<OutcomeFuture> = async move {
                        let outcome = inner.run(&key).await;
                        inner
                            .in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&key);
                        outcome
                    }
                    .boxed()
                    .shared();

                    if let Some(weak) = future.downgrade() {
                        in_flight.insert(id.clone(), weak);
                    }
                    future
                }
            }
        };

        shared.await
    }

    /// Like [`cache`](Self::cache), and records the outcome on `song`
    pub async fn cache_song(&self, song: &mut Song) -> CacheOutcome {
        let outcome = self.cache(song).await;
        song.apply_cache_outcome(&outcome);
        outcome
    }

    /// Delete the committed file and any staging leftover for `id`.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        let candidates = self
            .inner
            .committed_candidates(id)
            .chain(std::iter::once(self.inner.staging_path(id)));

        for path in candidates {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed = true;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        if removed {
            info!("Removed {} from cache", id);
        }
        removed
    }

    /// Delete staging files left behind by interrupted downloads.
    ///
    /// Downloads still in progress are left alone. Returns the number removed.
    pub fn sweep_orphans(&self) -> usize {
        let active: Vec<String> = {
            let in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            in_flight
                .iter()
                .filter(|(_, weak)| weak.upgrade().is_some())
                .map(|(id, _)| self.inner.staging_path(id))
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect()
        };

        let mut removed = 0;
        for (path, _) in self.inner.entries() {
            if !self.inner.is_staging_file(&path) {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if active.contains(&name) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove orphan {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Swept {} orphaned staging files", removed);
        }
        removed
    }

    /// Set the cache flag of each song from the directory contents
    pub fn annotate(&self, songs: &mut [Song]) {
        for song in songs.iter_mut() {
            song.is_cached = self.is_cached(&song.id);
        }
    }
}

impl Inner {
    async fn run(&self, id: &str) -> CacheOutcome {
        if self.find_committed(id).await.is_some() {
            debug!("{} already cached", id);
            return CacheOutcome::Success;
        }

        match self.admit_and_download(id).await {
            Ok(bytes) => {
                info!("Cached {} ({} bytes)", id, bytes);
                CacheOutcome::Success
            }
            Err(RytmError::StorageLow) => {
                info!("Not caching {}: free space below {} bytes", id, self.config.min_free_bytes);
                CacheOutcome::StorageLow
            }
            Err(e) => {
                warn!("Caching {} failed: {}", id, e);
                CacheOutcome::from(e)
            }
        }
    }

    async fn admit_and_download(&self, id: &str) -> Result<u64, RytmError> {
        if !self.check_headroom().await {
            return Err(RytmError::StorageLow);
        }
        let stream = self
            .source
            .resolve_audio(id)
            .await
            .ok_or(RytmError::NoStream)?;
        self.download(id, &stream).await
    }

    /// Free-space query on the blocking pool. Fails open like the probe itself.
    async fn check_headroom(&self) -> bool {
        let probe = Arc::clone(&self.probe);
        let dir = self.config.dir.clone();
        let floor = self.config.min_free_bytes;
        tokio::task::spawn_blocking(move || storage::has_headroom(probe.as_ref(), &dir, floor))
            .await
            .unwrap_or(true)
    }

    /// Async twin of [`committed_path`](Self::committed_path)
    async fn find_committed(&self, id: &str) -> Option<PathBuf> {
        for path in self.committed_candidates(id) {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.is_file() && meta.len() > 0 {
                    return Some(path);
                }
            }
        }
        None
    }

    async fn download(&self, id: &str, stream: &ResolvedStream) -> Result<u64, RytmError> {
        let mut request = self.http.get(&stream.url);
        for (name, value) in &stream.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            self.source.report_rejected(id).await;
            return Err(RytmError::fetch("media", "HTTP 403 Forbidden"));
        }
        if !status.is_success() {
            return Err(RytmError::fetch("media", format!("HTTP {}", status)));
        }

        let mut staging = StagingFile::create(self.staging_path(id)).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            staging.write_all(&chunk?).await?;
        }

        let written = staging.written();
        if let Some(expected) = stream.content_length {
            if expected != written {
                return Err(RytmError::CacheFailed(format!(
                    "size mismatch: expected {} bytes, got {}",
                    expected, written
                )));
            }
        }

        let dest = self
            .config
            .dir
            .join(cache_file_name(id, audio_ext_from_mime(&stream.mime_type)));
        staging.commit(&dest).await?;
        Ok(written)
    }

    fn has_headroom(&self) -> bool {
        storage::has_headroom(
            self.probe.as_ref(),
            &self.config.dir,
            self.config.min_free_bytes,
        )
    }

    fn staging_path(&self, id: &str) -> PathBuf {
        self.config
            .dir
            .join(cache_file_name(id, &self.config.staging_extension))
    }

    fn committed_candidates<'a>(&'a self, id: &str) -> impl Iterator<Item = PathBuf> + 'a {
        let stem = cache_file_stem(id);
        crate::utils::AUDIO_EXTENSIONS
            .iter()
            .map(move |ext| self.config.dir.join(format!("{}.{}", stem, ext)))
    }

    /// A zero-length file is never a committed entry
    fn committed_path(&self, id: &str) -> Option<PathBuf> {
        self.committed_candidates(id).find(|path| {
            std::fs::metadata(path)
                .map(|m| m.is_file() && m.len() > 0)
                .unwrap_or(false)
        })
    }

    fn is_staging_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy() == self.config.staging_extension.as_str())
            .unwrap_or(false)
    }

    fn is_committed_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| is_audio_extension(&ext.to_string_lossy()))
            .unwrap_or(false)
    }

    /// Regular files directly under the cache directory with their sizes
    fn entries(&self) -> impl Iterator<Item = (PathBuf, u64)> {
        WalkDir::new(&self.config.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let len = entry.metadata().ok()?.len();
                Some((entry.into_path(), len))
            })
    }
}
