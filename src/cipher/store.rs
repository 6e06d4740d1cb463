//! Profile persistence

use super::profile::{CipherProfile, StoredProfile};
use crate::error::RytmError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, warn};

/// Storage for the single current cipher profile.
///
/// Readers always observe a complete profile: `save` swaps the whole value.
pub trait ProfileStore: Send + Sync {
    /// Current profile, if any
    fn load(&self) -> Option<Arc<CipherProfile>>;

    /// Replace the current profile
    fn save(&self, profile: CipherProfile) -> Result<(), RytmError>;

    fn is_present(&self) -> bool {
        self.load().is_some()
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryProfileStore {
    current: RwLock<Option<Arc<CipherProfile>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `profile`
    pub fn with_profile(profile: CipherProfile) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(profile))),
        }
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> Option<Arc<CipherProfile>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, profile: CipherProfile) -> Result<(), RytmError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(profile));
        Ok(())
    }
}

/// Store backed by a small JSON document on disk.
///
/// The file is read once, lazily, on first use. Writes go to a temporary file
/// in the same directory which is then renamed over the target, so a crash
/// never leaves a torn record.
pub struct FileProfileStore {
    path: PathBuf,
    loaded: OnceLock<()>,
    current: RwLock<Option<Arc<CipherProfile>>>,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: OnceLock::new(),
            current: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_loaded(&self) {
        self.loaded.get_or_init(|| {
            let profile = match read_profile(&self.path) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!("Ignoring unreadable cipher profile {}: {}", self.path.display(), e);
                    None
                }
            };
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if current.is_none() {
                *current = profile.map(Arc::new);
            }
        });
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self) -> Option<Arc<CipherProfile>> {
        self.ensure_loaded();
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, profile: CipherProfile) -> Result<(), RytmError> {
        self.ensure_loaded();
        write_profile(&self.path, &profile)?;
        debug!(
            "Saved cipher profile {} to {}",
            profile.version(),
            self.path.display()
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(profile));
        Ok(())
    }
}

fn read_profile(path: &Path) -> Result<Option<CipherProfile>, RytmError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let stored: StoredProfile = serde_json::from_slice(&data)?;
    CipherProfile::try_from(stored).map(Some)
}

fn write_profile(path: &Path, profile: &CipherProfile) -> Result<(), RytmError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, &StoredProfile::from(profile))?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| RytmError::IoError(e.error))?;
    Ok(())
}
