//! Free-space probing

use std::path::Path;
use tracing::warn;

/// Reports free space on the device holding a directory
pub trait StorageProbe: Send + Sync {
    fn available_bytes(&self, dir: &Path) -> std::io::Result<u64>;
}

/// Probe backed by the filesystem's statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorageProbe;

impl StorageProbe for FsStorageProbe {
    fn available_bytes(&self, dir: &Path) -> std::io::Result<u64> {
        fs2::available_space(existing_ancestor(dir))
    }
}

/// Fixed answer, for tests and callers that manage space themselves
#[derive(Debug, Clone, Copy)]
pub struct FixedStorageProbe(pub u64);

impl StorageProbe for FixedStorageProbe {
    fn available_bytes(&self, _dir: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

/// Whether at least `floor` bytes are free. Fails open when space cannot be queried.
pub fn has_headroom(probe: &dyn StorageProbe, dir: &Path, floor: u64) -> bool {
    match probe.available_bytes(dir) {
        Ok(available) => available >= floor,
        Err(e) => {
            warn!("Could not query free space for {}: {}", dir.display(), e);
            true
        }
    }
}

/// The cache dir may not exist yet; statistics come from its nearest existing ancestor
fn existing_ancestor(dir: &Path) -> &Path {
    dir.ancestors()
        .find(|p| p.exists())
        .unwrap_or(dir)
}
