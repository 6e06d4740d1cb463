//! Offline media cache with storage-aware admission

pub mod content;
pub mod source;
pub mod staging;
pub mod storage;

pub use content::{CacheOutcome, ContentCache};
pub use source::{ResolvedStream, StreamSource};
pub use staging::StagingFile;
pub use storage::{FixedStorageProbe, FsStorageProbe, StorageProbe};
