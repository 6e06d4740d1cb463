//! Signature cipher extraction, storage and application

pub mod apply;
pub mod engine;
pub mod extract;
pub mod matcher;
pub mod patterns;
pub mod profile;
pub mod store;

pub use apply::decipher;
pub use engine::CipherEngine;
pub use extract::{extract_operations, CipherExtractor, ScriptLocation};
pub use matcher::{first_match, LengthFilter, Match, PatternSet};
pub use profile::{CipherOperation, CipherProfile, StoredProfile};
pub use store::{FileProfileStore, MemoryProfileStore, ProfileStore};
