//! # rytm - Rust music client
//!
//! Search a music platform, resolve playable audio streams and keep an
//! offline cache of them.
//!
//! ## Features
//!
//! - Runtime signature cipher extraction from the platform's player script
//! - Drift-tolerant parsing of search and player responses
//! - Audio stream selection preferring broadly compatible containers
//! - Offline cache with free-space admission and atomic commits
//!
//! ## Example
//!
//! ```rust,no_run
//! use rytm::{CacheConfig, ClientConfig, ContentCache, FileProfileStore, MusicClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileProfileStore::new("cipher.json"));
//!     let client = MusicClient::new(ClientConfig::default(), store)?;
//!
//!     let songs = client.search("daft punk").await;
//!     if let Some(song) = songs.first() {
//!         let cache = ContentCache::new(CacheConfig::new("./music"), Arc::new(client.clone()))?;
//!         println!("{}: {}", song.title, cache.cache(song).await);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cipher;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use cache::{CacheOutcome, ContentCache, StreamSource};
pub use cipher::{CipherEngine, CipherOperation, CipherProfile, FileProfileStore, ProfileStore};
pub use config::{CacheConfig, ClientConfig};
pub use core::Song;
pub use error::RytmError;
pub use platform::MusicClient;

/// Result type alias for rytm operations
pub type Result<T> = std::result::Result<T, RytmError>;
