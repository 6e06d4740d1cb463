//! Music platform API client and related functionality

pub mod client;
pub mod formats;
pub mod innertube;
pub mod music;

pub use crate::config::ClientIdentity;
pub use client::HttpClient;
pub use formats::{select_audio_stream, StreamCandidate, StreamLocator};
pub use innertube::{parse_songs, PlayerResponse, SearchResponse};
pub use music::MusicClient;
