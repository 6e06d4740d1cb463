//! Core domain types

pub mod song;

pub use song::{parse_duration_ms, Song};
