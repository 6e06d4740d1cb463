//! Command line argument parsing

use crate::config::{CacheConfig, ClientConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// RYTM - music search, stream resolution and offline cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Cache directory
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cipher profile file (defaults to cipher.json in the cache directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Free space to keep on the cache device (e.g., 1GiB, 500MB)
    #[arg(long, global = true, value_name = "SIZE")]
    pub min_free: Option<String>,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, global = true, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// HTTP attempts for transient errors
    #[arg(long, global = true, default_value = "3")]
    pub retries: u32,

    /// Re-extract the cipher once the stored profile is older than this
    #[arg(long, global = true, value_name = "DURATION", default_value = "24h")]
    pub profile_max_age: humantime::Duration,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Search for songs
    Search {
        /// Free-text query
        query: String,
    },
    /// Print a playable audio URL
    Resolve {
        /// Media id or URL
        target: String,
    },
    /// Download a song into the cache
    Cache {
        /// Media id or URL
        target: String,
    },
    /// Delete a song from the cache
    Remove {
        /// Media id or URL
        target: String,
    },
    /// Show the cached size of one song, or of the whole cache
    Size {
        /// Media id or URL
        target: Option<String>,
    },
    /// Show the cipher profile, extracting one if needed
    Cipher {
        /// Re-extract even if the stored profile is fresh
        #[arg(long)]
        force: bool,
    },
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| CacheConfig::default().dir)
    }

    pub fn profile_path(&self) -> PathBuf {
        self.profile
            .clone()
            .unwrap_or_else(|| self.cache_dir().join("cipher.json"))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_timeout(self.timeout_duration())
            .with_max_retries(self.retries)
            .with_profile_max_age(self.profile_max_age.into())
    }

    pub fn cache_config(&self) -> CacheConfig {
        let config = CacheConfig::new(self.cache_dir());
        match self.min_free.as_deref().and_then(parse_size) {
            Some(bytes) => config.with_min_free_bytes(bytes),
            None => config,
        }
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

/// Parse a size such as `1GiB` or `500MB` into bytes
pub fn parse_size(size: &str) -> Option<u64> {
    let size = size.trim().to_uppercase();
    if size.is_empty() {
        return None;
    }

    let number_end = size
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .map(|(i, c)| i + c.len_utf8())
        .last()?;

    let number: f64 = size[..number_end].parse().ok()?;
    if number < 0.0 {
        return None;
    }

    let multiplier: u64 = match size[number_end..].trim() {
        "B" | "" => 1,
        "KB" => 1000,
        "KIB" => 1024,
        "MB" => 1000 * 1000,
        "MIB" => 1024 * 1024,
        "GB" => 1000 * 1000 * 1000,
        "GIB" => 1024 * 1024 * 1024,
        "TB" => 1000_u64.pow(4),
        "TIB" => 1024_u64.pow(4),
        _ => return None,
    };

    Some((number * multiplier as f64) as u64)
}
