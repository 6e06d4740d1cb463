//! Output formatting and spinner feedback

use crate::cache::CacheOutcome;
use crate::cipher::CipherProfile;
use crate::cli::args::VerbosityLevel;
use crate::core::Song;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Output formatter for rytm
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Start a spinner for a network-bound step. Hidden in quiet mode.
    pub fn spinner(&self, message: &str) -> ProgressBar {
        if self.verbosity == VerbosityLevel::Quiet {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "info:".cyan().bold(), message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "ok:".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print search results, one song per line
    pub fn print_songs(&self, songs: &[Song]) {
        if songs.is_empty() {
            self.warning("No results");
            return;
        }

        for song in songs {
            let mut line = format!(
                "{}  {} - {}",
                song.id.dimmed(),
                song.title.bold(),
                song.artist
            );
            if song.duration_ms > 0 {
                line.push_str(&format!(" [{}]", song.duration_label()));
            }
            if song.is_cached {
                line.push_str(&format!(" {}", "(cached)".green()));
            }
            println!("{}", line);

            if self.verbosity == VerbosityLevel::Verbose {
                if let Some(album_id) = &song.album_id {
                    println!("    album: {}", album_id);
                }
                if let Some(thumbnail) = &song.thumbnail_url {
                    println!("    thumbnail: {}", thumbnail);
                }
            }
        }
    }

    /// Print the outcome of a cache request
    pub fn print_cache_outcome(&self, id: &str, outcome: &CacheOutcome, size: Option<u64>) {
        match outcome {
            CacheOutcome::Success => {
                let size = size.map(|s| format!(" ({})", format_bytes(s))).unwrap_or_default();
                self.success(&format!("{} cached{}", id, size));
            }
            CacheOutcome::StorageLow => {
                self.warning(&format!("{} not cached: storage low", id))
            }
            CacheOutcome::Failed(reason) => self.error(&format!("{} not cached: {}", id, reason)),
        }
    }

    /// Print a cipher profile summary
    pub fn print_profile(&self, profile: &CipherProfile) {
        println!("{} {}", "version:".bold(), profile.version());
        println!(
            "{} {}",
            "updated:".bold(),
            profile.updated_at().format("%Y-%m-%d %H:%M:%S UTC")
        );
        let operations: Vec<String> = profile.operations().iter().map(|op| op.to_string()).collect();
        println!("{} {}", "operations:".bold(), operations.join(" "));
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = (bytes_f64.ln() / THRESHOLD.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f64 / THRESHOLD.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", value, UNITS[exp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1 << 30), "1.0 GB");
        assert_eq!(format_bytes(u64::MAX), "16777216.0 TB");
    }

    #[test]
    fn test_quiet_spinner_is_hidden() {
        let formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        let spinner = formatter.spinner("working");
        assert!(spinner.is_hidden());
        spinner.finish_and_clear();
    }

    #[test]
    fn test_print_helpers_do_not_panic() {
        let formatter = OutputFormatter::new(VerbosityLevel::Verbose);
        let mut song = Song::new("id1", "Title", "Artist").with_duration_ms(61_000);
        song.is_cached = true;
        formatter.print_songs(&[song]);
        formatter.print_songs(&[]);
        formatter.print_cache_outcome("id1", &CacheOutcome::Success, Some(2048));
        formatter.print_cache_outcome("id1", &CacheOutcome::StorageLow, None);
        formatter.print_cache_outcome("id1", &CacheOutcome::Failed("x".into()), None);
    }
}
