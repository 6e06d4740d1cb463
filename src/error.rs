//! Error types for rytm

use std::fmt;
use thiserror::Error;

/// Named step of the cipher extraction pipeline that found no usable match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStep {
    ScriptPath,
    SigFunction,
    FunctionBody,
    HelperName,
    HelperBody,
    NoOperationsIdentified,
    EmptySequence,
}

impl ExtractStep {
    /// Stable step name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractStep::ScriptPath => "script-path",
            ExtractStep::SigFunction => "sig-function",
            ExtractStep::FunctionBody => "function-body",
            ExtractStep::HelperName => "helper-name",
            ExtractStep::HelperBody => "helper-body",
            ExtractStep::NoOperationsIdentified => "no-operations-identified",
            ExtractStep::EmptySequence => "empty-sequence",
        }
    }
}

impl fmt::Display for ExtractStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for rytm operations
#[derive(Debug, Error)]
pub enum RytmError {
    #[error("Fetch error ({stage}): {reason}")]
    Fetch { stage: &'static str, reason: String },

    #[error("Extract error: {0}")]
    Extract(ExtractStep),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage low")]
    StorageLow,

    #[error("Cache failed: {0}")]
    CacheFailed(String),

    #[error("Not playable: {0}")]
    Unplayable(String),

    #[error("No suitable stream found")]
    NoStream,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Cipher profile error: {0}")]
    Profile(String),

    #[error("Cipher extraction is cooling down")]
    Cooldown,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl RytmError {
    /// Shorthand for a fetch failure at a named stage
    pub fn fetch(stage: &'static str, reason: impl fmt::Display) -> Self {
        RytmError::Fetch {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RytmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RytmError::Fetch { .. } => true,
            _ => false,
        }
    }

    /// Check if error came out of the cipher extraction pipeline
    pub fn is_extraction_error(&self) -> bool {
        matches!(
            self,
            RytmError::Extract(_) | RytmError::Fetch { stage: "landing" | "script", .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_step_names() {
        assert_eq!(ExtractStep::ScriptPath.to_string(), "script-path");
        assert_eq!(ExtractStep::SigFunction.to_string(), "sig-function");
        assert_eq!(
            ExtractStep::NoOperationsIdentified.to_string(),
            "no-operations-identified"
        );
        assert_eq!(
            RytmError::Extract(ExtractStep::EmptySequence).to_string(),
            "Extract error: empty-sequence"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(RytmError::Extract(ExtractStep::HelperBody).is_extraction_error());
        assert!(RytmError::fetch("landing", "timeout").is_extraction_error());
        assert!(!RytmError::fetch("search", "timeout").is_extraction_error());
        assert!(RytmError::fetch("player", "503").is_retryable());
        assert!(!RytmError::StorageLow.is_retryable());
    }
}
