//! Ordered candidate patterns for each extraction step.
//!
//! Earlier entries are more specific. New platform variants are supported by
//! appending an entry to the relevant list.

use super::matcher::{LengthFilter, PatternSet};
use crate::error::ExtractStep;

/// Player script path in the landing document
pub const SCRIPT_PATH: PatternSet = PatternSet::new(
    ExtractStep::ScriptPath,
    &[
        r#""jsUrl"\s*:\s*"([^"]+?\.js)""#,
        r#""PLAYER_JS_URL"\s*:\s*"([^"]+?\.js)""#,
        r#"<script[^>]+src="([^"]*/s/player/[^"]+?\.js)""#,
    ],
    None,
);

/// Version segment of the player script path
pub const SCRIPT_VERSION: &str = r"/s/player/([a-zA-Z0-9_-]+)/";

/// Version reported when the script path carries no version segment
pub const UNKNOWN_VERSION: &str = "unknown";

/// Name of the signature decipher function
pub const SIG_FUNCTION: PatternSet = PatternSet::new(
    ExtractStep::SigFunction,
    &[
        r#"\b[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*([a-zA-Z0-9$]+)\("#,
        r#"\b[a-zA-Z0-9]+\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*([a-zA-Z0-9$]+)\("#,
        r#"\bm=([a-zA-Z0-9$]{2,})\(decodeURIComponent\(h\.s\)\)"#,
        r#"\bc&&\(c=([a-zA-Z0-9$]{2,})\(decodeURIComponent\(c\)\)"#,
        r#"(?:^|[^a-zA-Z0-9$.])([a-zA-Z0-9$]{2,})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)\s*;\s*[a-zA-Z0-9$]{2,}\.[a-zA-Z0-9$]+\(\s*a\s*,\s*\d+\s*\)"#,
        r#"(?:^|[^a-zA-Z0-9$.])([a-zA-Z0-9$]{2,})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)"#,
        r#"([a-zA-Z0-9$]+)\s*=\s*function\(\s*([a-zA-Z0-9$]+)\s*\)\s*\{\s*[a-zA-Z0-9$]+\s*=\s*[a-zA-Z0-9$]+\.split\(\s*""\s*\)"#,
    ],
    Some(LengthFilter::new(2, 4)),
);

/// Body of the decipher function, keyed to its name. Consumes one nested brace level.
pub const FUNCTION_BODY: PatternSet = PatternSet::new(
    ExtractStep::FunctionBody,
    &[
        r#"(?:^|[^a-zA-Z0-9$.]){name}\s*=\s*function\s*\(\s*[a-zA-Z0-9$]+\s*\)\s*\{((?:[^{}]|\{[^{}]*\})*)\}"#,
        r#"function\s+{name}\s*\(\s*[a-zA-Z0-9$]+\s*\)\s*\{((?:[^{}]|\{[^{}]*\})*)\}"#,
    ],
    None,
);

/// Name of the helper object the decipher function delegates to
pub const HELPER_NAME: PatternSet = PatternSet::new(
    ExtractStep::HelperName,
    &[
        r#";\s*([a-zA-Z0-9$]{2,3})\.[a-zA-Z0-9$]+\(\s*[a-zA-Z0-9$]+\s*,\s*\d+\s*\)"#,
        r#"([a-zA-Z0-9$]+)\.[a-zA-Z0-9$]+\(\s*[a-zA-Z0-9$]+\s*(?:,\s*\d+\s*)?\)"#,
    ],
    Some(LengthFilter::new(2, 3)),
);

/// Method table of the helper object, keyed to its name
pub const HELPER_BODY: PatternSet = PatternSet::new(
    ExtractStep::HelperBody,
    &[
        r#"var\s+{name}\s*=\s*\{((?:[^{}]|\{[^{}]*\})*)\}"#,
        r#"(?:^|[^a-zA-Z0-9$.]){name}\s*=\s*\{((?:[^{}]|\{[^{}]*\})*)\}"#,
    ],
    None,
);

/// One `name:function(..){..}` entry of the helper's method table
pub const HELPER_METHOD: &str =
    r#"([a-zA-Z0-9$]+)\s*:\s*function\s*\([^)]*\)\s*\{((?:[^{}]|\{[^{}]*\})*)\}"#;

/// Method body signatures of a first-element swap
pub const SWAP_SIGNATURES: &[&str] = &[
    r#"\[\s*0\s*\]\s*=\s*[a-zA-Z0-9$]+\s*\[\s*[a-zA-Z0-9$]+\s*%\s*[a-zA-Z0-9$]+\.length\s*\]"#,
    r#"\.splice\(\s*0\s*,\s*1\s*,\s*[a-zA-Z0-9$]+\.splice\("#,
];

/// Method body signatures of an array reverse
pub const REVERSE_SIGNATURES: &[&str] = &[r#"\.reverse\(\s*\)"#];

/// Method body signatures of a remove-prefix splice
pub const SPLICE_SIGNATURES: &[&str] = &[
    r#"\.splice\(\s*0\s*,\s*[a-zA-Z0-9$]+\s*\)"#,
    r#"\.splice\("#,
];

/// Ordered calls to the helper inside the decipher body, keyed to the helper name
pub const HELPER_CALL: &str =
    r#"(?:^|[^a-zA-Z0-9$.]){name}\.([a-zA-Z0-9$]+)\(\s*[a-zA-Z0-9$]+\s*(?:,\s*(\d+)\s*)?\)"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_pattern_sets_compile() {
        for set in [SCRIPT_PATH, SIG_FUNCTION] {
            assert!(set.compile(None).is_ok(), "{} failed to compile", set.step);
        }
        for set in [FUNCTION_BODY, HELPER_NAME, HELPER_BODY] {
            assert!(set.compile(Some("Ab$")).is_ok(), "{} failed to compile", set.step);
        }
        for source in SWAP_SIGNATURES
            .iter()
            .chain(REVERSE_SIGNATURES)
            .chain(SPLICE_SIGNATURES)
            .chain([&SCRIPT_VERSION, &HELPER_METHOD])
        {
            assert!(regex::Regex::new(source).is_ok(), "{} failed", source);
        }
        assert!(regex::Regex::new(&HELPER_CALL.replace("{name}", "Xy")).is_ok());
    }

    #[test]
    fn test_list_sizes() {
        assert_eq!(SCRIPT_PATH.patterns.len(), 3);
        assert_eq!(SIG_FUNCTION.patterns.len(), 7);
        assert_eq!(FUNCTION_BODY.patterns.len(), 2);
        assert_eq!(HELPER_NAME.patterns.len(), 2);
        assert_eq!(HELPER_BODY.patterns.len(), 2);
    }
}
