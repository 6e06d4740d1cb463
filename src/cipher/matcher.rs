//! First-match structural pattern matching over script text

use crate::error::{ExtractStep, RytmError};
use regex::Regex;
use tracing::debug;

/// Placeholder substituted with an escaped, previously discovered name
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Inclusive length window a capture must fall inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthFilter {
    pub min: usize,
    pub max: usize,
}

impl LengthFilter {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn accepts(&self, capture: &str) -> bool {
        let len = capture.chars().count();
        len >= self.min && len <= self.max
    }
}

/// A capture accepted by the matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Text of capture group 1
    pub value: String,
    /// Index of the candidate pattern that produced it
    pub pattern_index: usize,
}

/// Return the first acceptable capture (group 1) over `patterns` in priority order.
///
/// Without a filter the first structural match of the first matching pattern
/// wins. With a filter, a capture outside the window is skipped and the scan
/// continues with later matches of the same pattern, then with later patterns.
pub fn first_match(text: &str, patterns: &[Regex], filter: Option<LengthFilter>) -> Option<Match> {
    for (pattern_index, regex) in patterns.iter().enumerate() {
        for captures in regex.captures_iter(text) {
            let Some(group) = captures.get(1) else {
                continue;
            };
            let value = group.as_str();
            match filter {
                None => {
                    return Some(Match {
                        value: value.to_string(),
                        pattern_index,
                    })
                }
                Some(filter) if filter.accepts(value) => {
                    return Some(Match {
                        value: value.to_string(),
                        pattern_index,
                    })
                }
                Some(_) => {
                    debug!(
                        "Pattern {} capture '{}' rejected by length filter",
                        pattern_index + 1,
                        value
                    );
                }
            }
        }
    }
    None
}

/// An ordered list of candidate patterns for one extraction step
#[derive(Debug, Clone, Copy)]
pub struct PatternSet {
    pub step: ExtractStep,
    pub patterns: &'static [&'static str],
    pub filter: Option<LengthFilter>,
}

impl PatternSet {
    pub const fn new(
        step: ExtractStep,
        patterns: &'static [&'static str],
        filter: Option<LengthFilter>,
    ) -> Self {
        Self {
            step,
            patterns,
            filter,
        }
    }

    /// Compile the candidate list, substituting `key` for the name placeholder
    pub fn compile(&self, key: Option<&str>) -> Result<Vec<Regex>, RytmError> {
        let escaped = key.map(regex::escape);
        self.patterns
            .iter()
            .map(|template| {
                let source = match &escaped {
                    Some(name) => template.replace(NAME_PLACEHOLDER, name),
                    None => template.to_string(),
                };
                Regex::new(&source).map_err(RytmError::from)
            })
            .collect()
    }

    /// Run the step over `text`, failing with the step's named error on a miss
    pub fn find(&self, text: &str) -> Result<Match, RytmError> {
        self.find_keyed(text, None)
    }

    /// Run a step whose patterns are keyed to a previously discovered name
    pub fn find_keyed(&self, text: &str, key: Option<&str>) -> Result<Match, RytmError> {
        let patterns = self.compile(key)?;
        match first_match(text, &patterns, self.filter) {
            Some(found) => {
                debug!(
                    "Step {} matched with pattern {}/{}",
                    self.step,
                    found.pattern_index + 1,
                    patterns.len()
                );
                Ok(found)
            }
            None => Err(RytmError::Extract(self.step)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(sources: &[&str]) -> Vec<Regex> {
        sources.iter().map(|s| Regex::new(s).unwrap()).collect()
    }

    #[test]
    fn test_first_pattern_wins_over_better_later_pattern() {
        let patterns = compile(&[r"a=(\w+)", r"b=(\w+)"]);
        let found = first_match("b=second a=first", &patterns, None).unwrap();
        assert_eq!(found.value, "first");
        assert_eq!(found.pattern_index, 0);
    }

    #[test]
    fn test_no_match() {
        let patterns = compile(&[r"x=(\w+)"]);
        assert_eq!(first_match("a=1", &patterns, None), None);
    }

    #[test]
    fn test_unfiltered_accepts_first_structural_match() {
        let patterns = compile(&[r"n=(\w+)"]);
        let found = first_match("n=a n=abc", &patterns, None).unwrap();
        assert_eq!(found.value, "a");
    }

    #[test]
    fn test_filter_continues_past_rejected_capture() {
        let patterns = compile(&[r"n=(\w+)", r"m=(\w+)"]);
        let filter = Some(LengthFilter::new(2, 3));

        let found = first_match("n=a n=toolong n=ok", &patterns, filter).unwrap();
        assert_eq!(found.value, "ok");
        assert_eq!(found.pattern_index, 0);

        let found = first_match("n=a m=xyz", &patterns, filter).unwrap();
        assert_eq!(found.value, "xyz");
        assert_eq!(found.pattern_index, 1);
    }

    #[test]
    fn test_pattern_set_keyed_escapes_name() {
        const SET: PatternSet = PatternSet::new(
            ExtractStep::HelperBody,
            &[r"var {name}=\{([^}]*)\}"],
            None,
        );
        let found = SET.find_keyed("var $x={a:1}", Some("$x")).unwrap();
        assert_eq!(found.value, "a:1");

        let err = SET.find_keyed("var yy={a:1}", Some("$x")).unwrap_err();
        assert!(matches!(err, RytmError::Extract(ExtractStep::HelperBody)));
    }

    #[test]
    fn test_length_filter_counts_chars() {
        let filter = LengthFilter::new(2, 4);
        assert!(filter.accepts("ab"));
        assert!(filter.accepts("$a$b"));
        assert!(!filter.accepts("a"));
        assert!(!filter.accepts("abcde"));
    }
}
