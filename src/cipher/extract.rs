//! Runtime cipher extraction from the platform's player script.
//!
//! The pipeline is a chain of pattern steps, each narrowing the text the next
//! one searches:
//!
//! 1. landing document -> player script path and version
//! 2. script -> decipher function name
//! 3. script -> decipher function body
//! 4. body -> helper object name
//! 5. script -> helper method table
//! 6. method table -> operation kind per method
//! 7. body -> ordered helper calls, mapped through step 6
//!
//! Every step fails with its own [`ExtractStep`] so a broken platform update
//! can be traced to the exact pattern list that needs a new entry.

use super::matcher::NAME_PLACEHOLDER;
use super::patterns;
use super::profile::{CipherOperation, CipherProfile};
use crate::config::ClientConfig;
use crate::error::{ExtractStep, RytmError};
use crate::platform::client::HttpClient;
use moka::future::Cache;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Location of the player script referenced by the landing document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocation {
    pub url: String,
    pub version: String,
}

/// Downloads the landing document and player script and derives a profile
#[derive(Clone)]
pub struct CipherExtractor {
    http: HttpClient,
    web_base: String,
    scripts: Cache<String, Arc<String>>,
}

impl CipherExtractor {
    /// Create a new extractor
    pub fn new(http: HttpClient, config: &ClientConfig) -> Self {
        Self {
            http,
            web_base: config.web_base.clone(),
            scripts: Cache::builder()
                .time_to_live(config.script_cache_ttl)
                .max_capacity(4)
                .build(),
        }
    }

    /// Fetch the landing document
    pub async fn fetch_landing(&self) -> Result<String, RytmError> {
        let url = format!("{}/", self.web_base);
        debug!("Fetching landing document: {}", url);
        self.http.fetch_text(&url, "landing").await
    }

    /// Locate the player script referenced by the landing document
    pub fn locate_script(&self, landing: &str) -> Result<ScriptLocation, RytmError> {
        locate_script(&self.web_base, landing)
    }

    /// Version of the player script the landing document currently references
    pub async fn current_version(&self) -> Result<String, RytmError> {
        let landing = self.fetch_landing().await?;
        Ok(self.locate_script(&landing)?.version)
    }

    /// Fetch a player script, memoized by URL
    pub async fn fetch_script(&self, url: &str) -> Result<Arc<String>, RytmError> {
        if let Some(script) = self.scripts.get(url).await {
            debug!("Player script cache hit: {}", url);
            return Ok(script);
        }

        let script = Arc::new(self.http.fetch_text(url, "script").await?);
        self.scripts.insert(url.to_string(), script.clone()).await;
        Ok(script)
    }

    /// Run the full pipeline and produce a fresh profile
    pub async fn extract(&self) -> Result<CipherProfile, RytmError> {
        let landing = self.fetch_landing().await?;
        let location = self.locate_script(&landing)?;
        info!(
            "Extracting cipher from player script {} ({})",
            location.version, location.url
        );

        let script = self.fetch_script(&location.url).await?;
        let operations = extract_operations(&script)?;
        info!(
            "Extracted {} cipher operations for version {}",
            operations.len(),
            location.version
        );

        CipherProfile::new(location.version, operations)
    }
}

/// Find the player script path in a landing document and resolve it against `base`
pub fn locate_script(base: &str, landing: &str) -> Result<ScriptLocation, RytmError> {
    let found = patterns::SCRIPT_PATH.find(landing)?;
    let path = found.value.replace("\\/", "/");

    let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))?;
    let url = base.join(&path)?.to_string();
    let version = script_version(&path);

    debug!("Located player script {} (version {})", url, version);
    Ok(ScriptLocation { url, version })
}

/// Extract the version segment of a player script path
pub fn script_version(path: &str) -> String {
    Regex::new(patterns::SCRIPT_VERSION)
        .ok()
        .and_then(|re| re.captures(path))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| patterns::UNKNOWN_VERSION.to_string())
}

/// Derive the ordered operation list from a player script
pub fn extract_operations(script: &str) -> Result<Vec<CipherOperation>, RytmError> {
    let function_name = find_sig_function_name(script)?;
    debug!("Decipher function: {}", function_name);

    let body = find_function_body(script, &function_name)?;
    let helper = find_helper_name(&body)?;
    debug!("Helper object: {}", helper);

    let helper_body = find_helper_body(script, &helper)?;
    let methods = classify_methods(&helper_body)?;
    if methods.is_empty() {
        return Err(RytmError::Extract(ExtractStep::NoOperationsIdentified));
    }

    let operations = call_sequence(&body, &helper, &methods)?;
    if operations.is_empty() {
        return Err(RytmError::Extract(ExtractStep::EmptySequence));
    }
    Ok(operations)
}

pub fn find_sig_function_name(script: &str) -> Result<String, RytmError> {
    Ok(patterns::SIG_FUNCTION.find(script)?.value)
}

pub fn find_function_body(script: &str, name: &str) -> Result<String, RytmError> {
    Ok(patterns::FUNCTION_BODY.find_keyed(script, Some(name))?.value)
}

pub fn find_helper_name(body: &str) -> Result<String, RytmError> {
    Ok(patterns::HELPER_NAME.find(body)?.value)
}

pub fn find_helper_body(script: &str, helper: &str) -> Result<String, RytmError> {
    Ok(patterns::HELPER_BODY.find_keyed(script, Some(helper))?.value)
}

/// Map each helper method to the operation its body performs.
///
/// Swap signatures are tested first since a swap body also contains the
/// generic splice signature. Methods that match nothing are left out.
pub fn classify_methods(helper_body: &str) -> Result<HashMap<String, CipherOperation>, RytmError> {
    let entry = Regex::new(patterns::HELPER_METHOD)?;
    let classes = [
        (compile_all(patterns::SWAP_SIGNATURES)?, CipherOperation::Swap(0)),
        (compile_all(patterns::REVERSE_SIGNATURES)?, CipherOperation::Reverse),
        (compile_all(patterns::SPLICE_SIGNATURES)?, CipherOperation::Splice(0)),
    ];

    let mut methods = HashMap::new();
    for captures in entry.captures_iter(helper_body) {
        let (Some(name), Some(body)) = (captures.get(1), captures.get(2)) else {
            continue;
        };

        let kind = classes
            .iter()
            .find(|(signatures, _)| signatures.iter().any(|re| re.is_match(body.as_str())))
            .map(|(_, kind)| *kind);

        match kind {
            Some(kind) => {
                debug!("Helper method {} -> {}", name.as_str(), kind.name());
                methods.insert(name.as_str().to_string(), kind);
            }
            None => debug!("Helper method {} not recognized", name.as_str()),
        }
    }
    Ok(methods)
}

/// Ordered helper calls in the decipher body, resolved to operations
pub fn call_sequence(
    body: &str,
    helper: &str,
    methods: &HashMap<String, CipherOperation>,
) -> Result<Vec<CipherOperation>, RytmError> {
    let call = Regex::new(&patterns::HELPER_CALL.replace(NAME_PLACEHOLDER, &regex::escape(helper)))?;

    let mut operations = Vec::new();
    for captures in call.captures_iter(body) {
        let Some(method) = captures.get(1) else {
            continue;
        };
        let Some(kind) = methods.get(method.as_str()) else {
            warn!("Call to unclassified helper method {}", method.as_str());
            continue;
        };
        let param = match captures.get(2) {
            None => 0,
            Some(literal) => match literal.as_str().parse::<usize>() {
                Ok(param) => param,
                Err(e) => {
                    warn!("Skipping {} call with argument {}: {}", method.as_str(), literal.as_str(), e);
                    continue;
                }
            },
        };
        operations.push(kind.with_param(param));
    }
    Ok(operations)
}

fn compile_all(sources: &[&str]) -> Result<Vec<Regex>, RytmError> {
    sources
        .iter()
        .map(|s| Regex::new(s).map_err(RytmError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = concat!(
        r#"var Xy={abc:function(a){a.reverse()},"#,
        r#"xyz:function(a,b){a.splice(0,b)},"#,
        r#"qrs:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}};"#,
        r#"Abc=function(a){a=a.split("");Xy.xyz(a,3);Xy.abc(a);Xy.xyz(a,1);return a.join("")};"#,
        r#"c&&(c=Abc(decodeURIComponent(c)))"#,
    );

    const LANDING: &str = r#"<html><script>ytcfg.set({"jsUrl":"\/s\/player\/0ab1c2d3\/player_ias.vflset\/en_US\/base.js"});</script></html>"#;

    #[test]
    fn test_locate_script_resolves_relative_path() {
        let location = locate_script("https://music.example.com/", LANDING).unwrap();
        assert_eq!(
            location.url,
            "https://music.example.com/s/player/0ab1c2d3/player_ias.vflset/en_US/base.js"
        );
        assert_eq!(location.version, "0ab1c2d3");
    }

    #[test]
    fn test_locate_script_falls_back_to_script_tag() {
        let landing = r#"<script nonce="x" src="/s/player/ffee0011/base.js"></script>"#;
        let location = locate_script("https://music.example.com", landing).unwrap();
        assert_eq!(location.version, "ffee0011");
    }

    #[test]
    fn test_locate_script_missing() {
        let err = locate_script("https://music.example.com", "<html></html>").unwrap_err();
        assert!(matches!(err, RytmError::Extract(ExtractStep::ScriptPath)));
    }

    #[test]
    fn test_script_version_unknown() {
        assert_eq!(script_version("/static/base.js"), "unknown");
    }

    #[test]
    fn test_sig_function_name() {
        assert_eq!(find_sig_function_name(SCRIPT).unwrap(), "Abc");
    }

    #[test]
    fn test_function_body_and_helper_name() {
        let body = find_function_body(SCRIPT, "Abc").unwrap();
        assert_eq!(
            body,
            r#"a=a.split("");Xy.xyz(a,3);Xy.abc(a);Xy.xyz(a,1);return a.join("")"#
        );
        assert_eq!(find_helper_name(&body).unwrap(), "Xy");
    }

    #[test]
    fn test_classify_methods() {
        let helper_body = find_helper_body(SCRIPT, "Xy").unwrap();
        let methods = classify_methods(&helper_body).unwrap();
        assert_eq!(methods.get("abc"), Some(&CipherOperation::Reverse));
        assert_eq!(methods.get("xyz"), Some(&CipherOperation::Splice(0)));
        assert_eq!(methods.get("qrs"), Some(&CipherOperation::Swap(0)));
    }

    #[test]
    fn test_extract_operations_from_fixture() {
        let ops = extract_operations(SCRIPT).unwrap();
        assert_eq!(
            ops,
            vec![
                CipherOperation::Splice(3),
                CipherOperation::Reverse,
                CipherOperation::Splice(1),
            ]
        );
    }

    #[test]
    fn test_dollar_names_are_escaped() {
        let script = concat!(
            r#"var $q={r:function(a){a.reverse()},s:function(a,b){a.splice(0,b)}};"#,
            r#"$fn=function(a){a=a.split("");$q.s(a,2);$q.r(a);return a.join("")};"#,
            r#"c&&(c=$fn(decodeURIComponent(c)))"#,
        );
        let ops = extract_operations(script).unwrap();
        assert_eq!(ops, vec![CipherOperation::Splice(2), CipherOperation::Reverse]);
    }

    #[test]
    fn test_missing_helper_body_names_step() {
        let script = concat!(
            r#"Abc=function(a){a=a.split("");Xy.xyz(a,3);return a.join("")};"#,
            r#"c&&(c=Abc(decodeURIComponent(c)))"#,
        );
        let err = extract_operations(script).unwrap_err();
        assert!(matches!(err, RytmError::Extract(ExtractStep::HelperBody)));
    }

    #[test]
    fn test_unrecognized_methods_report_no_operations() {
        let script = concat!(
            r#"var Xy={abc:function(a){return a}};"#,
            r#"Abc=function(a){a=a.split("");Xy.abc(a,3);return a.join("")};"#,
            r#"c&&(c=Abc(decodeURIComponent(c)))"#,
        );
        let err = extract_operations(script).unwrap_err();
        assert!(matches!(
            err,
            RytmError::Extract(ExtractStep::NoOperationsIdentified)
        ));
    }

    #[test]
    fn test_oversized_argument_is_skipped() {
        let body = r#"a=a.split("");Xy.xyz(a,99999999999999999999999);Xy.abc(a);Xy.qrs(a,2);return a.join("")"#;
        let methods = HashMap::from([
            ("abc".to_string(), CipherOperation::Reverse),
            ("xyz".to_string(), CipherOperation::Splice(0)),
            ("qrs".to_string(), CipherOperation::Swap(0)),
        ]);
        let ops = call_sequence(body, "Xy", &methods).unwrap();
        assert_eq!(ops, vec![CipherOperation::Reverse, CipherOperation::Swap(2)]);
    }

    #[test]
    fn test_no_sig_function() {
        let err = extract_operations("var x=1;").unwrap_err();
        assert!(matches!(err, RytmError::Extract(ExtractStep::SigFunction)));
    }
}
