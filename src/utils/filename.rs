//! Safe cache file naming

/// Turn a media id into a file stem that cannot escape the cache directory.
///
/// Platform ids are already `[A-Za-z0-9_-]`; anything else is replaced with `_`.
pub fn cache_file_stem(id: &str) -> String {
    let stem: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

/// `stem.extension`, tolerating a leading dot on the extension
pub fn cache_file_name(id: &str, extension: &str) -> String {
    format!(
        "{}.{}",
        cache_file_stem(id),
        extension.trim_start_matches('.')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_stem() {
        assert_eq!(cache_file_stem("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(cache_file_stem("a-b_c"), "a-b_c");
        assert_eq!(cache_file_stem("../etc/passwd"), "___etc_passwd");
        assert_eq!(cache_file_stem(""), "_");
    }

    #[test]
    fn test_cache_file_name() {
        assert_eq!(cache_file_name("abc", "m4a"), "abc.m4a");
        assert_eq!(cache_file_name("abc", ".part"), "abc.part");
    }
}
