//! Stream resolution seam between the protocol client and the content cache

use async_trait::async_trait;

/// A playable audio stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub url: String,
    pub mime_type: String,
    pub content_length: Option<u64>,
    /// Headers the media host expects on the download request
    pub headers: Vec<(String, String)>,
}

impl ResolvedStream {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
            content_length: None,
            headers: Vec::new(),
        }
    }
}

/// Anything that can turn a media id into a playable stream
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Resolve `id`, or `None` when no stream is available
    async fn resolve_audio(&self, id: &str) -> Option<ResolvedStream>;

    /// The media host refused a URL this source produced
    async fn report_rejected(&self, _id: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl StreamSource for Fixed {
        async fn resolve_audio(&self, id: &str) -> Option<ResolvedStream> {
            (id == "known").then(|| ResolvedStream::new("https://media.example/a", "audio/mp4"))
        }
    }

    #[test]
    fn test_default_rejection_hook_is_noop() {
        let source = Fixed;
        tokio_test::block_on(async {
            source.report_rejected("known").await;
            let stream = source.resolve_audio("known").await.unwrap();
            assert_eq!(stream.mime_type, "audio/mp4");
            assert!(stream.headers.is_empty());
            assert!(source.resolve_audio("other").await.is_none());
        });
    }
}
