use crate::error::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Page retrieval and link extraction, as seen by the traversal engine.
///
/// Implementations are called concurrently from every worker, each with its
/// own URL. Any error is treated as "this page has no usable links".
pub trait LinkExtractor: Send + Sync + 'static {
    fn extract_links(&self, url: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Page metadata such as the title. Not used by the traversal itself.
    fn extract_metadata(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<BTreeMap<String, String>>> + Send {
        let _ = url;
        async { Ok(BTreeMap::new()) }
    }
}

impl<E: LinkExtractor> LinkExtractor for Arc<E> {
    fn extract_links(&self, url: &str) -> impl Future<Output = Result<Vec<String>>> + Send {
        (**self).extract_links(url)
    }

    fn extract_metadata(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<BTreeMap<String, String>>> + Send {
        (**self).extract_metadata(url)
    }
}
