use std::future::Future;

use crate::cache::QuestionCache;
use crate::error::AppError;
use crate::models::{DiscussionLink, ParsedQuestion};

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Builds independent fetchers, one per worker.
///
/// Each fetcher owns its own connection pool, so workers never contend on a
/// shared client and keep-alive pays off across one worker's sequential requests.
pub trait FetcherFactory: Send + Sync {
    type Fetcher: Fetcher + 'static;

    fn create(&self) -> Result<Self::Fetcher, AppError>;
}

/// Turns discussion-site HTML into structured data.
///
/// Parsing never fails: unrecognized pages degrade to placeholders.
pub trait DiscussionParser: Send + Sync {
    /// Parse one discussion page into a question.
    fn parse_discussion(&self, html: &str) -> ParsedQuestion;

    /// Anchors tagged as discussion links on a list page, in document order.
    fn discussion_links(&self, html: &str) -> Vec<DiscussionLink>;
}

/// Loads and persists the URL → question cache.
pub trait QuestionStore: Send + Sync {
    /// Load the cache. A missing or malformed cache loads as empty.
    fn load(&self) -> Result<QuestionCache, AppError>;

    /// Persist the whole cache.
    fn persist(&self, cache: &QuestionCache) -> Result<(), AppError>;
}

/// A no-op QuestionStore for runs without a cache file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl QuestionStore for NullStore {
    fn load(&self) -> Result<QuestionCache, AppError> {
        Ok(QuestionCache::new())
    }

    fn persist(&self, _cache: &QuestionCache) -> Result<(), AppError> {
        Ok(())
    }
}
