//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::QuestionCache;
use crate::error::AppError;
use crate::models::{DiscussionLink, ParsedChoice, ParsedQuestion};
use crate::traits::{DiscussionParser, Fetcher, FetcherFactory, QuestionStore};

/// URL → canned body, or an error message surfaced as `HttpError`.
pub type Pages = HashMap<String, Result<String, String>>;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher answering from a URL table or a response queue.
#[derive(Clone, Default)]
pub struct MockFetcher {
    /// When non-empty, every fetch is answered from here; unknown URLs are 404s.
    pages: Arc<Pages>,
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    pub fn with_pages(pages: Pages) -> Self {
        Self {
            pages: Arc::new(pages),
            ..Self::default()
        }
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        if !self.pages.is_empty() {
            return match self.pages.get(url) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(msg)) => Err(AppError::HttpError(msg.clone())),
                None => Err(AppError::HttpError(format!("HTTP 404 for {url}"))),
            };
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockFetcherFactory
// ---------------------------------------------------------------------------

/// Mock factory handing every worker a fetcher over the same URL table.
///
/// All created fetchers share one call log.
#[derive(Clone)]
pub struct MockFetcherFactory {
    template: MockFetcher,
    created: Arc<AtomicUsize>,
    create_error: Arc<Mutex<Option<AppError>>>,
}

impl MockFetcherFactory {
    pub fn new(pages: Pages) -> Self {
        Self {
            template: MockFetcher::with_pages(pages),
            created: Arc::new(AtomicUsize::new(0)),
            create_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_create_error(error: AppError) -> Self {
        let factory = Self::new(Pages::new());
        *factory.create_error.lock().unwrap() = Some(error);
        factory
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.template.calls()
    }
}

impl FetcherFactory for MockFetcherFactory {
    type Fetcher = MockFetcher;

    fn create(&self) -> Result<MockFetcher, AppError> {
        if let Some(e) = self.create_error.lock().unwrap().take() {
            return Err(e);
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.template.clone())
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Mock parser over a line-based fake markup.
///
/// List pages: one `href|text` anchor per line.
/// Discussion pages: the whole body becomes the question text, with choices
/// A (correct) and B.
#[derive(Clone, Default)]
pub struct MockParser;

impl DiscussionParser for MockParser {
    fn parse_discussion(&self, html: &str) -> ParsedQuestion {
        ParsedQuestion {
            text: html.trim().to_string(),
            choices: vec![
                ParsedChoice::new(Some("A".into()), "first", true),
                ParsedChoice::new(Some("B".into()), "second", false),
            ],
            explanation: None,
            raw_html: Some(html.to_string()),
            q_index: 1,
        }
    }

    fn discussion_links(&self, html: &str) -> Vec<DiscussionLink> {
        html.lines()
            .filter_map(|line| line.trim().split_once('|'))
            .map(|(href, text)| DiscussionLink::new(href, text))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock store that records every persisted snapshot.
#[derive(Clone, Default)]
pub struct MockStore {
    initial: Arc<Mutex<QuestionCache>>,
    pub snapshots: Arc<Mutex<Vec<QuestionCache>>>,
    persist_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    /// Empty store — nothing cached yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: QuestionCache) -> Self {
        Self {
            initial: Arc::new(Mutex::new(cache)),
            ..Self::default()
        }
    }

    /// The next persist fails once with `error`.
    pub fn with_persist_error(error: AppError) -> Self {
        let store = Self::default();
        *store.persist_error.lock().unwrap() = Some(error);
        store
    }

    pub fn persist_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

impl QuestionStore for MockStore {
    fn load(&self) -> Result<QuestionCache, AppError> {
        Ok(self.initial.lock().unwrap().clone())
    }

    fn persist(&self, cache: &QuestionCache) -> Result<(), AppError> {
        if let Some(e) = self.persist_error.lock().unwrap().take() {
            return Err(e);
        }
        self.snapshots.lock().unwrap().push(cache.clone());
        Ok(())
    }
}
