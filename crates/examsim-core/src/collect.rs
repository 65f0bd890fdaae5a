//! Concurrent discovery of discussion URLs from paginated list pages.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::AppError;
use crate::models::DiscussionLink;
use crate::throttle::{ThrottleConfig, ThrottledFetcher};
use crate::traits::{DiscussionParser, Fetcher, FetcherFactory};

/// Default site root for list pages.
pub const DEFAULT_BASE_URL: &str = "https://www.examtopics.com";

/// Discussion URLs found and list pages that could not be processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectOutcome {
    /// Unique, in completion order of their list pages.
    pub urls: Vec<String>,
    pub failed_pages: Vec<String>,
}

/// `<base>/discussions/<category>/<n>` for `n = 1..=last_page`.
pub fn list_page_urls(base_url: &str, category: &str, last_page: u32) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let category = category.trim_matches('/');
    (1..=last_page)
        .map(|n| format!("{base}/discussions/{category}/{n}"))
        .collect()
}

/// Case-insensitive substring match; a blank keyword matches everything.
pub fn keyword_matches(text: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    keyword.is_empty() || text.to_lowercase().contains(&keyword.to_lowercase())
}

/// Resolve an anchor href against the page it was found on.
///
/// Absolute http(s) URLs are kept verbatim, `/path` hrefs take the source
/// page's origin, anything else is joined onto the source URL. Other schemes
/// (`javascript:`, `mailto:`) and unparseable input yield `None`.
pub fn resolve_href(href: &str, source: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(href) {
        return matches!(absolute.scheme(), "http" | "https").then(|| href.to_string());
    }

    let base = Url::parse(source).ok()?;
    if href.starts_with('/') && !href.starts_with("//") {
        return Some(format!("{}{href}", base.origin().ascii_serialization()));
    }
    base.join(href).ok().map(String::from)
}

/// Keep links whose text matches `keyword`, resolved against `source`.
pub fn filter_links(links: &[DiscussionLink], keyword: &str, source: &str) -> Vec<String> {
    links
        .iter()
        .filter(|link| keyword_matches(&link.text, keyword))
        .filter_map(|link| resolve_href(&link.href, source))
        .collect()
}

/// Drop repeats, keeping the first occurrence.
pub fn dedupe_keep_first(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

type PageResult = (String, Result<Vec<String>, AppError>);

/// Fans list pages out to a bounded pool of workers.
///
/// Each worker owns one fetcher built by the factory for its whole lifetime.
pub struct UrlCollector<FF, P> {
    factory: Arc<FF>,
    parser: Arc<P>,
    throttle: ThrottleConfig,
}

impl<FF, P> UrlCollector<FF, P>
where
    FF: FetcherFactory + 'static,
    P: DiscussionParser + 'static,
{
    pub fn new(factory: FF, parser: P) -> Self {
        Self {
            factory: Arc::new(factory),
            parser: Arc::new(parser),
            throttle: ThrottleConfig::default(),
        }
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    /// Fetch every list page and gather the matching discussion URLs.
    ///
    /// With `continue_on_error` a failing page is recorded in
    /// [`CollectOutcome::failed_pages`]; without it the first failure cancels
    /// the remaining workers and is returned.
    pub async fn collect(
        &self,
        list_page_urls: Vec<String>,
        keyword: &str,
        worker_count: usize,
        continue_on_error: bool,
    ) -> Result<CollectOutcome, AppError> {
        if list_page_urls.is_empty() {
            return Ok(CollectOutcome::default());
        }
        self.throttle.validate()?;

        let total = list_page_urls.len();
        let workers = worker_count.max(1).min(total);
        tracing::info!(pages = total, workers, keyword = %keyword, "Collecting discussion URLs");

        let queue = Arc::new(Mutex::new(VecDeque::from(list_page_urls)));
        let (tx, mut rx) = mpsc::unbounded_channel::<PageResult>();

        let mut handles: Vec<JoinHandle<Result<(), AppError>>> = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let fetcher = match self.factory.create() {
                Ok(inner) => ThrottledFetcher::new(inner, self.throttle.clone()),
                Err(e) => {
                    handles.iter().for_each(JoinHandle::abort);
                    return Err(e);
                }
            };
            handles.push(tokio::spawn(run_worker(
                worker_id,
                fetcher,
                Arc::clone(&self.parser),
                Arc::clone(&queue),
                keyword.to_string(),
                tx.clone(),
            )));
        }
        drop(tx);

        let mut found = Vec::new();
        let mut failed_pages = Vec::new();
        while let Some((page, result)) = rx.recv().await {
            match result {
                Ok(urls) => {
                    tracing::debug!(page = %page, found = urls.len(), "List page done");
                    found.extend(urls);
                }
                Err(e) if continue_on_error => {
                    tracing::warn!(page = %page, error = %e, "List page failed, continuing");
                    failed_pages.push(page);
                }
                Err(e) => {
                    tracing::error!(page = %page, error = %e, "List page failed, aborting");
                    handles.iter().for_each(JoinHandle::abort);
                    return Err(e);
                }
            }
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| AppError::Generic(format!("collector worker panicked: {e}")))??;
        }

        let urls = dedupe_keep_first(found);
        tracing::info!(
            urls = urls.len(),
            failed = failed_pages.len(),
            total,
            "Collection finished"
        );
        Ok(CollectOutcome { urls, failed_pages })
    }
}

async fn run_worker<F, P>(
    worker_id: usize,
    fetcher: ThrottledFetcher<F>,
    parser: Arc<P>,
    queue: Arc<Mutex<VecDeque<String>>>,
    keyword: String,
    tx: mpsc::UnboundedSender<PageResult>,
) -> Result<(), AppError>
where
    F: Fetcher,
    P: DiscussionParser,
{
    loop {
        let next = queue
            .lock()
            .map_err(|_| AppError::Generic("list page queue lock poisoned".into()))?
            .pop_front();
        let Some(page) = next else {
            return Ok(());
        };
        tracing::debug!(worker_id, page = %page, "Fetching list page");
        let result = fetcher
            .fetch(&page)
            .await
            .map(|html| filter_links(&parser.discussion_links(&html), &keyword, &page));
        if tx.send((page, result)).is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockFetcher, MockFetcherFactory, MockParser, Pages};

    fn pages(entries: &[(&str, Result<&str, &str>)]) -> Pages {
        entries
            .iter()
            .map(|(url, body)| {
                (
                    url.to_string(),
                    body.map(str::to_string).map_err(str::to_string),
                )
            })
            .collect()
    }

    fn collector(pages: Pages) -> UrlCollector<MockFetcherFactory, MockParser> {
        UrlCollector::new(MockFetcherFactory::new(pages), MockParser)
            .with_throttle(ThrottleConfig::none())
    }

    #[test]
    fn builds_list_page_urls() {
        assert_eq!(
            list_page_urls("https://www.examtopics.com/", "amazon", 3),
            vec![
                "https://www.examtopics.com/discussions/amazon/1",
                "https://www.examtopics.com/discussions/amazon/2",
                "https://www.examtopics.com/discussions/amazon/3",
            ]
        );
        assert!(list_page_urls(DEFAULT_BASE_URL, "amazon", 0).is_empty());
    }

    #[test]
    fn keyword_is_case_insensitive_and_blank_matches_all() {
        assert!(keyword_matches("AWS Certified SAP-C02 topic 1", "sap-c02"));
        assert!(!keyword_matches("AWS Certified DVA-C02", "SAP-C02"));
        assert!(keyword_matches("anything", ""));
        assert!(keyword_matches("anything", "   "));
    }

    #[test]
    fn resolves_hrefs() {
        let source = "https://www.examtopics.com/discussions/amazon/2";
        assert_eq!(
            resolve_href("https://other.example/x", source).as_deref(),
            Some("https://other.example/x")
        );
        assert_eq!(
            resolve_href("/discussions/amazon/view/1-exam/", source).as_deref(),
            Some("https://www.examtopics.com/discussions/amazon/view/1-exam/")
        );
        assert_eq!(
            resolve_href("/x", "http://localhost:8080/list/1").as_deref(),
            Some("http://localhost:8080/x")
        );
        assert_eq!(
            resolve_href("view/9", source).as_deref(),
            Some("https://www.examtopics.com/discussions/amazon/view/9")
        );
        assert_eq!(resolve_href("javascript:void(0)", source), None);
        assert_eq!(resolve_href("  ", source), None);
    }

    #[test]
    fn dedupes_keeping_first() {
        let urls = vec!["b".into(), "a".into(), "b".into(), "c".into(), "a".into()];
        assert_eq!(dedupe_keep_first(urls), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn collects_unique_matching_urls() {
        let pages = pages(&[
            (
                "https://h/d/1",
                Ok("/v/1|SAP-C02 Q1\n/v/2|DVA-C02 Q2\n/v/3|sap-c02 Q3"),
            ),
            ("https://h/d/2", Ok("/v/3|SAP-C02 Q3\n/v/4|SAP-C02 Q4")),
            ("https://h/d/3", Ok("")),
        ]);
        let c = collector(pages);
        let outcome = c
            .collect(
                vec!["https://h/d/1".into(), "https://h/d/2".into(), "https://h/d/3".into()],
                "SAP-C02",
                2,
                true,
            )
            .await
            .unwrap();

        let got: HashSet<_> = outcome.urls.iter().cloned().collect();
        let expected: HashSet<String> = ["https://h/v/1", "https://h/v/3", "https://h/v/4"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(got, expected);
        assert_eq!(outcome.urls.len(), 3);
        assert!(outcome.failed_pages.is_empty());
        assert_eq!(c.factory.created(), 2);
        assert_eq!(c.factory.calls().len(), 3);
    }

    #[tokio::test]
    async fn records_failed_pages_when_continuing() {
        let pages = pages(&[
            ("https://h/d/1", Ok("/v/1|Q1")),
            ("https://h/d/2", Err("HTTP 503 for https://h/d/2")),
        ]);
        let outcome = collector(pages)
            .collect(
                vec!["https://h/d/1".into(), "https://h/d/2".into()],
                "",
                4,
                true,
            )
            .await
            .unwrap();
        assert_eq!(outcome.urls, vec!["https://h/v/1"]);
        assert_eq!(outcome.failed_pages, vec!["https://h/d/2"]);
    }

    #[tokio::test]
    async fn fail_fast_returns_the_error() {
        let pages = pages(&[("https://h/d/1", Err("HTTP 500 for https://h/d/1"))]);
        let err = collector(pages)
            .collect(vec!["https://h/d/1".into()], "", 1, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HttpError(_)));
    }

    #[tokio::test]
    async fn factory_error_is_returned() {
        let c = UrlCollector::new(
            MockFetcherFactory::with_create_error(AppError::ConfigError("bad client".into())),
            MockParser,
        );
        let err = c
            .collect(vec!["https://h/d/1".into()], "", 1, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[tokio::test]
    async fn poisoned_queue_is_an_error() {
        let queue = Arc::new(Mutex::new(VecDeque::from(vec!["https://h/d/1".to_string()])));
        let held = Arc::clone(&queue);
        let _ = std::thread::spawn(move || {
            let _guard = held.lock().unwrap();
            panic!("worker died holding the queue");
        })
        .join();
        assert!(queue.is_poisoned());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let fetcher = ThrottledFetcher::new(MockFetcher::new(""), ThrottleConfig::none());
        let result = run_worker(0, fetcher, Arc::new(MockParser), queue, String::new(), tx).await;

        assert!(matches!(result, Err(AppError::Generic(ref m)) if m.contains("poisoned")));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn no_pages_means_no_work() {
        let c = collector(Pages::new());
        let outcome = c.collect(Vec::new(), "", 3, true).await.unwrap();
        assert_eq!(outcome, CollectOutcome::default());
        assert_eq!(c.factory.created(), 0);
    }
}
