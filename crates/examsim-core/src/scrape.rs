use crate::cache::QuestionCache;
use crate::error::AppError;
use crate::models::QuestionRecord;
use crate::normalize::normalize;
use crate::traits::{DiscussionParser, Fetcher, NullStore, QuestionStore};

/// How a scrape run treats the existing cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Start from the persisted cache. When false the run starts empty even
    /// if a cache file exists (and overwrites it on the first save).
    pub resume: bool,
    /// Re-scrape URLs that are already cached.
    pub overwrite: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            resume: true,
            overwrite: false,
        }
    }
}

/// Outcome of a scrape run.
#[derive(Debug)]
pub struct ScrapeReport {
    /// URLs that were scraped successfully or already cached.
    pub ok: usize,
    /// Cached URLs that were not fetched again.
    pub skipped: usize,
    pub failed: Vec<(String, AppError)>,
    /// The cache after the run, including entries for URLs not in this run.
    pub cache: QuestionCache,
}

impl ScrapeReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Orchestrates the per-URL pipeline: fetch → parse → convert → normalize → persist.
///
/// Generic over all external dependencies via traits, enabling dependency injection
/// and testability without real HTTP calls.
pub struct ScrapeService<F, P, S = NullStore>
where
    F: Fetcher,
    P: DiscussionParser,
    S: QuestionStore,
{
    fetcher: F,
    parser: P,
    store: S,
}

impl<F, P> ScrapeService<F, P, NullStore>
where
    F: Fetcher,
    P: DiscussionParser,
{
    /// Create a ScrapeService that keeps results in memory only.
    pub fn new(fetcher: F, parser: P) -> Self {
        Self {
            fetcher,
            parser,
            store: NullStore,
        }
    }
}

impl<F, P, S> ScrapeService<F, P, S>
where
    F: Fetcher,
    P: DiscussionParser,
    S: QuestionStore,
{
    /// Create a ScrapeService persisting to `store` after every new question.
    pub fn with_store(fetcher: F, parser: P, store: S) -> Self {
        Self {
            fetcher,
            parser,
            store,
        }
    }

    /// Fetch and parse one discussion page into a normalized record.
    pub async fn scrape_one(&self, url: &str) -> Result<QuestionRecord, AppError> {
        tracing::info!(url = %url, "Fetching discussion");
        let html = self.fetcher.fetch(url).await?;
        tracing::debug!(url = %url, bytes = html.len(), "Fetched discussion");

        let parsed = self.parser.parse_discussion(&html);
        let record = normalize(QuestionRecord::from_parsed(url, &parsed));
        tracing::info!(
            id = %record.id,
            choices = record.choices.len(),
            answers = record.answer_choice_ids.as_ref().map_or(0, Vec::len),
            "Parsed question"
        );
        Ok(record)
    }

    /// Scrape `urls` in order, one at a time.
    ///
    /// Per-URL failures (fetch or persist) are recorded and the run moves on.
    /// Only a failure to load the cache aborts the run.
    pub async fn run(
        &self,
        urls: &[String],
        options: ScrapeOptions,
    ) -> Result<ScrapeReport, AppError> {
        let mut cache = if options.resume {
            self.store.load()?
        } else {
            QuestionCache::new()
        };
        tracing::info!(
            urls = urls.len(),
            cached = cache.len(),
            resume = options.resume,
            overwrite = options.overwrite,
            "Starting scrape"
        );

        let mut report = ScrapeReport {
            ok: 0,
            skipped: 0,
            failed: Vec::new(),
            cache: QuestionCache::new(),
        };

        for (i, url) in urls.iter().enumerate() {
            if !options.overwrite && cache.contains_key(url) {
                tracing::debug!(url = %url, "Already cached, skipping");
                report.ok += 1;
                report.skipped += 1;
                continue;
            }

            let result = match self.scrape_one(url).await {
                Ok(record) => {
                    cache.insert(url.clone(), record);
                    self.store.persist(&cache)
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => report.ok += 1,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to scrape discussion");
                    report.failed.push((url.clone(), e));
                }
            }
            tracing::debug!(done = i + 1, total = urls.len(), "Progress");
        }

        tracing::info!(
            ok = report.ok,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Scrape finished"
        );
        report.cache = cache;
        Ok(report)
    }
}
