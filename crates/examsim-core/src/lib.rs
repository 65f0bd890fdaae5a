pub mod cache;
pub mod collect;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod question_set;
pub mod retry;
pub mod scrape;
pub mod text;
pub mod throttle;
pub mod traits;
pub mod votes;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{JsonFileCache, QuestionCache};
pub use collect::{CollectOutcome, UrlCollector};
pub use error::AppError;
pub use export::{ExportOptions, ExportSummary, export};
pub use models::{Choice, DiscussionLink, ParsedChoice, ParsedQuestion, QuestionRecord, QuestionSet, compute_hash};
pub use normalize::normalize;
pub use question_set::{load_question_set, load_question_set_file};
pub use retry::{FetchConfig, RetryPolicy};
pub use scrape::{ScrapeOptions, ScrapeReport, ScrapeService};
pub use throttle::{ThrottleConfig, ThrottledFetcher};
pub use traits::{DiscussionParser, Fetcher, FetcherFactory, NullStore, QuestionStore};
