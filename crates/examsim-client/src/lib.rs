pub mod fetcher;
pub mod parser;

pub use fetcher::{ReqwestFetcher, ReqwestFetcherFactory};
pub use parser::HtmlDiscussionParser;
