use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use examsim_client::{HtmlDiscussionParser, ReqwestFetcher, ReqwestFetcherFactory};
use examsim_core::collect::{DEFAULT_BASE_URL, list_page_urls};
use examsim_core::error::AppError;
use examsim_core::retry::{DEFAULT_USER_AGENT, FetchConfig, RetryPolicy, seconds};
use examsim_core::{
    ExportOptions, JsonFileCache, ScrapeOptions, ScrapeService, ThrottleConfig, ThrottledFetcher,
    UrlCollector, export, load_question_set_file,
};

#[derive(Parser)]
#[command(
    name = "examsim",
    version,
    about = "Scrape exam discussion pages into portable question sets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect discussion URLs from paginated list pages
    CollectUrls {
        /// Category path segment (e.g. "amazon")
        #[arg(long)]
        category: String,

        /// Last list page number (inclusive)
        #[arg(long)]
        max_page: u32,

        /// Keep only links whose text contains this (case-insensitive)
        #[arg(long, default_value = "")]
        keyword: String,

        /// Concurrent list-page workers
        #[arg(long, default_value_t = 10)]
        max_workers: usize,

        /// Site root the list pages live under
        #[arg(long, env = "EXAMSIM_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Abort on the first failing list page instead of recording it
        #[arg(long, default_value_t = false)]
        fail_fast: bool,

        /// Output file, one URL per line (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the list pages that failed to this file
        #[arg(long)]
        failed_out: Option<PathBuf>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Scrape discussion pages and export a question set
    Scrape {
        /// set_id of the exported document
        #[arg(long)]
        set_id: String,

        /// File with one discussion URL per line (blank lines and # comments ignored)
        #[arg(long)]
        urls: PathBuf,

        /// Output path (e.g. AWS-SAP-C02.questions.json)
        #[arg(long)]
        out: PathBuf,

        /// Document title (defaults to the set_id)
        #[arg(long)]
        title: Option<String>,

        /// Cache file mapping URL to question, used to resume
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Ignore an existing cache file
        #[arg(long, default_value_t = false)]
        no_resume: bool,

        /// Re-scrape URLs that are already cached
        #[arg(long, default_value_t = false)]
        overwrite: bool,

        /// Split the export into files of at most N questions
        #[arg(long)]
        split_size: Option<usize>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Check a question-set document and print a summary
    Validate {
        /// Path to the question-set JSON document
        path: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
struct FetchArgs {
    /// User-Agent header sent with every request
    #[arg(long, env = "EXAMSIM_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Connect timeout in seconds
    #[arg(long, env = "EXAMSIM_CONNECT_TIMEOUT_S", default_value_t = 10.0)]
    connect_timeout_s: f64,

    /// Total request timeout in seconds
    #[arg(long, env = "EXAMSIM_TIMEOUT_S", default_value_t = 25.0)]
    timeout_s: f64,

    /// Minimum random delay before each request, in seconds
    #[arg(long, env = "EXAMSIM_MIN_DELAY_S", default_value_t = 0.6)]
    min_delay_s: f64,

    /// Maximum random delay before each request, in seconds
    #[arg(long, env = "EXAMSIM_MAX_DELAY_S", default_value_t = 1.6)]
    max_delay_s: f64,

    /// Retries for 429/5xx responses and connection failures
    #[arg(long, env = "EXAMSIM_RETRIES", default_value_t = 4)]
    retries: u32,

    /// Exponential backoff base in seconds
    #[arg(long, env = "EXAMSIM_BACKOFF_FACTOR", default_value_t = 0.6)]
    backoff_factor: f64,
}

impl FetchArgs {
    fn to_config(&self) -> Result<FetchConfig, AppError> {
        let config = FetchConfig {
            user_agent: self.user_agent.clone(),
            connect_timeout: seconds(self.connect_timeout_s, "--connect-timeout-s")?,
            timeout: seconds(self.timeout_s, "--timeout-s")?,
            min_delay: seconds(self.min_delay_s, "--min-delay-s")?,
            max_delay: seconds(self.max_delay_s, "--max-delay-s")?,
            retry: RetryPolicy {
                retries: self.retries,
                backoff_factor: seconds(self.backoff_factor, "--backoff-factor")?,
                ..RetryPolicy::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// How a command finished when it did not error out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    /// Completed, but at least one page or URL failed.
    Partial,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("error: {e:#}");
        return ExitCode::from(2);
    }

    match run(cli).await {
        Ok(Status::Ok) => ExitCode::SUCCESS,
        Ok(Status::Partial) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("examsim=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<Status> {
    match cli.command {
        Commands::CollectUrls {
            category,
            max_page,
            keyword,
            max_workers,
            base_url,
            fail_fast,
            out,
            failed_out,
            fetch,
        } => {
            let config = fetch.to_config().context("Invalid fetch settings")?;
            let pages = list_page_urls(&base_url, &category, max_page);
            cmd_collect_urls(
                pages,
                &keyword,
                max_workers,
                fail_fast,
                out.as_deref(),
                failed_out.as_deref(),
                &config,
            )
            .await
        }
        Commands::Scrape {
            set_id,
            urls,
            out,
            title,
            cache,
            no_resume,
            overwrite,
            split_size,
            fetch,
        } => {
            let config = fetch.to_config().context("Invalid fetch settings")?;
            let mut export_options = ExportOptions::new(set_id);
            export_options.title = title;
            export_options.chunk_size = split_size;
            let scrape_options = ScrapeOptions {
                resume: !no_resume,
                overwrite,
            };
            cmd_scrape(
                &urls,
                &out,
                cache.as_deref(),
                scrape_options,
                &export_options,
                &config,
            )
            .await
        }
        Commands::Validate { path } => cmd_validate(&path),
    }
}

async fn cmd_collect_urls(
    pages: Vec<String>,
    keyword: &str,
    max_workers: usize,
    fail_fast: bool,
    out: Option<&Path>,
    failed_out: Option<&Path>,
    config: &FetchConfig,
) -> Result<Status> {
    if pages.is_empty() {
        bail!("--max-page must be at least 1");
    }
    let total = pages.len();

    let collector = UrlCollector::new(
        ReqwestFetcherFactory::new(config.clone()),
        HtmlDiscussionParser::new(),
    )
    .with_throttle(ThrottleConfig::from_fetch_config(config));

    let outcome = collector
        .collect(pages, keyword, max_workers, !fail_fast)
        .await
        .context("URL collection aborted")?;

    write_lines(out, &outcome.urls)?;
    if let Some(path) = failed_out {
        write_lines(Some(path), &outcome.failed_pages)?;
    }

    if outcome.failed_pages.is_empty() {
        tracing::info!(urls = outcome.urls.len(), "Collected discussion URLs");
        Ok(Status::Ok)
    } else {
        tracing::warn!(
            "{}/{} list pages failed; collected {} URLs",
            outcome.failed_pages.len(),
            total,
            outcome.urls.len()
        );
        Ok(Status::Partial)
    }
}

async fn cmd_scrape(
    urls_path: &Path,
    out: &Path,
    cache: Option<&Path>,
    scrape_options: ScrapeOptions,
    export_options: &ExportOptions,
    config: &FetchConfig,
) -> Result<Status> {
    let urls = read_url_list(urls_path)?;

    let fetcher = ThrottledFetcher::new(
        ReqwestFetcher::new(config).context("Failed to create HTTP client")?,
        ThrottleConfig::from_fetch_config(config),
    );
    let parser = HtmlDiscussionParser::new();

    let report = match cache {
        Some(path) => {
            ScrapeService::with_store(fetcher, parser, JsonFileCache::new(path))
                .run(&urls, scrape_options)
                .await
        }
        None => ScrapeService::new(fetcher, parser).run(&urls, scrape_options).await,
    }
    .context("Scrape failed")?;

    for (url, error) in &report.failed {
        tracing::warn!(url = %url, error = %error, "Not exported");
    }

    let summary = export(&urls, &report.cache, export_options, out)
        .with_context(|| format!("Failed to export to {}", out.display()))?;
    tracing::info!(
        questions = summary.questions,
        files = summary.files.len(),
        skipped = summary.skipped.len(),
        ok = report.ok,
        failed = report.failed.len(),
        "Export complete"
    );

    if report.has_failures() || !summary.skipped.is_empty() {
        tracing::warn!(
            "{}/{} URLs failed, {} cached records skipped",
            report.failed.len(),
            urls.len(),
            summary.skipped.len()
        );
        Ok(Status::Partial)
    } else {
        Ok(Status::Ok)
    }
}

fn cmd_validate(path: &Path) -> Result<Status> {
    let set = load_question_set_file(path)
        .with_context(|| format!("Invalid question set: {}", path.display()))?;

    let answered = set
        .questions
        .iter()
        .filter(|q| q.answer_choice_ids.is_some())
        .count();
    let multi = set
        .questions
        .iter()
        .filter(|q| q.is_multi_select == Some(true))
        .count();

    println!("{} ({})", set.set_id, set.title);
    println!("  questions:    {}", set.questions.len());
    println!("  with answers: {answered}");
    println!("  multi-select: {multi}");
    Ok(Status::Ok)
}

/// URLs from a list file: trimmed, skipping blank lines and `#` comments.
fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
    let urls = parse_url_list(&contents);
    if urls.is_empty() {
        bail!("URL file {} contains no URLs", path.display());
    }
    Ok(urls)
}

/// Write one item per line to `path`, or to stdout when `None`.
fn write_lines(path: Option<&Path>, lines: &[String]) -> Result<()> {
    match path {
        None => {
            for line in lines {
                println!("{line}");
            }
        }
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let mut contents = lines.join("\n");
            if !contents.is_empty() {
                contents.push('\n');
            }
            std::fs::write(path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), lines = lines.len(), "Wrote file");
        }
    }
    Ok(())
}
