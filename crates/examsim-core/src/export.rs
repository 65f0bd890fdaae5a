//! Deterministic question-set export, optionally split into fixed-size chunks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::cache::QuestionCache;
use crate::error::AppError;
use crate::models::{QuestionRecord, QuestionSet};
use crate::normalize::normalize;
use crate::question_set::{check_question, parse_question_set, to_document_bytes};

const QUESTIONS_SUFFIX: &str = ".questions.json";

/// Export settings.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub set_id: String,
    /// Defaults to `set_id` when `None`.
    pub title: Option<String>,
    /// Split into files of at most this many questions. `None` or 0 disables splitting.
    pub chunk_size: Option<usize>,
}

impl ExportOptions {
    pub fn new(set_id: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            title: None,
            chunk_size: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.set_id)
    }
}

/// Collect normalized questions in input URL order, skipping URLs not in the cache.
///
/// Question ids are made unique across the set: a repeated id gets a `-2`,
/// `-3`, ... suffix in encounter order.
pub fn ordered_questions(urls: &[String], cache: &QuestionCache) -> Vec<QuestionRecord> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();

    for url in urls {
        if !seen_urls.insert(url.as_str()) {
            continue;
        }
        let Some(record) = cache.get(url) else {
            continue;
        };
        let mut question = normalize(record.clone());
        if seen_ids.contains(&question.id) {
            let base = question.id.clone();
            let mut n = 2;
            while seen_ids.contains(&format!("{base}-{n}")) {
                n += 1;
            }
            tracing::debug!(id = %base, url = %url, "Duplicate question id, adding suffix {n}");
            question.id = format!("{base}-{n}");
        }
        seen_ids.insert(question.id.clone());
        out.push(question);
    }
    out
}

/// Build the question set(s) for an export.
///
/// One set when splitting is off or unnecessary; otherwise consecutive chunks
/// whose `set_id` is suffixed `-1`, `-2`, ...
pub fn build_sets(questions: Vec<QuestionRecord>, options: &ExportOptions) -> Vec<QuestionSet> {
    let chunk_size = options.chunk_size.unwrap_or(0);
    if chunk_size == 0 || questions.len() <= chunk_size {
        return vec![QuestionSet {
            set_id: options.set_id.clone(),
            title: options.title().to_string(),
            questions,
        }];
    }

    questions
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| QuestionSet {
            set_id: format!("{}-{}", options.set_id, i + 1),
            title: format!("{} ({})", options.title(), i + 1),
            questions: chunk.to_vec(),
        })
        .collect()
}

/// Output path for chunk `n` (1-based).
///
/// `exam.questions.json` → `exam-2.questions.json`; `out.json` → `out-2.json`.
pub fn chunk_path(out: &Path, n: usize) -> PathBuf {
    let file_name = out
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("questions.json");

    let chunk_name = match file_name.strip_suffix(QUESTIONS_SUFFIX) {
        Some(base) => format!("{base}-{n}{QUESTIONS_SUFFIX}"),
        None => {
            let stem = out
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("questions");
            match out.extension().and_then(|s| s.to_str()) {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}.json"),
            }
        }
    };
    out.with_file_name(chunk_name)
}

/// Result of writing an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub questions: usize,
    pub files: Vec<PathBuf>,
    /// Ids of cached records left out because the loader would reject them.
    pub skipped: Vec<String>,
}

/// Export the cached questions for `urls` to `out` (or chunk files next to it).
///
/// Every written document loads back with
/// [`load_question_set`](crate::question_set::load_question_set): records it
/// would reject are skipped with a warning, and each set is checked again
/// before it is written.
pub fn export(
    urls: &[String],
    cache: &QuestionCache,
    options: &ExportOptions,
    out: &Path,
) -> Result<ExportSummary, AppError> {
    let mut skipped = Vec::new();
    let questions: Vec<QuestionRecord> = ordered_questions(urls, cache)
        .into_iter()
        .filter(|question| match check_question(question) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %question.id, error = %e, "Skipping invalid record");
                skipped.push(question.id.clone());
                false
            }
        })
        .collect();
    let total = questions.len();
    let sets = build_sets(questions, options);
    let split = sets.len() > 1;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut files = Vec::with_capacity(sets.len());
    for (i, set) in sets.iter().enumerate() {
        let path = if split {
            chunk_path(out, i + 1)
        } else {
            out.to_path_buf()
        };
        parse_question_set(&serde_json::to_value(set)?).map_err(|e| {
            AppError::DocumentFormat(format!("refusing to write set {}: {e}", set.set_id))
        })?;
        std::fs::write(&path, to_document_bytes(set)?)?;
        tracing::info!(
            path = %path.display(),
            set_id = %set.set_id,
            questions = set.questions.len(),
            "Wrote question set"
        );
        files.push(path);
    }

    Ok(ExportSummary {
        questions: total,
        files,
        skipped,
    })
}
