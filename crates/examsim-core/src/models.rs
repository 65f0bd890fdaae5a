use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::text;

/// Text used when a discussion page yields no recognizable choices.
pub const PLACEHOLDER_CHOICE_TEXT: &str = "N/A (could not parse choices)";

/// Question text used when nothing readable is left after cleanup.
pub const FALLBACK_QUESTION_TEXT: &str = "Question";

static DISCUSSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/discussions/[^/]+/(?:view/)?(\d+)").expect("valid regex"));

/// One choice as it came off a discussion page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChoice {
    /// Single uppercase letter, when the page exposed one.
    pub label: Option<String>,
    pub text: String,
    pub is_correct: bool,
}

impl ParsedChoice {
    pub fn new(label: Option<String>, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            label,
            text: text.into(),
            is_correct,
        }
    }

    /// The stand-in used so downstream consumers never see an empty choice list.
    pub fn placeholder() -> Self {
        Self::new(None, PLACEHOLDER_CHOICE_TEXT, false)
    }
}

/// Best-effort parse of a single discussion page.
///
/// Built fresh for every fetch; re-scraping replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub text: String,
    /// Never empty: see [`ParsedChoice::placeholder`].
    pub choices: Vec<ParsedChoice>,
    /// Raw discussion text (all comments, unstructured).
    pub explanation: Option<String>,
    pub raw_html: Option<String>,
    pub q_index: u32,
}

/// An anchor found on a list page, before keyword filtering and URL resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionLink {
    pub href: String,
    pub text: String,
}

impl DiscussionLink {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }
}

/// A choice in an exported question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
}

impl Choice {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A question in the shape stored in the cache and exported in a question set.
///
/// Field order here is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub text: String,
    pub choices: Vec<Choice>,
    pub answer_choice_ids: Option<Vec<String>>,
    pub is_multi_select: Option<bool>,
    pub explanation: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl QuestionRecord {
    /// Convert a freshly parsed page into a record keyed off its discussion URL.
    pub fn from_parsed(url: &str, parsed: &ParsedQuestion) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(parsed.choices.len());
        let mut choices = Vec::with_capacity(parsed.choices.len());
        let mut answer_ids = Vec::new();

        for (idx, choice) in parsed.choices.iter().enumerate() {
            let id = unique_choice_id(choice.label.as_deref(), idx, &seen);
            seen.insert(id.clone());
            if choice.is_correct {
                answer_ids.push(id.clone());
            }
            choices.push(Choice::new(id, choice.text.clone()));
        }

        let is_multi_select = answer_ids.len() > 1 || text::mentions_choose_n(&parsed.text);

        Self {
            id: question_id_from_url(url, parsed.q_index),
            text: parsed.text.clone(),
            choices,
            answer_choice_ids: if answer_ids.is_empty() {
                None
            } else {
                Some(answer_ids)
            },
            is_multi_select: Some(is_multi_select),
            explanation: parsed.explanation.clone(),
            tags: None,
        }
    }

    pub fn has_choice(&self, id: &str) -> bool {
        self.choices.iter().any(|c| c.id == id)
    }
}

/// The portable document handed to the quiz UI and progress service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub set_id: String,
    pub title: String,
    pub questions: Vec<QuestionRecord>,
}

/// Choice id for a choice: its label when present, otherwise its position as a letter.
pub fn choice_id_for(label: Option<&str>, idx: usize) -> String {
    match label.map(str::trim) {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => positional_id(idx),
    }
}

fn positional_id(idx: usize) -> String {
    if idx < 26 {
        char::from(b'A' + idx as u8).to_string()
    } else {
        format!("C{}", idx + 1)
    }
}

fn unique_choice_id(label: Option<&str>, idx: usize, seen: &HashSet<String>) -> String {
    let id = choice_id_for(label, idx);
    if !seen.contains(&id) {
        return id;
    }
    let positional = positional_id(idx);
    if !seen.contains(&positional) {
        return positional;
    }
    format!("{positional}-{}", idx + 1)
}

/// Stable question id derived from the discussion URL.
///
/// `https://host/discussions/<category>/[view/]<n>...` → `"<n>-q<index>"`; any other
/// URL falls back to a short SHA-256 prefix of the URL.
pub fn question_id_from_url(url: &str, q_index: u32) -> String {
    match DISCUSSION_ID.captures(url) {
        Some(caps) => format!("{}-q{q_index}", &caps[1]),
        None => format!("{}-q{q_index}", &compute_hash(url)[..10]),
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
