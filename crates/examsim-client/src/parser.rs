//! HTML extraction for discussion-site pages.
//!
//! Every lookup is an ordered selector list where the first hit wins. The
//! parser never fails: a page it does not recognize still produces a question
//! with placeholder text and a placeholder choice.

use std::sync::LazyLock;

use examsim_core::models::{
    DiscussionLink, FALLBACK_QUESTION_TEXT, ParsedChoice, ParsedQuestion,
};
use examsim_core::text;
use examsim_core::traits::DiscussionParser;
use scraper::{ElementRef, Html, Selector};

fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
}

static QUESTION_CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[".question-body", ".question-text", "div.question", "article"])
});

static CHOICE_CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        ".question-choices",
        "ul.choices",
        "li.multi-choice-item",
        ".multi-choice-item",
    ])
});

static CHOICE_ITEMS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[".question-choices li", "ul.choices li", "li.multi-choice-item"])
});

static CHOICE_LETTERS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&[".choice-letter", ".letter"]));

static DISCUSSION_CONTAINERS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&[".discussion-container", ".discussion"]));

static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));

static DISCUSSION_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.discussion-link").expect("valid selector"));

/// Parses discussion and list pages with `scraper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDiscussionParser;

impl HtmlDiscussionParser {
    pub fn new() -> Self {
        Self
    }
}

/// First element matched by the first selector that matches anything.
fn first_match<'a>(root: ElementRef<'a>, list: &[Selector]) -> Option<ElementRef<'a>> {
    list.iter().find_map(|sel| root.select(sel).next())
}

/// Whitespace-normalized text: every text node trimmed, joined by single spaces.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Like [`element_text`] but skipping any descendant that is a choice container.
fn text_without_choices(el: ElementRef<'_>, out: &mut Vec<String>) {
    for child in el.children() {
        if let Some(t) = child.value().as_text() {
            let t = t.trim();
            if !t.is_empty() {
                out.push(t.to_string());
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if CHOICE_CONTAINERS.iter().any(|sel| sel.matches(&child_el)) {
                continue;
            }
            text_without_choices(child_el, out);
        }
    }
}

/// Question text before cleanup: the container's text minus nested choices.
///
/// Answer labels are read from this, so it keeps the reveal UI intact.
fn raw_question_text(root: ElementRef<'_>) -> String {
    let Some(el) = first_match(root, &QUESTION_CONTAINERS) else {
        return String::new();
    };
    let mut parts = Vec::new();
    text_without_choices(el, &mut parts);
    parts.join(" ")
}

/// Cleaned question text, taking the first candidate that survives cleanup:
/// container without choices, whole container, page heading, then a literal.
fn question_text(root: ElementRef<'_>, raw: &str) -> String {
    let container = first_match(root, &QUESTION_CONTAINERS);
    let candidates = [
        Some(raw.to_string()),
        container.map(element_text),
        root.select(&HEADING).next().map(element_text),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(|candidate| text::clean_question_text(&candidate))
        .find(|cleaned| !cleaned.is_empty())
        .unwrap_or_else(|| FALLBACK_QUESTION_TEXT.to_string())
}

fn parse_choice(li: ElementRef<'_>, answers: &[String]) -> Option<ParsedChoice> {
    let full = element_text(li);
    if full.is_empty() {
        return None;
    }

    let (label, choice_text) = match text::split_choice_label(&full) {
        (Some(label), rest) => (Some(label), rest),
        (None, _) => match first_match(li, &CHOICE_LETTERS) {
            Some(letter_el) => {
                let letter_text = element_text(letter_el);
                match text::single_label(&letter_text) {
                    Some(label) => {
                        let rest = full
                            .strip_prefix(letter_text.as_str())
                            .map(str::trim)
                            .filter(|r| !r.is_empty())
                            .unwrap_or(&full)
                            .to_string();
                        (Some(label), rest)
                    }
                    None => (None, full.clone()),
                }
            }
            None => (None, full.clone()),
        },
    };

    let is_correct = label.as_ref().is_some_and(|l| answers.contains(l));
    Some(ParsedChoice::new(label, choice_text, is_correct))
}

impl DiscussionParser for HtmlDiscussionParser {
    fn parse_discussion(&self, html: &str) -> ParsedQuestion {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let raw_text = raw_question_text(root);
        let explanation = first_match(root, &DISCUSSION_CONTAINERS)
            .map(element_text)
            .and_then(non_empty);

        let answers = text::extract_answer_labels(&format!(
            "{raw_text} {}",
            explanation.as_deref().unwrap_or_default()
        ));

        let items: Vec<ElementRef<'_>> = CHOICE_ITEMS
            .iter()
            .map(|sel| root.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let mut choices: Vec<ParsedChoice> = items
            .into_iter()
            .filter_map(|li| parse_choice(li, &answers))
            .collect();
        if choices.is_empty() {
            tracing::debug!("No choices recognized, using placeholder");
            choices.push(ParsedChoice::placeholder());
        }

        ParsedQuestion {
            text: question_text(root, &raw_text),
            choices,
            explanation,
            raw_html: Some(html.to_string()),
            q_index: 1,
        }
    }

    fn discussion_links(&self, html: &str) -> Vec<DiscussionLink> {
        let document = Html::parse_document(html);
        document
            .select(&DISCUSSION_LINK)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                Some(DiscussionLink::new(href, element_text(a)))
            })
            .collect()
    }
}
