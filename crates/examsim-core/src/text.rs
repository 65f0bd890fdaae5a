//! Plain-text heuristics applied to extracted question and discussion text.
//!
//! Every function here is pure and works on already-extracted text, so the
//! HTML layer and the normalizer share exactly the same rules.
//!
//! | heuristic | rule | precedence |
//! |---|---|---|
//! | UI tail | cut from `Show Suggested Answer` / `Hide Answer` to the end | first |
//! | bare marker | cut from `Suggested Answer:` to the end | only if the UI tail cut changed nothing |
//! | inline choices | cut at the first ` A.`/` A)` when a ` B.`/` B)` also exists | after both tail cuts |
//! | answer labels | letters after `Suggested Answer:` | before `Correct Answer:` |
//! | choice label | leading `X.` / `X)` / `X:` | before a `.choice-letter` element |

use std::sync::LazyLock;

use regex::Regex;

static UI_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\s*(?:Show\s*Suggested\s*Answer|Hide\s*Answer)\b.*$").expect("valid regex")
});

static SUGGESTED_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\s*Suggested\s*Answer\s*:.*$").expect("valid regex"));

static INLINE_A: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\sA[.)]\s").expect("valid regex"));

static INLINE_B: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\sB[.)]\s").expect("valid regex"));

static SUGGESTED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Suggested\s*Answer\s*:").expect("valid regex"));

static CORRECT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Correct\s*Answer\s*:").expect("valid regex"));

static CHOOSE_N: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*Choose\s+(?:two|three|four|five|\d+)\s*\.?\s*\)").expect("valid regex")
});

static LEADING_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*([A-Z])[.):]\s*(.+)$").expect("valid regex"));

/// Strip rendered answer-reveal UI from the end of a question.
///
/// `"... Show Suggested Answer Hide Answer Suggested Answer: CD"` keeps only the
/// question. When no UI phrase is present, a bare `Suggested Answer:` tail is
/// cut instead.
pub fn strip_answer_ui(text: &str) -> String {
    let stripped = UI_TAIL.replace(text, "");
    if stripped != text {
        return stripped.trim().to_string();
    }
    SUGGESTED_TAIL.replace(text, "").trim().to_string()
}

/// Drop choices that were rendered inline inside the question body.
pub fn strip_inline_choices(text: &str) -> String {
    if !INLINE_B.is_match(text) {
        return text.trim().to_string();
    }
    match INLINE_A.find(text) {
        Some(m) => text[..m.start()].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Full question-text cleanup cascade.
///
/// Repeated until the text stops changing, so the output is a fixed point and
/// cleaning twice equals cleaning once.
pub fn clean_question_text(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = strip_inline_choices(&strip_answer_ui(&current));
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Extract answer labels from `Suggested Answer: AC` / `Correct Answer: A, C` text.
///
/// Suggested answers take precedence over correct answers whenever both appear.
/// Letters are returned in first-seen order without duplicates.
pub fn extract_answer_labels(text: &str) -> Vec<String> {
    let letters =
        labels_after(&SUGGESTED_MARKER, text).or_else(|| labels_after(&CORRECT_MARKER, text));

    let mut out: Vec<String> = Vec::new();
    for ch in letters.unwrap_or_default().chars() {
        let label = ch.to_string();
        if !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

/// First marker occurrence that is followed by at least one label token.
fn labels_after(marker: &Regex, text: &str) -> Option<String> {
    marker
        .find_iter(text)
        .map(|m| label_tokens(&text[m.end()..]))
        .find(|letters| !letters.is_empty())
}

/// Collect consecutive all-uppercase tokens separated by whitespace or commas.
///
/// Stops at the first token that is not purely `A-Z` (so `"B Reference: ..."`
/// yields `"B"`).
fn label_tokens(rest: &str) -> String {
    let mut letters = String::new();
    let mut remaining = rest;
    loop {
        remaining = remaining.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        let token_len = remaining
            .find(|c: char| !c.is_ascii_uppercase())
            .unwrap_or(remaining.len());
        if token_len == 0 {
            break;
        }
        let (token, tail) = remaining.split_at(token_len);
        if tail.chars().next().is_some_and(char::is_alphanumeric) {
            break;
        }
        letters.push_str(token);
        remaining = tail;
    }
    letters
}

/// True when the question says how many answers to pick, e.g. `(Choose two.)`.
pub fn mentions_choose_n(text: &str) -> bool {
    CHOOSE_N.is_match(text)
}

/// Split a leading `A.` / `B)` / `C:` label off a choice text.
pub fn split_choice_label(text: &str) -> (Option<String>, String) {
    match LEADING_LABEL.captures(text) {
        Some(caps) => (Some(caps[1].to_string()), caps[2].trim().to_string()),
        None => (None, text.trim().to_string()),
    }
}

/// Interpret a dedicated label element's text as a single uppercase letter.
pub fn single_label(text: &str) -> Option<String> {
    let upper = text.trim().to_uppercase();
    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Some(c.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(text: &str) -> Vec<String> {
        extract_answer_labels(text)
    }

    #[test]
    fn answer_labels_from_markers() {
        assert_eq!(labels("Suggested Answer: AC"), vec!["A", "C"]);
        assert_eq!(labels("Correct Answer: A, C"), vec!["A", "C"]);
        assert!(labels("no marker here").is_empty());
    }

    #[test]
    fn answer_labels_prefer_suggested() {
        assert_eq!(
            labels("Correct Answer: B ... Suggested Answer: D"),
            vec!["D"]
        );
    }

    #[test]
    fn answer_labels_dedupe_and_stop_at_words() {
        assert_eq!(labels("Suggested Answer: B B, A Reference: docs"), vec!["B", "A"]);
        assert_eq!(labels("suggested answer:CD 🗳️"), vec!["C", "D"]);
    }

    #[test]
    fn answer_labels_skip_empty_marker() {
        assert_eq!(
            labels("Suggested Answer: see below. Correct Answer: E"),
            vec!["E"]
        );
    }

    #[test]
    fn strip_ui_tail() {
        assert_eq!(
            strip_answer_ui("What is S3? Show Suggested Answer Hide Answer Suggested Answer: CD 🗳️"),
            "What is S3?"
        );
        assert_eq!(
            strip_answer_ui("What is S3?ShowSuggestedAnswer"),
            "What is S3?"
        );
    }

    #[test]
    fn strip_bare_suggested_marker() {
        assert_eq!(strip_answer_ui("Pick one. Suggested Answer: B"), "Pick one.");
        assert_eq!(strip_answer_ui("  untouched  "), "untouched");
    }

    #[test]
    fn strip_inline_choices_needs_a_and_b() {
        assert_eq!(
            strip_inline_choices("Which one? A. first B. second"),
            "Which one?"
        );
        assert_eq!(
            strip_inline_choices("Plan A. is fine"),
            "Plan A. is fine"
        );
        assert_eq!(
            strip_inline_choices("Which one? A) first B) second"),
            "Which one?"
        );
    }

    #[test]
    fn clean_is_a_fixed_point() {
        let dirty = "Q? Suggested Answer: A Show Suggested Answer";
        let once = clean_question_text(dirty);
        assert_eq!(once, "Q?");
        assert_eq!(clean_question_text(&once), once);
    }

    #[test]
    fn choose_n_phrases() {
        assert!(mentions_choose_n("Which are valid? (Choose two.)"));
        assert!(mentions_choose_n("(choose 3)"));
        assert!(mentions_choose_n("( Choose THREE )"));
        assert!(!mentions_choose_n("Choose wisely"));
    }

    #[test]
    fn choice_labels() {
        assert_eq!(
            split_choice_label("A. Amazon S3"),
            (Some("A".into()), "Amazon S3".into())
        );
        assert_eq!(
            split_choice_label("C) Use a queue"),
            (Some("C".into()), "Use a queue".into())
        );
        assert_eq!(
            split_choice_label("D:Lambda"),
            (Some("D".into()), "Lambda".into())
        );
        assert_eq!(split_choice_label("Amazon S3"), (None, "Amazon S3".into()));
    }

    #[test]
    fn single_letter_labels() {
        assert_eq!(single_label(" b "), Some("B".into()));
        assert_eq!(single_label("AB"), None);
        assert_eq!(single_label(""), None);
    }
}
