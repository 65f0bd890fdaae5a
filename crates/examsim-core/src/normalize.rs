//! Idempotent post-processing of question records.
//!
//! Applied both to records straight off the extractor and to records read back
//! from a cache written by an older parser, so stale heuristics never leak
//! into an export.

use crate::models::{FALLBACK_QUESTION_TEXT, QuestionRecord};
use crate::text;
use crate::votes;

/// Answer labels in `text` that are real choice ids of `record`.
fn known_labels(record: &QuestionRecord, text: &str) -> Vec<String> {
    text::extract_answer_labels(text)
        .into_iter()
        .filter(|label| record.has_choice(label))
        .collect()
}

/// Normalize a record. `normalize(normalize(r)) == normalize(r)`.
pub fn normalize(record: QuestionRecord) -> QuestionRecord {
    let mut out = record;
    let dirty = std::mem::take(&mut out.text);
    out.text = match text::clean_question_text(&dirty) {
        cleaned if cleaned.is_empty() => FALLBACK_QUESTION_TEXT.to_string(),
        cleaned => cleaned,
    };

    // The dirty text is tried first; cutting its answer tail can expose a
    // marker the next pass would otherwise pick up, so the cleaned text is
    // tried as well.
    if out.answer_choice_ids.is_none() {
        let mut known = known_labels(&out, &dirty);
        if known.is_empty() {
            known = known_labels(&out, &out.text);
        }
        if !known.is_empty() {
            out.answer_choice_ids = Some(known);
        }
    }

    let multi_answer = out
        .answer_choice_ids
        .as_ref()
        .is_some_and(|ids| ids.len() > 1);
    match out.is_multi_select {
        None => {
            out.is_multi_select = Some(multi_answer || text::mentions_choose_n(&out.text));
        }
        Some(false) if multi_answer => {
            tracing::warn!(
                id = %out.id,
                "Several answers on a single-select question, marking multi-select"
            );
            out.is_multi_select = Some(true);
        }
        Some(_) => {}
    }

    if let Some(explanation) = &out.explanation {
        if votes::has_vote_markers(explanation) {
            out.explanation = votes::select_top_voted(explanation);
        }
    }

    out
}
