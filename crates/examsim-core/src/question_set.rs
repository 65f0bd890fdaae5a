//! Strict loader for question-set documents.
//!
//! The loader fails closed: the first structural violation aborts the load
//! with the offending field path, and nothing is partially returned.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{Choice, QuestionRecord, QuestionSet};

type Object = Map<String, Value>;

fn format_error(msg: impl Into<String>) -> AppError {
    AppError::DocumentFormat(msg.into())
}

fn require<'a>(obj: &'a Object, key: &str, field: &str) -> Result<&'a Value, AppError> {
    obj.get(key)
        .ok_or_else(|| format_error(format!("missing required field: {field}")))
}

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a Object, AppError> {
    value
        .as_object()
        .ok_or_else(|| format_error(format!("{field} must be an object")))
}

fn as_str(value: &Value, field: &str) -> Result<String, AppError> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(format_error(format!("{field} must be a non-empty string"))),
    }
}

fn as_optional_str(value: Option<&Value>, field: &str) -> Result<Option<String>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(_) => Err(format_error(format!("{field} must be a string or null"))),
    }
}

fn as_optional_str_list(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<Vec<String>>, AppError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(format_error(format!(
                "{field} must be a list of strings or null"
            )));
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let s = item.as_str().ok_or_else(|| {
            format_error(format!("{field} must be a list of strings or null"))
        })?;
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
    Ok((!out.is_empty()).then_some(out))
}

fn as_optional_bool(value: Option<&Value>, field: &str) -> Result<Option<bool>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(format_error(format!("{field} must be a boolean or null"))),
    }
}

fn parse_question(
    value: &Value,
    field: &str,
    seen_qids: &mut HashSet<String>,
) -> Result<QuestionRecord, AppError> {
    let q = as_object(value, field)?;

    let id = as_str(require(q, "id", &format!("{field}.id"))?, &format!("{field}.id"))?;
    if !seen_qids.insert(id.clone()) {
        return Err(format_error(format!("duplicate question id: {id}")));
    }

    let text = as_str(
        require(q, "text", &format!("{field}.text"))?,
        &format!("{field}.text"),
    )?;

    let choices_raw = require(q, "choices", &format!("{field}.choices"))?
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| format_error(format!("{field}.choices must be a non-empty list")))?;

    let mut seen_cids: HashSet<String> = HashSet::with_capacity(choices_raw.len());
    let mut choices = Vec::with_capacity(choices_raw.len());
    for (j, c) in choices_raw.iter().enumerate() {
        let cfield = format!("{field}.choices[{j}]");
        let c = as_object(c, &cfield)?;
        let cid = as_str(
            require(c, "id", &format!("{cfield}.id"))?,
            &format!("{cfield}.id"),
        )?;
        if !seen_cids.insert(cid.clone()) {
            return Err(format_error(format!(
                "duplicate choice id in question {id}: {cid}"
            )));
        }
        let ctext = as_str(
            require(c, "text", &format!("{cfield}.text"))?,
            &format!("{cfield}.text"),
        )?;
        choices.push(Choice::new(cid, ctext));
    }

    let answer_field = format!("{field}.answer_choice_ids");
    let answer_choice_ids = as_optional_str_list(q.get("answer_choice_ids"), &answer_field)?;
    if let Some(ids) = &answer_choice_ids {
        let unknown: Vec<&str> = ids
            .iter()
            .filter(|cid| !seen_cids.contains(*cid))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(format_error(format!(
                "{answer_field} contains unknown choice ids: {unknown:?}"
            )));
        }
    }

    Ok(QuestionRecord {
        id,
        text,
        choices,
        answer_choice_ids,
        is_multi_select: as_optional_bool(
            q.get("is_multi_select"),
            &format!("{field}.is_multi_select"),
        )?,
        explanation: as_optional_str(q.get("explanation"), &format!("{field}.explanation"))?,
        tags: as_optional_str_list(q.get("tags"), &format!("{field}.tags"))?,
    })
}

/// Validate an already-decoded JSON value as a question set.
pub fn parse_question_set(value: &Value) -> Result<QuestionSet, AppError> {
    let root = value
        .as_object()
        .ok_or_else(|| format_error("root must be an object"))?;

    let set_id = as_str(require(root, "set_id", "set_id")?, "set_id")?;
    let title = as_str(require(root, "title", "title")?, "title")?;
    let questions_raw = require(root, "questions", "questions")?
        .as_array()
        .ok_or_else(|| format_error("questions must be a list"))?;

    let mut seen_qids = HashSet::with_capacity(questions_raw.len());
    let questions = questions_raw
        .iter()
        .enumerate()
        .map(|(i, q)| parse_question(q, &format!("questions[{i}]"), &mut seen_qids))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuestionSet {
        set_id,
        title,
        questions,
    })
}

/// Check one record against the rules the loader applies to each question.
pub fn check_question(record: &QuestionRecord) -> Result<(), AppError> {
    let value = serde_json::to_value(record)?;
    parse_question(&value, "question", &mut HashSet::new()).map(|_| ())
}

/// Load a question set from raw JSON bytes.
pub fn load_question_set(bytes: &[u8]) -> Result<QuestionSet, AppError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| format_error(format!("failed to parse JSON: {e}")))?;
    parse_question_set(&value)
}

/// Load a question set from a file.
pub fn load_question_set_file(path: &Path) -> Result<QuestionSet, AppError> {
    let bytes = std::fs::read(path)?;
    load_question_set(&bytes)
}

/// Serialize a question set in the fixed export format (pretty, trailing newline).
pub fn to_document_bytes(set: &QuestionSet) -> Result<Vec<u8>, AppError> {
    let mut bytes = serde_json::to_vec_pretty(set)?;
    bytes.push(b'\n');
    Ok(bytes)
}
