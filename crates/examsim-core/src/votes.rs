//! Top-voted comment selection over a raw discussion dump.
//!
//! A discussion page renders every comment followed by an `upvoted N times`
//! marker. The text between two markers is one vote block; the block with the
//! most votes becomes the question's explanation.

use std::sync::LazyLock;

use regex::Regex;

static VOTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bupvoted\s+(\d+)\s+times?\b").expect("valid regex"));

static LEADING_ELLIPSIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\.\.\.\s*").expect("valid regex"));

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

static AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(\S+)\s+(.*)$").expect("valid regex"));

static BADGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:Highly\s+Voted|Most\s+Recent)\b").expect("valid regex"));

static AGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\w\s,]*?\bago)\b").expect("valid regex"));

static SELECTED_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Selected\s+Answer\s*:\s*([A-Z]{1,6})\b").expect("valid regex")
});

static CORRECT_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:\bCorrect)\s+([A-Z]{1,6})\b").expect("valid regex"));

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(https?://\S+)").expect("valid regex"));

/// One comment's text and the vote count that closed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteBlock {
    pub votes: u64,
    pub text: String,
}

/// A vote block broken into its labeled parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopComment {
    pub votes: u64,
    pub author: Option<String>,
    pub age: Option<String>,
    pub selected_answer: Option<String>,
    pub body: String,
}

impl TopComment {
    /// Render as the fixed-order labeled block stored in `explanation`.
    pub fn render(&self) -> String {
        let mut lines = vec![format!("Top voted ({} votes)", self.votes), String::new()];
        if let Some(author) = &self.author {
            lines.push(format!("author: {author}"));
        }
        if let Some(age) = &self.age {
            lines.push(age.clone());
        }
        if let Some(selected) = &self.selected_answer {
            lines.push(format!("Selected Answer: {selected}"));
        }
        if !self.body.is_empty() {
            lines.push(String::new());
            lines.push(self.body.clone());
        }
        lines.join("\n").trim().to_string()
    }
}

/// True when the text still carries `upvoted N times` markers.
pub fn has_vote_markers(text: &str) -> bool {
    VOTE_MARKER.is_match(text)
}

/// Split a discussion dump into vote blocks, in page order.
///
/// Text after the last marker belongs to no block and is dropped, as are
/// blocks that are empty once the leading `...` separator is removed.
pub fn vote_blocks(text: &str) -> Vec<VoteBlock> {
    let mut blocks = Vec::new();
    let mut start = 0;
    for caps in VOTE_MARKER.captures_iter(text) {
        let Some(marker) = caps.get(0) else { continue };
        let segment = text[start..marker.start()].trim();
        let segment = LEADING_ELLIPSIS.replace(segment, "");
        let votes = caps[1].parse().unwrap_or(0);
        if !segment.is_empty() {
            blocks.push(VoteBlock {
                votes,
                text: segment.into_owned(),
            });
        }
        start = marker.end();
    }
    blocks
}

/// Select the highest-voted comment of a discussion and render it.
///
/// Returns `None` for an empty dump and the trimmed dump itself when it has no
/// vote markers. Ties go to the earliest block.
pub fn select_top_voted(discussion: &str) -> Option<String> {
    let text = discussion.replace('\u{a0}', " ");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut best: Option<VoteBlock> = None;
    for block in vote_blocks(text) {
        if best.as_ref().is_none_or(|b| block.votes > b.votes) {
            best = Some(block);
        }
    }

    match best {
        Some(block) => Some(decompose(&block).render()),
        None => Some(text.to_string()),
    }
}

/// Best-effort split of a vote block into author, age, selected answer and body.
pub fn decompose(block: &VoteBlock) -> TopComment {
    let text = block.text.replace(" ... ", "\n\n").replace("...", "\n\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = text.trim();

    let (author, rest) = match AUTHOR.captures(text) {
        Some(caps) => (Some(caps[1].trim().to_string()), caps[2].trim().to_string()),
        None => (None, text.to_string()),
    };
    let rest = BADGES.replace_all(&rest, "").trim().to_string();

    let age = AGE.captures(&rest).map(|caps| caps[1].trim().to_string());

    let (selected_answer, body) = match SELECTED_ANSWER
        .captures(&rest)
        .or_else(|| CORRECT_LETTERS.captures(&rest))
    {
        Some(caps) => {
            let end = caps.get(0).map_or(rest.len(), |m| m.end());
            (Some(caps[1].to_uppercase()), rest[end..].trim().to_string())
        }
        None => (None, rest.clone()),
    };

    let body = match &age {
        Some(age) => body
            .trim_start()
            .strip_prefix(age.as_str())
            .map(|b| b.trim().to_string())
            .unwrap_or(body),
        None => body,
    };
    let body = LINK.replace_all(&body, "\n$1").trim().to_string();

    TopComment {
        votes: block.votes,
        author,
        age,
        selected_answer,
        body,
    }
}
