//! Inline parser: turns one run of text into text, mention, emoji and status nodes.
//!
//! At each character boundary every pattern is tried anchored at the cursor.
//! The longest match wins and ties go to the pattern listed first. Bytes no
//! pattern claims collect in a buffer that is flushed as one text node.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::compile;
use crate::document::{Mark, MarkType, Node};

#[derive(Debug, Clone, Copy)]
enum Emit {
    Link,
    Code,
    StrongEm,
    Strong,
    Em,
    Strike,
    Underline,
    Status,
    Emoji,
    Mention,
}

struct Pattern {
    regex: Regex,
    emit: Emit,
    /// Only match when the previous character is not alphanumeric
    word_start: bool,
}

impl Pattern {
    fn new(pattern: &'static str, emit: Emit) -> Self {
        Self {
            regex: compile(pattern),
            emit,
            word_start: false,
        }
    }

    fn at_word_start(mut self) -> Self {
        self.word_start = true;
        self
    }
}

/// Pattern table in priority order.
static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        Pattern::new(r"^\[([^\[\]]+)\]\(([^()\s]+)\)", Emit::Link),
        Pattern::new(r"^`([^`]+)`", Emit::Code),
        Pattern::new(r"^\*\*\*([^*]+)\*\*\*", Emit::StrongEm),
        Pattern::new(r"^\*\*([^*]+)\*\*", Emit::Strong),
        Pattern::new(r"^__([^_]+)__", Emit::Strong).at_word_start(),
        Pattern::new(r"^\*([^*\s](?:[^*]*[^*\s])?)\*", Emit::Em).at_word_start(),
        Pattern::new(r"^_([^_\s](?:[^_]*[^_\s])?)_", Emit::Em).at_word_start(),
        Pattern::new(r"^~~([^~]+)~~", Emit::Strike),
        Pattern::new(r"^\+\+([^+]+)\+\+", Emit::Underline),
        Pattern::new(r"^\[status:([^\]]+)\]", Emit::Status),
        Pattern::new(r"^:([A-Za-z0-9_]+):", Emit::Emoji).at_word_start(),
        Pattern::new(r"^@([A-Za-z0-9_](?:[A-Za-z0-9._-]*[A-Za-z0-9_])?)", Emit::Mention).at_word_start(),
    ]
});

/// Parse a run of text into inline nodes.
pub fn parse_inlines(text: &str) -> Vec<Node> {
    let bytes = text.as_bytes();
    let mut nodes = Vec::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if text.is_char_boundary(pos) {
            if let Some((len, node)) = longest_match(text, pos) {
                flush(&mut pending, &mut nodes);
                nodes.push(node);
                pos += len;
                continue;
            }
        }
        pending.push(bytes[pos]);
        pos += 1;
    }
    flush(&mut pending, &mut nodes);
    nodes
}

fn longest_match(text: &str, pos: usize) -> Option<(usize, Node)> {
    let rest = &text[pos..];
    let after_word = text[..pos]
        .chars()
        .next_back()
        .is_some_and(char::is_alphanumeric);

    let mut best: Option<(usize, &Pattern, Captures<'_>)> = None;
    for pattern in PATTERNS.iter() {
        if pattern.word_start && after_word {
            continue;
        }
        let Some(caps) = pattern.regex.captures(rest) else {
            continue;
        };
        let len = caps.get(0).map_or(0, |m| m.end());
        if len == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |(best_len, _, _)| len > *best_len) {
            best = Some((len, pattern, caps));
        }
    }

    best.map(|(len, pattern, caps)| (len, emit(pattern.emit, &caps)))
}

fn emit(kind: Emit, caps: &Captures<'_>) -> Node {
    let inner = caps.get(1).map_or("", |m| m.as_str());
    match kind {
        Emit::Link => {
            let href = caps.get(2).map_or("", |m| m.as_str());
            Node::marked(inner, vec![Mark::link(href)])
        }
        Emit::Code => Node::marked(inner, vec![Mark::new(MarkType::Code)]),
        Emit::StrongEm => Node::marked(
            inner,
            vec![Mark::new(MarkType::Strong), Mark::new(MarkType::Em)],
        ),
        Emit::Strong => Node::marked(inner, vec![Mark::new(MarkType::Strong)]),
        Emit::Em => Node::marked(inner, vec![Mark::new(MarkType::Em)]),
        Emit::Strike => Node::marked(inner, vec![Mark::new(MarkType::Strike)]),
        Emit::Underline => Node::marked(inner, vec![Mark::new(MarkType::Underline)]),
        Emit::Status => Node::status(inner),
        Emit::Emoji => Node::emoji(inner),
        Emit::Mention => Node::mention(inner),
    }
}

fn flush(pending: &mut Vec<u8>, nodes: &mut Vec<Node>) {
    if pending.is_empty() {
        return;
    }
    // Flushes only happen on character boundaries, so the bytes are valid UTF-8.
    let text = match String::from_utf8(std::mem::take(pending)) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    nodes.push(Node::text(text));
}
