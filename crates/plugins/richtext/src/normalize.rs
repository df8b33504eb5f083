//! Rewrites legacy wiki shortcuts into the Markdown dialect.
//!
//! Runs line by line before block parsing. Wiki and fenced code blocks are
//! never touched, and neither are backtick code spans.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::compile;

static WIKI_CODE_OPEN: LazyLock<Regex> = LazyLock::new(|| compile(r"^\{(code|noformat)(?::([^}]*))?\}$"));
static WIKI_HEADING: LazyLock<Regex> = LazyLock::new(|| compile(r"^h([1-6])\.\s+(.*)$"));
static WIKI_MONOSPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\{\{(.+?)\}\}"));
static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"\[([^\[\]|]+)\|([^\[\]|]+)\]"));
static BARE_LINK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\[((?:http|www\.)[^\[\]\s]*)\]"));

/// Rewrite legacy wiki syntax into the Markdown dialect.
pub fn normalize(input: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut wiki_block: Option<&'static str> = None;
    let mut in_fence = false;

    for line in input.split('\n') {
        let trimmed = line.trim();

        if let Some(closer) = wiki_block {
            if trimmed == closer {
                out.push("```".to_string());
                wiki_block = None;
            } else {
                out.push(line.to_string());
            }
            continue;
        }

        if in_fence {
            if trimmed.starts_with("```") {
                in_fence = false;
            }
            out.push(line.to_string());
            continue;
        }

        if let Some(caps) = WIKI_CODE_OPEN.captures(trimmed) {
            let (closer, language) = match &caps[1] {
                "noformat" => ("{noformat}", String::new()),
                _ => ("{code}", code_language(caps.get(2).map_or("", |m| m.as_str()))),
            };
            out.push(format!("```{}", language));
            wiki_block = Some(closer);
            continue;
        }

        if trimmed.starts_with("```") {
            in_fence = true;
            out.push(line.to_string());
            continue;
        }

        out.push(normalize_line(line));
    }

    // An unterminated {code} block still gets a closing fence.
    if wiki_block.is_some() {
        out.push("```".to_string());
    }

    out.join("\n")
}

fn normalize_line(line: &str) -> String {
    if line.trim() == "----" {
        return "---".to_string();
    }

    let line = match WIKI_HEADING.captures(line) {
        Some(caps) => {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("{} {}", "#".repeat(level), &caps[2])
        }
        None => line.to_string(),
    };

    let mut out = String::with_capacity(line.len());
    for (text, is_code) in code_spans(&line) {
        if is_code {
            out.push_str(text);
        } else {
            out.push_str(&rewrite_shortcuts(text));
        }
    }
    out
}

fn rewrite_shortcuts(text: &str) -> String {
    let mut text = text.to_string();
    if text.contains("{{") {
        text = WIKI_MONOSPACE.replace_all(&text, "`$1`").into_owned();
    }
    if text.contains('|') {
        text = WIKI_LINK
            .replace_all(&text, |caps: &Captures| format!("[{}]({})", caps[1].trim(), caps[2].trim()))
            .into_owned();
    }
    if text.contains('[') {
        text = rewrite_bare_links(&text);
    }
    text
}

/// Split a line into `(segment, is_code)` pieces. A code span opens with a run
/// of backticks and closes at the next run of the same length; an unclosed run
/// is plain text.
fn code_spans(line: &str) -> Vec<(&str, bool)> {
    let mut spans = Vec::new();
    let mut plain_start = 0;
    let mut pos = 0;
    let bytes = line.as_bytes();

    while pos < bytes.len() {
        if bytes[pos] != b'`' {
            pos += 1;
            continue;
        }
        let run = bytes[pos..].iter().take_while(|&&b| b == b'`').count();
        match find_closing_run(line, pos + run, run) {
            Some(close) => {
                if plain_start < pos {
                    spans.push((&line[plain_start..pos], false));
                }
                spans.push((&line[pos..close + run], true));
                pos = close + run;
                plain_start = pos;
            }
            None => pos += run,
        }
    }
    if plain_start < line.len() {
        spans.push((&line[plain_start..], false));
    }
    spans
}

fn find_closing_run(line: &str, from: usize, run: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut pos = from;
    while pos < bytes.len() {
        if bytes[pos] == b'`' {
            let len = bytes[pos..].iter().take_while(|&&b| b == b'`').count();
            if len == run {
                return Some(pos);
            }
            pos += len;
        } else {
            pos += 1;
        }
    }
    None
}

/// `[url]` becomes `[url](url)`, unless it already is the text of a link.
fn rewrite_bare_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for caps in BARE_LINK.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&line[last..whole.end()]);
        if !line[whole.end()..].starts_with('(') {
            out.push('(');
            out.push_str(&caps[1]);
            out.push(')');
        }
        last = whole.end();
    }
    out.push_str(&line[last..]);
    out
}

/// Language from `{code:...}` options: either a bare name or `language=x`.
fn code_language(options: &str) -> String {
    options
        .split('|')
        .map(str::trim)
        .find_map(|opt| match opt.split_once('=') {
            Some(("language" | "lang", value)) => Some(value.trim().to_string()),
            Some(_) => None,
            None if !opt.is_empty() => Some(opt.to_string()),
            None => None,
        })
        .unwrap_or_default()
}
