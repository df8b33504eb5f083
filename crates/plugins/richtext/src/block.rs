//! Line-oriented block parser.
//!
//! Each line is matched against the block rules in a fixed order; the first
//! rule that accepts it decides the block. Lists, tables, quotes and plain
//! paragraphs keep consuming lines while the following lines continue them.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::compile;
use crate::document::{Node, NodeType};
use crate::inline::parse_inlines;

static PANEL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\[(info|warning|error|success|note|tip)\]\s*(.*)$"));
static DETAILS: LazyLock<Regex> = LazyLock::new(|| compile(r"^<details>(.*)</details>$"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| compile(r"^(#{1,6}) (.*)$"));
static BULLET: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*[-*] (.*)$"));
static ORDERED: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*\d+\. (.*)$"));

/// Parse normalized markup into block nodes.
pub fn parse_blocks(input: &str) -> Vec<Node> {
    let lines: Vec<&str> = input.lines().collect();
    let mut parser = BlockParser { lines, pos: 0 };
    let mut blocks = Vec::new();
    while let Some(block) = parser.next_block() {
        blocks.push(block);
    }
    blocks
}

struct BlockParser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> BlockParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn next_block(&mut self) -> Option<Node> {
        loop {
            let line = self.peek()?;

            if quote_text(line).is_some() {
                return Some(self.blockquote());
            }
            if let Some(panel) = panel(line) {
                self.pos += 1;
                return Some(panel);
            }
            if let Some(language) = fence_language(line) {
                self.pos += 1;
                return Some(self.code_block(language));
            }
            if is_table_row(line) {
                return Some(self.table());
            }
            if let Some(caps) = DETAILS.captures(line.trim()) {
                self.pos += 1;
                let title = caps.get(1).map_or("", |m| m.as_str()).to_string();
                return Some(self.expand(title));
            }
            if let Some(heading) = heading(line) {
                self.pos += 1;
                return Some(heading);
            }
            if is_rule(line) {
                self.pos += 1;
                return Some(Node::block(NodeType::Rule, Vec::new()));
            }
            if BULLET.is_match(line) {
                return Some(self.list(NodeType::BulletList, &BULLET));
            }
            if ORDERED.is_match(line) {
                return Some(self.list(NodeType::OrderedList, &ORDERED));
            }
            if line.trim().is_empty() {
                self.pos += 1;
                continue;
            }
            return Some(self.paragraph());
        }
    }

    /// Consecutive `> ` lines form one quote.
    fn blockquote(&mut self) -> Node {
        let mut inlines = Vec::new();
        while let Some(text) = self.peek().and_then(quote_text) {
            if !inlines.is_empty() {
                inlines.push(Node::hard_break());
            }
            inlines.extend(parse_inlines(text));
            self.pos += 1;
        }
        Node::block(NodeType::Blockquote, vec![Node::paragraph(inlines)])
    }

    fn code_block(&mut self, language: &str) -> Node {
        let mut body: Vec<&str> = Vec::new();
        while let Some(line) = self.peek() {
            self.pos += 1;
            if fence_language(line).is_some() {
                break;
            }
            body.push(line);
        }
        let text = body.join("\n");
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(text)]
        };
        let node = Node::block(NodeType::CodeBlock, content);
        if language.is_empty() {
            node
        } else {
            node.with_attr("language", Value::from(language))
        }
    }

    fn table(&mut self) -> Node {
        let mut rows = Vec::new();
        while let Some(line) = self.peek().filter(|l| is_table_row(l)) {
            self.pos += 1;
            let cells = split_row(line);
            if is_separator_row(&cells) {
                continue;
            }
            let cell_type = if rows.is_empty() {
                NodeType::TableHeader
            } else {
                NodeType::TableCell
            };
            let cells = cells
                .into_iter()
                .map(|cell| Node::block(cell_type, vec![Node::paragraph(parse_inlines(cell))]))
                .collect();
            rows.push(Node::block(NodeType::TableRow, cells));
        }
        Node::block(NodeType::Table, rows)
    }

    /// The title paragraph comes first, then one paragraph per body line up to
    /// the next blank line.
    fn expand(&mut self, title: String) -> Node {
        let mut body = vec![Node::paragraph(parse_inlines(&title))];
        while let Some(line) = self.peek() {
            if line.trim().is_empty() {
                break;
            }
            body.push(Node::paragraph(parse_inlines(line)));
            self.pos += 1;
        }
        Node::block(NodeType::Expand, body).with_attr("title", Value::from(title))
    }

    fn list(&mut self, kind: NodeType, item: &Regex) -> Node {
        let mut items = Vec::new();
        while let Some(caps) = self.peek().and_then(|line| item.captures(line)) {
            let text = caps.get(1).map_or("", |m| m.as_str());
            items.push(Node::block(
                NodeType::ListItem,
                vec![Node::paragraph(parse_inlines(text))],
            ));
            self.pos += 1;
        }
        Node::block(kind, items)
    }

    /// Plain lines up to the next blank line or block start, joined by hard breaks.
    fn paragraph(&mut self) -> Node {
        let mut inlines = Vec::new();
        let mut first = true;
        while let Some(line) = self.peek() {
            if line.trim().is_empty() || (!first && starts_block(line)) {
                break;
            }
            if !first {
                inlines.push(Node::hard_break());
            }
            inlines.extend(parse_inlines(line));
            first = false;
            self.pos += 1;
        }
        Node::paragraph(inlines)
    }
}

fn quote_text(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix("> ")
}

fn panel(line: &str) -> Option<Node> {
    let caps = PANEL.captures(line.trim())?;
    let rest = caps.get(2).map_or("", |m| m.as_str());
    // `[info](url)` is a link, not a panel.
    if rest.starts_with('(') {
        return None;
    }
    let panel_type = match &caps[1] {
        "note" => "info",
        "tip" => "success",
        other => other,
    };
    let body = if rest.is_empty() {
        Vec::new()
    } else {
        vec![Node::paragraph(parse_inlines(rest))]
    };
    Some(Node::block(NodeType::Panel, body).with_attr("panelType", Value::from(panel_type)))
}

fn fence_language(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix("```").map(str::trim)
}

fn heading(line: &str) -> Option<Node> {
    let caps = HEADING.captures(line)?;
    let level = caps[1].len() as u8;
    let text = caps.get(2).map_or("", |m| m.as_str());
    Some(Node::heading(level, parse_inlines(text)))
}

fn is_rule(line: &str) -> bool {
    matches!(line.trim(), "---" | "***" | "___")
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

fn split_row(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let inner = &trimmed[1..trimmed.len() - 1];
    inner.split('|').map(str::trim).collect()
}

fn is_separator_row(cells: &[&str]) -> bool {
    cells.iter().any(|c| c.contains('-'))
        && cells
            .iter()
            .all(|c| c.chars().all(|ch| matches!(ch, '-' | ':' | ' ' | '\t')))
}

/// Whether a line opens anything other than a paragraph.
fn starts_block(line: &str) -> bool {
    quote_text(line).is_some()
        || panel(line).is_some()
        || fence_language(line).is_some()
        || is_table_row(line)
        || DETAILS.is_match(line.trim())
        || HEADING.is_match(line)
        || is_rule(line)
        || BULLET.is_match(line)
        || ORDERED.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(blocks: &[Node]) -> Vec<NodeType> {
        blocks.iter().map(|b| b.kind).collect()
    }

    fn first_text(node: &Node) -> Option<&str> {
        if let Some(text) = node.text.as_deref() {
            return Some(text);
        }
        node.content.iter().find_map(first_text)
    }

    // =========================================================================
    // Recognition order
    // =========================================================================

    #[test]
    fn test_heading_levels() {
        for level in 1..=6u64 {
            let line = format!("{} Title", "#".repeat(level as usize));
            let blocks = parse_blocks(&line);
            assert_eq!(blocks[0].kind, NodeType::Heading);
            assert_eq!(blocks[0].attr_u64("level"), Some(level));
        }
        assert_eq!(parse_blocks("####### seven")[0].kind, NodeType::Paragraph);
        assert_eq!(parse_blocks("#tag")[0].kind, NodeType::Paragraph);
    }

    #[test]
    fn test_rules() {
        for line in ["---", "***", "___", "  ---  "] {
            assert_eq!(kinds(&parse_blocks(line)), vec![NodeType::Rule], "{:?}", line);
        }
    }

    #[test]
    fn test_blockquote_merges_lines() {
        let blocks = parse_blocks("> one\n> two\nafter");
        assert_eq!(kinds(&blocks), vec![NodeType::Blockquote, NodeType::Paragraph]);
        let para = &blocks[0].content[0];
        assert_eq!(para.content.len(), 3);
        assert_eq!(para.content[1].kind, NodeType::HardBreak);
    }

    #[test]
    fn test_panels() {
        let blocks = parse_blocks("[note] read this\n[tip] and this\n[warning] careful");
        let types: Vec<&str> = blocks.iter().map(|b| b.attr_str("panelType").unwrap()).collect();
        assert_eq!(types, vec!["info", "success", "warning"]);
        assert_eq!(first_text(&blocks[0]), Some("read this"));
    }

    #[test]
    fn test_panel_word_followed_by_paren_is_link() {
        let blocks = parse_blocks("[info](https://x)");
        assert_eq!(blocks[0].kind, NodeType::Paragraph);
    }

    #[test]
    fn test_fenced_code() {
        let blocks = parse_blocks("```rust\nfn main() {}\n# not heading\n```\nafter");
        assert_eq!(kinds(&blocks), vec![NodeType::CodeBlock, NodeType::Paragraph]);
        assert_eq!(blocks[0].attr_str("language"), Some("rust"));
        assert_eq!(first_text(&blocks[0]), Some("fn main() {}\n# not heading"));
    }

    #[test]
    fn test_fence_without_language_has_no_attrs() {
        let blocks = parse_blocks("```\nx\n```");
        assert!(blocks[0].attrs.is_none());
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let blocks = parse_blocks("```\na\nb");
        assert_eq!(blocks.len(), 1);
        assert_eq!(first_text(&blocks[0]), Some("a\nb"));
    }

    #[test]
    fn test_table() {
        let blocks = parse_blocks("| Key | Value |\n| --- | :---: |\n| a | **b** |\n| c | d |");
        let table = &blocks[0];
        assert_eq!(table.kind, NodeType::Table);
        assert_eq!(table.content.len(), 3);
        assert!(table.content[0].content.iter().all(|c| c.kind == NodeType::TableHeader));
        assert!(table.content[1].content.iter().all(|c| c.kind == NodeType::TableCell));
        assert_eq!(first_text(&table.content[1].content[1]), Some("b"));
    }

    #[test]
    fn test_expand() {
        let blocks = parse_blocks("<details>More</details>\nline one\nline two\n\nafter");
        assert_eq!(kinds(&blocks), vec![NodeType::Expand, NodeType::Paragraph]);
        assert_eq!(blocks[0].attr_str("title"), Some("More"));
        assert_eq!(blocks[0].content.len(), 3);
        assert_eq!(blocks[0].content[0].kind, NodeType::Paragraph);
        assert_eq!(first_text(&blocks[0].content[0]), Some("More"));
        assert_eq!(first_text(&blocks[0].content[1]), Some("line one"));
    }

    #[test]
    fn test_lists() {
        let blocks = parse_blocks("- a\n* b\n\n1. x\n7. y");
        assert_eq!(kinds(&blocks), vec![NodeType::BulletList, NodeType::OrderedList]);
        assert_eq!(blocks[0].content.len(), 2);
        assert_eq!(blocks[1].content.len(), 2);
        assert_eq!(blocks[1].content[1].kind, NodeType::ListItem);
        assert_eq!(first_text(&blocks[1].content[1]), Some("y"));
    }

    #[test]
    fn test_bold_line_is_not_bullet() {
        assert_eq!(parse_blocks("**bold** start")[0].kind, NodeType::Paragraph);
    }

    #[test]
    fn test_paragraph_lines_join_with_hard_break() {
        let blocks = parse_blocks("first\nsecond\n- item");
        assert_eq!(kinds(&blocks), vec![NodeType::Paragraph, NodeType::BulletList]);
        assert_eq!(blocks[0].content[1].kind, NodeType::HardBreak);
    }

    #[test]
    fn test_blank_lines_skipped() {
        assert!(parse_blocks("\n\n   \n").is_empty());
        assert!(parse_blocks("").is_empty());
    }
}
