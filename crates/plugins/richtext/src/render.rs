//! Document tree back to markup.
//!
//! Every block renders to text ending in a newline and top-level blocks are
//! joined with one blank line. Marks are applied innermost-first in the
//! order code, strike, underline, em, strong, link.

use crate::document::{Document, MarkType, Node, NodeType};

/// Render a whole document.
pub fn render_document(doc: &Document) -> String {
    render_blocks(&doc.content)
}

fn render_blocks(blocks: &[Node]) -> String {
    blocks
        .iter()
        .map(render_block)
        .filter(|rendered| !rendered.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_block(node: &Node) -> String {
    match node.kind {
        NodeType::Paragraph => format!("{}\n", render_inlines(&node.content)),
        NodeType::Heading => {
            let level = node.attr_u64("level").unwrap_or(1).clamp(1, 6) as usize;
            format!("{} {}\n", "#".repeat(level), render_inlines(&node.content))
        }
        NodeType::BulletList | NodeType::OrderedList => render_list(node, 0),
        NodeType::CodeBlock => {
            let language = node.attr_str("language").unwrap_or("");
            let body = plain_text(node);
            if body.is_empty() {
                format!("```{}\n```\n", language)
            } else {
                format!("```{}\n{}\n```\n", language, body)
            }
        }
        NodeType::Blockquote => {
            let inner = node
                .content
                .iter()
                .map(render_block)
                .collect::<String>();
            inner.lines().map(|line| format!("> {}\n", line)).collect()
        }
        NodeType::Rule => "---\n".to_string(),
        NodeType::Table => render_table(node),
        NodeType::Panel => {
            let panel_type = node.attr_str("panelType").unwrap_or("info");
            let body = flatten_blocks(&node.content);
            if body.is_empty() {
                format!("[{}]\n", panel_type)
            } else {
                format!("[{}] {}\n", panel_type, body)
            }
        }
        NodeType::Expand => {
            let (title, body) = expand_parts(node);
            let body: String = body.iter().map(render_block).collect();
            format!("<details>{}</details>\n{}", title, body)
        }
        NodeType::ListItem | NodeType::TableRow | NodeType::TableCell | NodeType::TableHeader => {
            let body = flatten_blocks(&node.content);
            format!("{}\n", body)
        }
        _ if node.is_inline() => format!("{}\n", render_inlines(std::slice::from_ref(node))),
        _ => render_unknown_block(node),
    }
}

/// A leading paragraph is the title when it repeats `attrs.title` or when
/// there is no `attrs.title`.
fn expand_parts(node: &Node) -> (String, &[Node]) {
    let leading = node
        .content
        .first()
        .filter(|first| first.kind == NodeType::Paragraph)
        .map(|first| render_inlines(&first.content));
    match (node.attr_str("title"), leading) {
        (Some(title), Some(leading)) if leading == title => (leading, &node.content[1..]),
        (Some(title), _) => (title.to_string(), node.content.as_slice()),
        (None, Some(leading)) => (leading, &node.content[1..]),
        (None, None) => (String::new(), node.content.as_slice()),
    }
}

/// Unknown blocks render their children, or their text if they have any.
fn render_unknown_block(node: &Node) -> String {
    if let Some(text) = node.text.as_deref() {
        return format!("{}\n", text);
    }
    if node.content.is_empty() {
        return String::new();
    }
    if node.content.iter().all(Node::is_inline) {
        return format!("{}\n", render_inlines(&node.content));
    }
    node.content.iter().map(render_block).collect()
}

fn render_list(list: &Node, depth: usize) -> String {
    let ordered = list.kind == NodeType::OrderedList;
    let start = list.attr_u64("order").unwrap_or(1);
    let pad = "  ".repeat(depth);
    let mut out = String::new();

    for (index, item) in list.content.iter().enumerate() {
        let marker = if ordered {
            format!("{}. ", start + index as u64)
        } else {
            "- ".to_string()
        };
        let children = if item.kind == NodeType::ListItem {
            item.content.as_slice()
        } else {
            std::slice::from_ref(item)
        };

        let mut wrote_first = false;
        for child in children {
            match child.kind {
                NodeType::BulletList | NodeType::OrderedList => {
                    if !wrote_first {
                        out.push_str(&format!("{}{}\n", pad, marker.trim_end()));
                        wrote_first = true;
                    }
                    out.push_str(&render_list(child, depth + 1));
                }
                _ => {
                    let text = render_block(child);
                    let text = text.trim_end_matches('\n');
                    let continuation = format!("\n{}  ", pad);
                    let text = text.replace('\n', &continuation);
                    if wrote_first {
                        out.push_str(&format!("{}  {}\n", pad, text));
                    } else {
                        out.push_str(&format!("{}{}{}\n", pad, marker, text));
                        wrote_first = true;
                    }
                }
            }
        }
        if !wrote_first {
            out.push_str(&format!("{}{}\n", pad, marker.trim_end()));
        }
    }
    out
}

fn render_table(table: &Node) -> String {
    let mut out = String::new();
    for (index, row) in table.content.iter().enumerate() {
        let cells: Vec<String> = row
            .content
            .iter()
            .map(|cell| flatten_blocks(&cell.content).replace('\n', " "))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));

        let header = !row.content.is_empty()
            && row.content.iter().all(|cell| cell.kind == NodeType::TableHeader);
        if index == 0 && header {
            let rule = vec!["---"; cells.len()].join(" | ");
            out.push_str(&format!("| {} |\n", rule));
        }
    }
    out
}

/// Render child blocks as one line of text without the trailing newline.
fn flatten_blocks(blocks: &[Node]) -> String {
    if blocks.iter().all(Node::is_inline) {
        return render_inlines(blocks);
    }
    blocks
        .iter()
        .map(render_block)
        .collect::<String>()
        .trim_end_matches('\n')
        .to_string()
}

/// Render a run of inline nodes.
pub fn render_inlines(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node.kind {
            NodeType::Text => out.push_str(&apply_marks(node)),
            NodeType::HardBreak => out.push('\n'),
            NodeType::Mention => {
                let name = node
                    .attr_str("text")
                    .or_else(|| node.attr_str("id"))
                    .unwrap_or("");
                out.push('@');
                out.push_str(name.trim_start_matches('@'));
            }
            NodeType::Emoji => {
                let short = node
                    .attr_str("shortName")
                    .or_else(|| node.attr_str("text"))
                    .unwrap_or("");
                let name = short.trim_matches(':');
                if !name.is_empty() {
                    out.push_str(&format!(":{}:", name));
                }
            }
            NodeType::Status => {
                out.push_str(&format!("[status:{}]", node.attr_str("text").unwrap_or("")));
            }
            _ if node.text.is_some() => out.push_str(&apply_marks(node)),
            _ if !node.content.is_empty() => out.push_str(&flatten_blocks(&node.content)),
            // Inline cards and similar carry only a URL.
            _ => {
                if let Some(url) = node.attr_str("url") {
                    out.push_str(url);
                }
            }
        }
    }
    out
}

fn apply_marks(node: &Node) -> String {
    let mut text = node.text.clone().unwrap_or_default();
    for mark in node.sorted_marks() {
        text = match mark.kind {
            MarkType::Code => format!("`{}`", text),
            MarkType::Strike => format!("~~{}~~", text),
            MarkType::Underline => format!("++{}++", text),
            MarkType::Em => format!("*{}*", text),
            MarkType::Strong => format!("**{}**", text),
            MarkType::Link => match mark.href() {
                Some(href) => format!("[{}]({})", text, href),
                None => text,
            },
            MarkType::Unknown => text,
        };
    }
    text
}

/// Concatenated text of every text node below `node`.
fn plain_text(node: &Node) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Node, out: &mut String) {
    if let Some(text) = node.text.as_deref() {
        out.push_str(text);
    }
    for child in &node.content {
        collect_text(child, out);
    }
}
