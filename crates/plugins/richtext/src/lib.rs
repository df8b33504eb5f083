//! Rich-text conversion between markup and the structured document tree.
//!
//! The markup is a Markdown dialect that also accepts common legacy wiki
//! shortcuts (`h1.`, `{code}`, `{{mono}}`, `[text|url]`). [`to_doc`] turns it
//! into a [`Document`]; [`to_markup`] renders a document back. On the
//! canonical subset the two are inverse:
//!
//! ```
//! let markup = "# Title\n\nSome **bold** text.\n";
//! let doc = atlas_richtext::to_doc(markup);
//! assert_eq!(atlas_richtext::to_markup(&doc), markup);
//! ```

pub mod block;
pub mod document;
pub mod inline;
pub mod normalize;
pub mod render;

pub use document::{Document, Mark, MarkType, Node, NodeType, DOC_VERSION};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

/// Parse markup into a document.
pub fn to_doc(markup: &str) -> Document {
    let normalized = normalize::normalize(markup);
    let content = block::parse_blocks(&normalized);
    trace!(blocks = content.len(), "parsed markup");
    Document::new(content)
}

/// Render a document as markup.
pub fn to_markup(doc: &Document) -> String {
    render::render_document(doc)
}

/// Render a JSON value holding a document.
///
/// Strings are returned as they are and `null` becomes an empty string, so
/// fields that hold either plain text or a document can be passed directly.
pub fn value_to_markup(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => match serde_json::from_value::<Document>(other.clone()) {
            Ok(doc) => to_markup(&doc),
            Err(err) => {
                debug!(error = %err, "value is not a document, rendering as JSON");
                other.to_string()
            }
        },
    }
}

/// Convert markup to the wiki storage representation.
///
/// Currently a pass-through: the markup is sent unchanged.
pub fn to_storage(markup: &str) -> String {
    markup.to_string()
}

/// Compile one of the crate's built-in patterns.
pub(crate) fn compile(pattern: &'static str) -> Regex {
    // Every built-in pattern is covered by the tests below.
    Regex::new(pattern).expect("built-in pattern must compile")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(markup: &str) -> String {
        to_markup(&to_doc(markup))
    }

    fn assert_round_trip(markup: &str) {
        assert_eq!(round_trip(markup), markup, "round trip changed {:?}", markup);
    }

    const PRIMITIVES: &[&str] = &[
        "A plain paragraph.\n",
        "# Heading one\n",
        "## Heading two\n",
        "### Heading three\n",
        "#### Heading four\n",
        "##### Heading five\n",
        "###### Heading six\n",
        "- one\n- two\n- three\n",
        "1. first\n2. second\n",
        "```go\nf()\n```\n",
        "```\nplain\ncode\n```\n",
        "---\n",
        "> quoted text\n",
        "[info] An info panel\n",
        "[warning] Watch out\n",
        "[error] Broken\n",
        "[success] Done\n",
        "Text with **strong** words.\n",
        "Text with *em* words.\n",
        "Text with `code` words.\n",
        "Text with ~~strike~~ words.\n",
        "Text with ++underline++ words.\n",
        "Text with [a link](https://example.com/x) inside.\n",
        "Status [status:IN PROGRESS] here.\n",
        "Emoji :smile: here.\n",
        "Ping @jane.doe please.\n",
        "Both ***strong em*** marks.\n",
    ];

    // =========================================================================
    // Round trip
    // =========================================================================

    #[test]
    fn test_round_trip_document_scenario() {
        let markup = "# Title\n\nA **bold** and *italic* paragraph with `code` and [link](https://x).\n\n- one\n- two\n\n---\n\n```go\nf()\n```\n";
        assert_round_trip(markup);
    }

    #[test]
    fn test_round_trip_each_primitive() {
        for markup in PRIMITIVES {
            assert_round_trip(markup);
        }
    }

    #[test]
    fn test_round_trip_concatenations() {
        for a in PRIMITIVES {
            for b in PRIMITIVES {
                assert_round_trip(&format!("{}\n{}", a, b));
            }
        }
        assert_round_trip(&PRIMITIVES.join("\n"));
    }

    #[test]
    fn test_trailing_newline_is_normalized() {
        assert_eq!(round_trip("# Title"), "# Title\n");
    }

    #[test]
    fn test_round_trip_utf8_text() {
        for text in ["naïve café", "日本語のテキスト", "emoji 🎉🚀 inside", "mixed ünïcödé and ascii"] {
            let markup = format!("{}\n", text);
            let doc = to_doc(&markup);
            let node = &doc.content[0].content[0];
            assert_eq!(node.text.as_deref(), Some(text));
            assert_eq!(to_markup(&doc), markup);
        }
    }

    #[test]
    fn test_empty_string() {
        let doc = to_doc("");
        assert!(doc.is_empty());
        assert_eq!(doc.version, 1);
        assert_eq!(doc.kind, "doc");
        assert_eq!(to_markup(&doc), "");
    }

    // =========================================================================
    // Legacy wiki input
    // =========================================================================

    #[test]
    fn test_wiki_markup_converted() {
        let markup = "h2. Steps\n\nRun {{make}} then see [docs|https://d.example]\n\n{code:bash}\necho hi\n{code}\n\n----\n";
        assert_eq!(
            round_trip(markup),
            "## Steps\n\nRun `make` then see [docs](https://d.example)\n\n```bash\necho hi\n```\n\n---\n"
        );
    }

    #[test]
    fn test_wiki_shortcuts_inside_code_spans_round_trip() {
        assert_round_trip("Use `{{x}}` literally.\n");
        assert_round_trip("Code `[https://a.b]` here.\n");
        assert_round_trip("Pipe `[a|b]` stays.\n");
        assert_eq!(
            round_trip("`[a|b]` but [a|https://b.example]\n"),
            "`[a|b]` but [a](https://b.example)\n"
        );
    }

    #[test]
    fn test_note_and_tip_panels_map() {
        assert_eq!(round_trip("[note] n\n\n[tip] t\n"), "[info] n\n\n[success] t\n");
    }

    #[test]
    fn test_ordered_list_renumbers() {
        assert_eq!(round_trip("3. a\n9. b\n"), "1. a\n2. b\n");
    }

    #[test]
    fn test_table_round_trip() {
        assert_round_trip("| Key | Value |\n| --- | --- |\n| a | **b** |\n");
    }

    #[test]
    fn test_expand_round_trip() {
        assert_round_trip("<details>More</details>\nhidden line\n");
    }

    #[test]
    fn test_expand_json_shape() {
        let doc = to_doc("<details>Title</details>\nbody\n");
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "version": 1,
                "type": "doc",
                "content": [{
                    "type": "expand",
                    "attrs": {"title": "Title"},
                    "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "Title"}]},
                        {"type": "paragraph", "content": [{"type": "text", "text": "body"}]}
                    ]
                }]
            })
        );
    }

    // =========================================================================
    // JSON values
    // =========================================================================

    #[test]
    fn test_document_json_shape() {
        let doc = to_doc("Hi **there**");
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "version": 1,
                "type": "doc",
                "content": [{
                    "type": "paragraph",
                    "content": [
                        {"type": "text", "text": "Hi "},
                        {"type": "text", "text": "there", "marks": [{"type": "strong"}]}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_value_to_markup() {
        assert_eq!(value_to_markup(&Value::Null), "");
        assert_eq!(value_to_markup(&json!("plain")), "plain");
        let doc = serde_json::to_value(to_doc("# T\n")).unwrap();
        assert_eq!(value_to_markup(&doc), "# T\n");
        assert_eq!(value_to_markup(&json!({"not": "a doc"})), r#"{"not":"a doc"}"#);
    }

    #[test]
    fn test_storage_is_pass_through() {
        assert_eq!(to_storage("<p>x</p> **y**"), "<p>x</p> **y**");
    }
}
