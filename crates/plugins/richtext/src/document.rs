//! The structured document tree.
//!
//! A [`Document`] is a versioned list of typed [`Node`]s. Text nodes carry
//! [`Mark`]s. Node and mark types that this crate does not know are kept as
//! `Unknown` so documents fetched from a server always deserialize.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document format version.
pub const DOC_VERSION: u32 = 1;

/// Root of a rich-text document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<Node>,
}

impl Document {
    pub fn new(content: Vec<Node>) -> Self {
        Self {
            version: DOC_VERSION,
            kind: "doc".to_string(),
            content,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    // Blocks
    Paragraph,
    Heading,
    BulletList,
    OrderedList,
    ListItem,
    CodeBlock,
    Blockquote,
    Rule,
    Table,
    TableRow,
    TableCell,
    TableHeader,
    Panel,
    Expand,
    // Inlines
    Text,
    Mention,
    Emoji,
    Status,
    HardBreak,
    #[serde(other)]
    Unknown,
}

/// Text mark types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkType {
    Code,
    Strike,
    Underline,
    Em,
    Strong,
    Link,
    #[serde(other)]
    Unknown,
}

impl MarkType {
    /// Position when applying marks innermost-first.
    pub fn rank(&self) -> u8 {
        match self {
            MarkType::Code => 0,
            MarkType::Strike => 1,
            MarkType::Underline => 2,
            MarkType::Em => 3,
            MarkType::Strong => 4,
            MarkType::Link => 5,
            MarkType::Unknown => 6,
        }
    }
}

/// A formatting mark on a text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: MarkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

impl Mark {
    pub fn new(kind: MarkType) -> Self {
        Self { kind, attrs: None }
    }

    pub fn link(href: &str) -> Self {
        let mut attrs = Map::new();
        attrs.insert("href".to_string(), Value::String(href.to_string()));
        Self {
            kind: MarkType::Link,
            attrs: Some(attrs),
        }
    }

    pub fn href(&self) -> Option<&str> {
        self.attrs.as_ref()?.get("href")?.as_str()
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl Node {
    /// A node of `kind` with children.
    pub fn block(kind: NodeType, content: Vec<Node>) -> Self {
        Self {
            kind,
            attrs: None,
            content,
            text: None,
            marks: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::block(NodeType::Text, Vec::new())
        }
    }

    pub fn marked(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            marks,
            ..Self::text(text)
        }
    }

    pub fn paragraph(content: Vec<Node>) -> Self {
        Self::block(NodeType::Paragraph, content)
    }

    pub fn heading(level: u8, content: Vec<Node>) -> Self {
        Self::block(NodeType::Heading, content).with_attr("level", Value::from(level))
    }

    pub fn hard_break() -> Self {
        Self::block(NodeType::HardBreak, Vec::new())
    }

    pub fn mention(name: &str) -> Self {
        Self::block(NodeType::Mention, Vec::new())
            .with_attr("id", Value::from(name))
            .with_attr("text", Value::from(name))
    }

    /// Emoji node; `name` is stored colon-wrapped as `shortName`.
    pub fn emoji(name: &str) -> Self {
        Self::block(NodeType::Emoji, Vec::new())
            .with_attr("shortName", Value::from(format!(":{}:", name)))
    }

    pub fn status(text: &str) -> Self {
        Self::block(NodeType::Status, Vec::new())
            .with_attr("text", Value::from(text))
            .with_attr("color", Value::from("neutral"))
    }

    /// Set one attribute.
    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attrs
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.as_ref()?.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key)?.as_str()
    }

    pub fn attr_u64(&self, key: &str) -> Option<u64> {
        self.attr(key)?.as_u64()
    }

    /// Whether this node sits inside running text.
    pub fn is_inline(&self) -> bool {
        matches!(
            self.kind,
            NodeType::Text
                | NodeType::Mention
                | NodeType::Emoji
                | NodeType::Status
                | NodeType::HardBreak
        )
    }

    /// Marks sorted innermost-first, one per type.
    pub fn sorted_marks(&self) -> Vec<&Mark> {
        let mut marks: Vec<&Mark> = self.marks.iter().collect();
        marks.sort_by_key(|m| m.kind.rank());
        marks.dedup_by_key(|m| m.kind);
        marks
    }
}
