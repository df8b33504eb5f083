//! Confluence API types.

use serde::{Deserialize, Serialize};

// =============================================================================
// Raw content
// =============================================================================

/// Content item (page or comment) as returned by `/rest/api/content`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawContent {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub space: Option<RawSpace>,
    #[serde(default)]
    pub version: Option<RawVersion>,
    #[serde(default)]
    pub body: Option<RawBody>,
    #[serde(default)]
    pub history: Option<RawHistory>,
    #[serde(default, rename = "_links")]
    pub links: Option<RawLinks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpace {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVersion {
    pub number: u64,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub by: Option<ConfluenceUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBody {
    #[serde(default)]
    pub storage: Option<RawStorage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStorage {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistory {
    #[serde(default)]
    pub created_by: Option<ConfluenceUser>,
    #[serde(default)]
    pub created_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLinks {
    #[serde(default)]
    pub webui: Option<String>,
}

/// Paged list of content, labels or search hits.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "totalSize", default)]
    pub total_size: Option<u64>,
}

/// Confluence user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfluenceUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ConfluenceUser {
    pub fn label(&self) -> Option<String> {
        self.display_name
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| self.account_id.clone())
    }
}

// =============================================================================
// Simplified records
// =============================================================================

/// Wiki page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Storage representation; omitted when not requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Footer comment on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// Content label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "global".to_string()
}

/// One page of search hits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// CQL actually sent
    pub cql: String,
    pub results: Vec<Page>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreatePageInput {
    pub space_key: String,
    pub title: String,
    /// Markup, converted to the storage representation
    pub body: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdatePageInput {
    /// Keeps the current title when unset
    pub title: Option<String>,
    /// Keeps the current body when unset
    pub body: Option<String>,
    pub version_comment: Option<String>,
    pub minor_edit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_content_full() {
        let content: RawContent = serde_json::from_value(json!({
            "id": "123",
            "type": "page",
            "title": "Runbook",
            "space": {"key": "OPS", "name": "Operations"},
            "version": {"number": 4, "when": "2024-01-01T00:00:00.000Z"},
            "body": {"storage": {"value": "<p>hi</p>", "representation": "storage"}},
            "_links": {"webui": "/spaces/OPS/pages/123"}
        }))
        .unwrap();
        assert_eq!(content.kind.as_deref(), Some("page"));
        assert_eq!(content.version.unwrap().number, 4);
        assert_eq!(content.body.unwrap().storage.unwrap().value, "<p>hi</p>");
        assert_eq!(content.links.unwrap().webui.as_deref(), Some("/spaces/OPS/pages/123"));
    }

    #[test]
    fn test_label_prefix_defaults_to_global() {
        let label: Label = serde_json::from_value(json!({"name": "runbook"})).unwrap();
        assert_eq!(label.prefix, "global");
    }

    #[test]
    fn test_page_list_defaults() {
        let page: RawPage<Label> = serde_json::from_value(json!({})).unwrap();
        assert!(page.results.is_empty());
        assert!(page.size.is_none());
    }
}
