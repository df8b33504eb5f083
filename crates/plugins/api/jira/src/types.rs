//! Jira API types.
//!
//! Raw shapes as returned by the REST API (`Raw*`) plus the simplified
//! records handed to tool callers. Cloud and Server share one set of raw
//! types: fields that differ between the two (user identity, rich text) are
//! optional or kept as `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Users and named references
// =============================================================================

/// Jira user. Cloud identifies users by `accountId`, Server by `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl JiraUser {
    /// Best human-readable label for the user.
    pub fn label(&self) -> Option<String> {
        self.display_name
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.account_id.clone())
    }
}

/// Anything referenced by name: status, priority, issue type, resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// Raw issue
// =============================================================================

/// Issue as returned by `/issue/{key}` and the search endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssue {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: RawIssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    /// Plain markup (v2) or a document tree (v3)
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    pub priority: Option<NamedRef>,
    #[serde(default)]
    pub issuetype: Option<NamedRef>,
    #[serde(default)]
    pub resolution: Option<NamedRef>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub reporter: Option<JiraUser>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub comment: Option<RawCommentPage>,
}

/// Comment as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: String,
    /// Plain markup (v2) or a document tree (v3)
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub author: Option<JiraUser>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// Embedded `fields.comment` page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCommentPage {
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

// =============================================================================
// Simplified records
// =============================================================================

/// Issue with rich text rendered to markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    /// Browse link, e.g. `https://example.atlassian.net/browse/PROJ-1`
    pub url: String,
}

/// Comment with its body rendered to markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// One page of issues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub issues: Vec<Issue>,
    /// Server only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Server only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<u64>,
    /// Cloud only: pass back to fetch the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Search page from either flavor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchPage {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub start_at: Option<u64>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub is_last: Option<bool>,
}

// =============================================================================
// Projects and transitions
// =============================================================================

/// Jira project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

/// Page from Cloud's `GET /project/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProjectPage {
    #[serde(default)]
    pub values: Vec<Project>,
    #[serde(default)]
    pub is_last: Option<bool>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Workflow transition available for an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    /// Target status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NamedRef>,
}

/// Response from `GET /issue/{key}/transitions`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransitions {
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

/// Response from `POST /issue`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

// =============================================================================
// Inputs
// =============================================================================

/// Search parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub jql: String,
    /// Fields to return; defaults to [`DEFAULT_FIELDS`]
    pub fields: Option<Vec<String>>,
    pub limit: Option<u32>,
    /// Server only
    pub start_at: Option<u32>,
    /// Cloud only
    pub next_page_token: Option<String>,
}

/// Fields requested when the caller does not name any.
pub const DEFAULT_FIELDS: &[&str] = &[
    "summary",
    "status",
    "issuetype",
    "priority",
    "resolution",
    "assignee",
    "reporter",
    "labels",
    "created",
    "updated",
    "description",
];

/// Input for creating an issue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreateIssueInput {
    pub project_key: String,
    pub summary: String,
    pub issue_type: String,
    /// Markup; sent as a document on Cloud
    pub description: Option<String>,
    /// Cloud account id or Server user name
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub priority: Option<String>,
    /// Raw `fields` entries merged over the generated ones
    pub additional_fields: Map<String, Value>,
}

/// Input for updating an issue. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateIssueInput {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub priority: Option<String>,
    pub additional_fields: Map<String, Value>,
}

impl UpdateIssueInput {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.description.is_none()
            && self.assignee.is_none()
            && self.labels.is_none()
            && self.priority.is_none()
            && self.additional_fields.is_empty()
    }
}

/// Filters for listing agile boards.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoardQuery {
    pub name: Option<String>,
    pub project_key: Option<String>,
    /// `scrum` or `kanban`
    pub board_type: Option<String>,
    pub start_at: Option<u32>,
    pub limit: Option<u32>,
}
