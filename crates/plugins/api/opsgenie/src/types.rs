//! Opsgenie API types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an alert is identified in a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    #[default]
    Id,
    Alias,
    Tiny,
}

impl IdentifierType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierType::Id => "id",
            IdentifierType::Alias => "alias",
            IdentifierType::Tiny => "tiny",
        }
    }
}

/// Every Opsgenie response wraps its payload in `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

// =============================================================================
// Alerts
// =============================================================================

/// Alert as returned by the list and get endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiny_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub is_seen: bool,
    #[serde(default)]
    pub snoozed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Only on the single-alert endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Only on the single-alert endpoint
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

/// Accepted asynchronous request; poll its status with `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncRequest {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub took: f64,
    pub request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertCount {
    pub count: u64,
}

// =============================================================================
// Inputs
// =============================================================================

/// Filters for listing alerts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertQuery {
    /// Opsgenie search query, e.g. `status:open AND priority:P1`
    pub query: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Field to sort on, e.g. `createdAt`
    pub sort: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
}

/// Input for creating an alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAlertInput {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Responder objects such as `{"type": "team", "name": "ops"}`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub responders: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// `P1` (critical) to `P5` (informational)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Optional attribution for acknowledge, close and note actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alert_from_list_item() {
        let alert: Alert = serde_json::from_value(json!({
            "id": "70413a06",
            "tinyId": "1791",
            "alias": "event_573",
            "message": "Our servers are in danger",
            "status": "open",
            "acknowledged": false,
            "isSeen": true,
            "tags": ["OverwriteQuietHours"],
            "count": 79,
            "priority": "P5",
            "createdAt": "2017-04-20T08:22:00.123Z"
        }))
        .unwrap();
        assert_eq!(alert.tiny_id.as_deref(), Some("1791"));
        assert!(alert.is_seen);
        assert!(alert.details.is_empty());
    }

    #[test]
    fn test_create_input_skips_unset() {
        let input = CreateAlertInput {
            message: "disk full".into(),
            priority: Some("P2".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"message": "disk full", "priority": "P2"})
        );
    }

    #[test]
    fn test_identifier_type_serde() {
        let kind: IdentifierType = serde_json::from_value(json!("tiny")).unwrap();
        assert_eq!(kind, IdentifierType::Tiny);
        assert_eq!(IdentifierType::default().as_str(), "id");
    }
}
