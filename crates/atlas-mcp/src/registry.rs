//! Tool registry and listing filter.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::protocol::ToolDefinition;
use crate::tools::Tool;

/// Registration failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,

    #[error("tool '{0}' has no handler")]
    MissingHandler(String),

    #[error("tool '{0}' is already registered")]
    Duplicate(String),
}

/// Which tools a session may see and call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFilter {
    allow: HashSet<String>,
    read_only: bool,
}

impl ToolFilter {
    /// An empty allow-list admits every tool.
    pub fn new<I, S>(allow: I, read_only: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: allow
                .into_iter()
                .map(Into::into)
                .map(|name: String| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            read_only,
        }
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the allow-list admits `name`.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allow.is_empty() || self.allow.contains(name)
    }

    /// Whether `tool` shows up in listings.
    pub fn admits(&self, tool: &Tool) -> bool {
        self.is_allowed(tool.name()) && !(self.read_only && tool.is_write())
    }
}

/// Tools keyed by unique name, in registration order.
///
/// Populated once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Tool) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if tool.handler_ref().is_none() {
            return Err(RegistryError::MissingHandler(name));
        }
        if self.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn register_all(&mut self, tools: impl IntoIterator<Item = Tool>) -> Result<(), RegistryError> {
        tools.into_iter().try_for_each(|tool| self.register(tool))
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Public definitions of the tools `filter` admits.
    pub fn list(&self, filter: &ToolFilter) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|tool| filter.admits(tool))
            .map(Tool::definition)
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(Tool::name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolCallResult;
    use crate::tools::{MockToolHandler, Tag};

    fn tool(name: &str, tag: Tag) -> Tool {
        Tool::new(name, format!("{} tool", name))
            .tag(Tag::Jira)
            .tag(tag)
            .handler(MockToolHandler::new())
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_all([
                tool("jira_get_issue", Tag::Read),
                tool("jira_search", Tag::Read),
                tool("jira_create_issue", Tag::Write),
            ])
            .unwrap();
        registry
    }

    fn names(defs: Vec<ToolDefinition>) -> Vec<String> {
        defs.into_iter().map(|d| d.name).collect()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    #[test]
    fn test_register_and_get() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("jira_search").is_some());
        assert!(registry.get("jira_nope").is_none());
    }

    #[test]
    fn test_rejects_empty_name() {
        let mut registry = ToolRegistry::new();
        assert_eq!(registry.register(tool(" ", Tag::Read)), Err(RegistryError::EmptyName));
    }

    #[test]
    fn test_rejects_missing_handler() {
        let mut registry = ToolRegistry::new();
        let err = registry.register(Tool::new("jira_x", "x").read()).unwrap_err();
        assert_eq!(err, RegistryError::MissingHandler("jira_x".into()));
    }

    #[test]
    fn test_rejects_duplicate() {
        let mut registry = registry();
        let err = registry.register(tool("jira_search", Tag::Read)).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("jira_search".into()));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_registered_handler_is_invoked() {
        let mut mock = MockToolHandler::new();
        mock.expect_call()
            .times(1)
            .returning(|_, _| Ok(ToolCallResult::text("ok")));
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new("jira_ping", "ping").read().handler(mock))
            .unwrap();

        let handler = registry.get("jira_ping").unwrap().handler_ref().unwrap();
        let result = handler
            .call(&atlas_core::Context::new(), Default::default())
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some("ok"));
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    #[test]
    fn test_list_all_keeps_order() {
        let defs = registry().list(&ToolFilter::default());
        assert_eq!(names(defs), vec!["jira_get_issue", "jira_search", "jira_create_issue"]);
    }

    #[test]
    fn test_list_read_only_drops_writes() {
        let defs = registry().list(&ToolFilter::new(Vec::<String>::new(), true));
        assert_eq!(names(defs), vec!["jira_get_issue", "jira_search"]);
    }

    #[test]
    fn test_list_allow_list() {
        let defs = registry().list(&ToolFilter::new(["jira_search", " jira_create_issue "], false));
        assert_eq!(names(defs), vec!["jira_search", "jira_create_issue"]);
    }

    #[test]
    fn test_list_allow_list_and_read_only() {
        let defs = registry().list(&ToolFilter::new(["jira_search", "jira_create_issue"], true));
        assert_eq!(names(defs), vec!["jira_search"]);
    }

    #[test]
    fn test_filter_membership_matches_rule() {
        let registry = registry();
        let filters = [
            ToolFilter::default(),
            ToolFilter::new(Vec::<String>::new(), true),
            ToolFilter::new(["jira_get_issue", "jira_create_issue"], false),
            ToolFilter::new(["jira_create_issue"], true),
        ];
        for filter in &filters {
            let listed = names(registry.list(filter));
            for name in registry.names() {
                let tool = registry.get(name).unwrap();
                let expected = filter.is_allowed(name) && !(filter.read_only() && tool.is_write());
                assert_eq!(listed.iter().any(|n| n == name), expected, "{} {:?}", name, filter);
            }
        }
    }
}
