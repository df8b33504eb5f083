//! Confluence tools.

use std::sync::Arc;

use atlas_confluence::{
    Comment, ConfluenceClient, CreatePageInput, Label, Page, SearchResult, UpdatePageInput,
};
use atlas_core::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{with_client, InputSchema, Property, Tag, Tool};

const PAGE_ID: &str = "Page id";
const LIMIT: &str = "Maximum number of results (1-100)";

/// Every Confluence tool, bound to `client`.
pub fn tools(client: Arc<ConfluenceClient>) -> Vec<Tool> {
    let c = || Arc::clone(&client);
    vec![
        Tool::new(
            "confluence_search",
            "Search content with CQL or plain text. Plain text becomes a site search",
        )
        .tag(Tag::Confluence)
        .read()
        .schema(
            InputSchema::new()
                .required("query", Property::string("CQL, e.g. type=page AND space=DEV, or free text"))
                .optional("limit", Property::integer(LIMIT).default(10))
                .optional("start", Property::integer("Index of the first result").default(0)),
        )
        .handler_arc(with_client(c(), search)),
        Tool::new("confluence_get_page", "Get a page, optionally with its storage body")
            .tag(Tag::Confluence)
            .read()
            .schema(
                InputSchema::new()
                    .required("page_id", Property::string(PAGE_ID))
                    .optional("include_body", Property::boolean("Include the page body").default(true)),
            )
            .handler_arc(with_client(c(), get_page)),
        Tool::new("confluence_get_page_children", "List the child pages of a page")
            .tag(Tag::Confluence)
            .read()
            .schema(
                InputSchema::new()
                    .required("parent_id", Property::string("Parent page id"))
                    .optional("limit", Property::integer(LIMIT).default(25))
                    .optional("start", Property::integer("Index of the first child").default(0)),
            )
            .handler_arc(with_client(c(), get_page_children)),
        Tool::new("confluence_get_comments", "List the comments of a page")
            .tag(Tag::Confluence)
            .read()
            .schema(InputSchema::new().required("page_id", Property::string(PAGE_ID)))
            .handler_arc(with_client(c(), get_comments)),
        Tool::new("confluence_get_labels", "List the labels of a page")
            .tag(Tag::Confluence)
            .read()
            .schema(InputSchema::new().required("page_id", Property::string(PAGE_ID)))
            .handler_arc(with_client(c(), get_labels)),
        Tool::new("confluence_create_page", "Create a page")
            .tag(Tag::Confluence)
            .write()
            .schema(
                InputSchema::new()
                    .required("space_key", Property::string("Space key, e.g. DEV"))
                    .required("title", Property::string("Page title"))
                    .required("content", Property::string("Page body"))
                    .optional("parent_id", Property::string("Parent page id")),
            )
            .handler_arc(with_client(c(), create_page)),
        Tool::new("confluence_update_page", "Update the title or body of a page")
            .tag(Tag::Confluence)
            .write()
            .schema(
                InputSchema::new()
                    .required("page_id", Property::string(PAGE_ID))
                    .optional("title", Property::string("New title; keeps the current one when unset"))
                    .optional("content", Property::string("New body; keeps the current one when unset"))
                    .optional("is_minor_edit", Property::boolean("Mark as a minor edit").default(false))
                    .optional("version_comment", Property::string("Comment for the new version")),
            )
            .handler_arc(with_client(c(), update_page)),
        Tool::new("confluence_delete_page", "Delete a page")
            .tag(Tag::Confluence)
            .write()
            .schema(InputSchema::new().required("page_id", Property::string(PAGE_ID)))
            .handler_arc(with_client(c(), delete_page)),
        Tool::new("confluence_add_label", "Add a label to a page")
            .tag(Tag::Confluence)
            .write()
            .schema(
                InputSchema::new()
                    .required("page_id", Property::string(PAGE_ID))
                    .required("name", Property::string("Label name")),
            )
            .handler_arc(with_client(c(), add_label)),
        Tool::new("confluence_add_comment", "Add a comment to a page")
            .tag(Tag::Confluence)
            .write()
            .schema(
                InputSchema::new()
                    .required("page_id", Property::string(PAGE_ID))
                    .required("content", Property::string("Comment body")),
            )
            .handler_arc(with_client(c(), add_comment)),
    ]
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    start: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PageArgs {
    page_id: String,
    #[serde(default = "yes")]
    include_body: bool,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ChildrenArgs {
    parent_id: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    start: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    space_key: String,
    title: String,
    content: String,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    page_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    is_minor_edit: bool,
    #[serde(default)]
    version_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelArgs {
    page_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    page_id: String,
    content: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn search(c: Arc<ConfluenceClient>, ctx: Context, a: SearchArgs) -> Result<SearchResult> {
    c.search(&ctx, &a.query, a.limit, a.start).await
}

async fn get_page(c: Arc<ConfluenceClient>, ctx: Context, a: PageArgs) -> Result<Page> {
    c.get_page(&ctx, &a.page_id, a.include_body).await
}

async fn get_page_children(c: Arc<ConfluenceClient>, ctx: Context, a: ChildrenArgs) -> Result<Vec<Page>> {
    c.get_page_children(&ctx, &a.parent_id, a.limit, a.start).await
}

async fn get_comments(c: Arc<ConfluenceClient>, ctx: Context, a: PageArgs) -> Result<Vec<Comment>> {
    c.get_comments(&ctx, &a.page_id).await
}

async fn get_labels(c: Arc<ConfluenceClient>, ctx: Context, a: PageArgs) -> Result<Vec<Label>> {
    c.get_labels(&ctx, &a.page_id).await
}

async fn create_page(c: Arc<ConfluenceClient>, ctx: Context, a: CreateArgs) -> Result<Page> {
    let input = CreatePageInput {
        space_key: a.space_key,
        title: a.title,
        body: a.content,
        parent_id: a.parent_id,
    };
    c.create_page(&ctx, input).await
}

async fn update_page(c: Arc<ConfluenceClient>, ctx: Context, a: UpdateArgs) -> Result<Page> {
    let input = UpdatePageInput {
        title: a.title,
        body: a.content,
        version_comment: a.version_comment,
        minor_edit: a.is_minor_edit,
    };
    c.update_page(&ctx, &a.page_id, input).await
}

async fn delete_page(c: Arc<ConfluenceClient>, ctx: Context, a: PageArgs) -> Result<Value> {
    c.delete_page(&ctx, &a.page_id).await?;
    Ok(json!({ "deleted": a.page_id }))
}

async fn add_label(c: Arc<ConfluenceClient>, ctx: Context, a: LabelArgs) -> Result<Vec<Label>> {
    c.add_label(&ctx, &a.page_id, &a.name).await
}

async fn add_comment(c: Arc<ConfluenceClient>, ctx: Context, a: CommentArgs) -> Result<Comment> {
    c.add_comment(&ctx, &a.page_id, &a.content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::http::RetryPolicy;
    use atlas_core::{Credential, Flavor, HttpClient, HttpConfig};
    use httpmock::prelude::*;
    use serde_json::Map;

    fn client(base_url: String) -> Arc<ConfluenceClient> {
        let config = HttpConfig::new(base_url).with_retry(RetryPolicy::no_retry());
        let auth = Credential::bearer("pat").unwrap();
        let http = HttpClient::new(config, Arc::new(auth)).unwrap();
        Arc::new(ConfluenceClient::with_flavor(http, Flavor::SelfHosted))
    }

    fn find<'a>(tools: &'a [Tool], name: &str) -> &'a Tool {
        tools.iter().find(|t| t.name() == name).unwrap()
    }

    #[test]
    fn test_tool_names_and_tags() {
        let tools = tools(client("http://127.0.0.1:9".into()));
        assert_eq!(tools.len(), 10);
        for tool in &tools {
            assert!(tool.name().starts_with("confluence_"));
            assert!(tool.has_tag(Tag::Confluence));
            assert!(tool.has_tag(Tag::Read) ^ tool.has_tag(Tag::Write));
        }
        assert!(!find(&tools, "confluence_search").is_write());
        assert!(find(&tools, "confluence_add_label").is_write());
    }

    #[test]
    fn test_page_args_include_body_by_default() {
        let args: PageArgs = serde_json::from_value(json!({"page_id": "1"})).unwrap();
        assert!(args.include_body);
    }

    #[tokio::test]
    async fn test_get_labels_through_handler() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/content/42/label")
                .header("Authorization", "Bearer pat");
            then.status(200).json_body(json!({
                "results": [{"id": "1", "name": "runbook", "prefix": "global"}]
            }));
        });

        let tools = tools(client(server.base_url()));
        let handler = find(&tools, "confluence_get_labels").handler_ref().unwrap();
        let args = json!({"page_id": "42"}).as_object().cloned().unwrap();
        let result = handler.call(&Context::new(), args).await.unwrap();

        let parsed: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(parsed[0]["name"], "runbook");
    }

    #[tokio::test]
    async fn test_upstream_error_propagates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/content/404");
            then.status(404).body("{\"message\":\"No content\"}");
        });

        let tools = tools(client(server.base_url()));
        let handler = find(&tools, "confluence_get_page").handler_ref().unwrap();
        let args = json!({"page_id": "404"}).as_object().cloned().unwrap();
        let err = handler.call(&Context::new(), args).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_update_requires_title_or_content() {
        let tools = tools(client("http://127.0.0.1:9".into()));
        let handler = find(&tools, "confluence_update_page").handler_ref().unwrap();
        let mut args = Map::new();
        args.insert("page_id".into(), json!("1"));
        let err = handler.call(&Context::new(), args).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
    }
}
