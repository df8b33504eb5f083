//! Confluence API client implementation.

use async_trait::async_trait;
use atlas_core::{Context, Error, Flavor, HttpClient, Request, Result, ServiceProvider};
use atlas_richtext::to_storage;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::{
    Comment, ConfluenceUser, CreatePageInput, Label, Page, RawContent, RawPage, SearchResult,
    UpdatePageInput,
};

const API_PREFIX: &str = "/rest/api";

const DEFAULT_LIMIT: u32 = 25;
const MAX_LIMIT: u32 = 100;

/// Expansions requested whenever a page is read.
const PAGE_EXPAND: &str = "space,version";
const PAGE_EXPAND_WITH_BODY: &str = "space,version,body.storage";

/// Tokens that mark a query as CQL rather than free text.
const CQL_MARKERS: &[&str] = &["=", "~", ">", "<", " and ", " or ", " not ", " in (", "currentuser()"];

/// Confluence API client.
pub struct ConfluenceClient {
    http: HttpClient,
    flavor: Flavor,
    spaces_filter: Vec<String>,
}

impl ConfluenceClient {
    /// Create a client. The flavor is detected from the base URL.
    pub fn new(http: HttpClient) -> Self {
        let flavor = Flavor::detect(http.base_url());
        Self::with_flavor(http, flavor)
    }

    /// Create a client with an explicit flavor (for testing with httpmock).
    pub fn with_flavor(http: HttpClient, flavor: Flavor) -> Self {
        Self {
            http,
            flavor,
            spaces_filter: Vec::new(),
        }
    }

    /// Restrict searches to these space keys.
    pub fn with_spaces_filter(mut self, spaces: Vec<String>) -> Self {
        self.spaces_filter = spaces;
        self
    }

    fn api(path: &str) -> String {
        format!("{}{}", API_PREFIX, path)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Search content. `query` is CQL or free text.
    pub async fn search(
        &self,
        ctx: &Context,
        query: &str,
        limit: Option<u32>,
        start: Option<u32>,
    ) -> Result<SearchResult> {
        let query = required("query", query)?;
        let cql = self.build_cql(query);
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        debug!(cql = %cql, limit, "Confluence search");

        let request = Request::get(Self::api("/content/search"))
            .query("cql", &cql)
            .query("limit", limit)
            .query_opt("start", start)
            .query("expand", PAGE_EXPAND);
        let page: RawPage<RawContent> = self.http.execute(ctx, request).await?.json()?;

        Ok(SearchResult {
            cql,
            results: page.results.into_iter().map(|c| self.map_page(c)).collect(),
            start: page.start,
            total: page.total_size.or(page.size),
        })
    }

    /// Turn free text into CQL, then scope it to the spaces filter.
    fn build_cql(&self, query: &str) -> String {
        let cql = if looks_like_cql(query) {
            query.to_string()
        } else {
            let escaped = query.replace('\\', "\\\\").replace('"', "\\\"");
            match self.flavor {
                Flavor::Cloud => format!("siteSearch ~ \"{}\"", escaped),
                Flavor::SelfHosted => format!("text ~ \"{}\"", escaped),
            }
        };

        if self.spaces_filter.is_empty() || mentions_space(&cql) {
            return cql;
        }
        let keys: Vec<String> = self
            .spaces_filter
            .iter()
            .map(|key| format!("\"{}\"", key))
            .collect();
        format!("({}) AND space in ({})", cql, keys.join(", "))
    }

    // =========================================================================
    // Pages
    // =========================================================================

    pub async fn get_page(&self, ctx: &Context, page_id: &str, include_body: bool) -> Result<Page> {
        let page_id = required("page_id", page_id)?;
        let expand = if include_body { PAGE_EXPAND_WITH_BODY } else { PAGE_EXPAND };
        let request =
            Request::get(Self::api(&format!("/content/{}", page_id))).query("expand", expand);
        let raw: RawContent = self.http.execute(ctx, request).await?.json()?;
        Ok(self.map_page(raw))
    }

    pub async fn get_page_children(
        &self,
        ctx: &Context,
        page_id: &str,
        limit: Option<u32>,
        start: Option<u32>,
    ) -> Result<Vec<Page>> {
        let page_id = required("page_id", page_id)?;
        let request = Request::get(Self::api(&format!("/content/{}/child/page", page_id)))
            .query("expand", PAGE_EXPAND)
            .query("limit", limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
            .query_opt("start", start);
        let page: RawPage<RawContent> = self.http.execute(ctx, request).await?.json()?;
        Ok(page.results.into_iter().map(|c| self.map_page(c)).collect())
    }

    /// Create a page. The body is markup.
    pub async fn create_page(&self, ctx: &Context, input: CreatePageInput) -> Result<Page> {
        let space_key = required("space_key", &input.space_key)?;
        let title = required("title", &input.title)?;

        let mut payload = json!({
            "type": "page",
            "title": title,
            "space": { "key": space_key },
            "body": storage_body(&input.body),
        });
        if let Some(parent) = input.parent_id.as_deref().filter(|p| !p.trim().is_empty()) {
            payload["ancestors"] = json!([{ "id": parent }]);
        }

        debug!(space = space_key, title, "Confluence create page");
        let value = self.http.post_json(ctx, &Self::api("/content"), &payload).await?;
        let raw: RawContent = serde_json::from_value(value)?;
        Ok(self.map_page(raw))
    }

    /// Update a page, bumping its version number by one.
    pub async fn update_page(&self, ctx: &Context, page_id: &str, input: UpdatePageInput) -> Result<Page> {
        let page_id = required("page_id", page_id)?;
        if input.title.is_none() && input.body.is_none() {
            return Err(Error::InvalidInput("title or body is required".into()));
        }

        let request = Request::get(Self::api(&format!("/content/{}", page_id)))
            .query("expand", PAGE_EXPAND_WITH_BODY);
        let current: RawContent = self.http.execute(ctx, request).await?.json()?;
        let current_version = current
            .version
            .as_ref()
            .map(|v| v.number)
            .ok_or_else(|| Error::Decode(format!("page {} has no version", page_id)))?;

        let title = input
            .title
            .or(current.title)
            .unwrap_or_default();
        let body = match input.body {
            Some(markup) => storage_body(&markup),
            None => {
                let stored = current
                    .body
                    .and_then(|b| b.storage)
                    .map(|s| s.value)
                    .unwrap_or_default();
                json!({ "storage": { "value": stored, "representation": "storage" } })
            }
        };

        let mut version = json!({ "number": current_version + 1, "minorEdit": input.minor_edit });
        if let Some(message) = input.version_comment.filter(|m| !m.trim().is_empty()) {
            version["message"] = json!(message);
        }

        let payload = json!({
            "id": page_id,
            "type": "page",
            "title": title,
            "body": body,
            "version": version,
        });
        debug!(page_id, version = current_version + 1, "Confluence update page");
        let value = self
            .http
            .put_json(ctx, &Self::api(&format!("/content/{}", page_id)), &payload)
            .await?;
        let raw: RawContent = serde_json::from_value(value)?;
        Ok(self.map_page(raw))
    }

    pub async fn delete_page(&self, ctx: &Context, page_id: &str) -> Result<()> {
        let page_id = required("page_id", page_id)?;
        debug!(page_id, "Confluence delete page");
        self.http
            .delete(ctx, &Self::api(&format!("/content/{}", page_id)))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Comments and labels
    // =========================================================================

    pub async fn get_comments(&self, ctx: &Context, page_id: &str) -> Result<Vec<Comment>> {
        let page_id = required("page_id", page_id)?;
        let request = Request::get(Self::api(&format!("/content/{}/child/comment", page_id)))
            .query("expand", "body.storage,history")
            .query("depth", "all");
        let page: RawPage<RawContent> = self.http.execute(ctx, request).await?.json()?;
        Ok(page.results.into_iter().map(map_comment).collect())
    }

    /// Add a footer comment. The body is markup.
    pub async fn add_comment(&self, ctx: &Context, page_id: &str, body: &str) -> Result<Comment> {
        let page_id = required("page_id", page_id)?;
        let body = required("body", body)?;
        let payload = json!({
            "type": "comment",
            "container": { "id": page_id, "type": "page" },
            "body": storage_body(body),
        });
        let value = self.http.post_json(ctx, &Self::api("/content"), &payload).await?;
        let raw: RawContent = serde_json::from_value(value)?;
        Ok(map_comment(raw))
    }

    pub async fn get_labels(&self, ctx: &Context, page_id: &str) -> Result<Vec<Label>> {
        let page_id = required("page_id", page_id)?;
        let request = Request::get(Self::api(&format!("/content/{}/label", page_id)));
        let page: RawPage<Label> = self.http.execute(ctx, request).await?.json()?;
        Ok(page.results)
    }

    /// Add a global label; returns the page's labels afterwards.
    pub async fn add_label(&self, ctx: &Context, page_id: &str, name: &str) -> Result<Vec<Label>> {
        let page_id = required("page_id", page_id)?;
        let name = required("name", name)?;
        let payload = json!([{ "prefix": "global", "name": name }]);
        let value = self
            .http
            .post_json(ctx, &Self::api(&format!("/content/{}/label", page_id)), &payload)
            .await?;
        let page: RawPage<Label> = serde_json::from_value(value)?;
        Ok(page.results)
    }

    pub async fn get_current_user(&self, ctx: &Context) -> Result<ConfluenceUser> {
        self.http
            .execute(ctx, Request::get(Self::api("/user/current")))
            .await?
            .json()
    }

    fn map_page(&self, raw: RawContent) -> Page {
        let url = raw
            .links
            .and_then(|l| l.webui)
            .map(|webui| format!("{}{}", self.http.base_url(), webui));
        Page {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            space_key: raw.space.map(|s| s.key),
            updated: raw.version.as_ref().and_then(|v| v.when.clone()),
            version: raw.version.map(|v| v.number),
            body: raw.body.and_then(|b| b.storage).map(|s| s.value),
            url,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", name)));
    }
    Ok(value)
}

fn storage_body(markup: &str) -> Value {
    json!({ "storage": { "value": to_storage(markup), "representation": "storage" } })
}

fn map_comment(raw: RawContent) -> Comment {
    let (author, created) = match raw.history {
        Some(history) => (
            history.created_by.as_ref().and_then(ConfluenceUser::label),
            history.created_date,
        ),
        None => (None, None),
    };
    Comment {
        id: raw.id,
        author,
        body: raw
            .body
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .unwrap_or_default(),
        created,
    }
}

fn looks_like_cql(query: &str) -> bool {
    let lower = query.to_ascii_lowercase();
    CQL_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn mentions_space(cql: &str) -> bool {
    cql.split(|c: char| !c.is_ascii_alphanumeric() && c != '.')
        .any(|word| word.eq_ignore_ascii_case("space") || word.eq_ignore_ascii_case("space.key"))
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl ServiceProvider for ConfluenceClient {
    fn name(&self) -> &'static str {
        "confluence"
    }

    fn flavor(&self) -> Flavor {
        self.flavor
    }

    async fn health_check(&self, ctx: &Context) -> Result<Value> {
        let user = self.get_current_user(ctx).await?;
        Ok(serde_json::to_value(user)?)
    }
}
