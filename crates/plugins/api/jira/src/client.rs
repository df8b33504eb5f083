//! Jira API client implementation.
//!
//! Cloud uses `/rest/api/3`, document-tree rich text and `accountId` users;
//! Server / Data Center uses `/rest/api/2`, plain markup and user names. The
//! agile API lives under `/rest/agile/1.0` for both.

use async_trait::async_trait;
use atlas_core::{Context, Error, Flavor, HttpClient, Request, Result, ServiceProvider};
use atlas_richtext::{to_doc, value_to_markup};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::types::{
    BoardQuery, Comment, CreateIssueInput, CreatedIssue, Issue, JiraUser, Project, RawComment,
    RawIssue, RawProjectPage, RawSearchPage, RawTransitions, SearchQuery, SearchResult,
    Transition, UpdateIssueInput, DEFAULT_FIELDS,
};

const AGILE_PREFIX: &str = "/rest/agile/1.0";

/// Page size used when the caller gives none.
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 100;

/// Upper bound on project pages fetched by one `get_all_projects` call.
const MAX_PROJECT_PAGES: usize = 100;

/// Jira API client.
pub struct JiraClient {
    http: HttpClient,
    flavor: Flavor,
    projects_filter: Vec<String>,
}

impl JiraClient {
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
            projects_filter: Vec::new(),
        }
    }

    /// Restrict searches and project listings to these project keys.
    pub fn with_projects_filter(mut self, projects: Vec<String>) -> Self {
        self.projects_filter = projects;
        self
    }

    fn api(&self, path: &str) -> String {
        let prefix = match self.flavor {
            Flavor::Cloud => "/rest/api/3",
            Flavor::SelfHosted => "/rest/api/2",
        };
        format!("{}{}", prefix, path)
    }

    fn agile(path: &str) -> String {
        format!("{}{}", AGILE_PREFIX, path)
    }

    // =========================================================================
    // Issues
    // =========================================================================

    /// Fetch one issue, including its comments.
    pub async fn get_issue(&self, ctx: &Context, key: &str, fields: Option<&str>) -> Result<Issue> {
        let key = required("issue_key", key)?;
        debug!(key, "Jira get issue");
        let request = Request::get(self.api(&format!("/issue/{}", key)))
            .query_opt("fields", fields);
        let raw: RawIssue = self.http.execute(ctx, request).await?.json()?;
        Ok(self.map_issue(raw))
    }

    /// Run a JQL search.
    pub async fn search(&self, ctx: &Context, query: &SearchQuery) -> Result<SearchResult> {
        let jql = self.scoped_jql(&query.jql);
        let fields = query
            .fields
            .clone()
            .unwrap_or_else(|| DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect());
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let page: RawSearchPage = match self.flavor {
            Flavor::Cloud => {
                let mut body = json!({
                    "jql": jql,
                    "maxResults": limit,
                    "fields": fields,
                });
                if let Some(token) = &query.next_page_token {
                    body["nextPageToken"] = json!(token);
                }
                debug!(jql = %jql, limit, "Jira Cloud search");
                let value = self.http.post_json(ctx, &self.api("/search/jql"), &body).await?;
                serde_json::from_value(value)?
            }
            Flavor::SelfHosted => {
                let start_at = query.start_at.unwrap_or(0);
                debug!(jql = %jql, start_at, limit, "Jira Self-Hosted search");
                let request = Request::get(self.api("/search"))
                    .query("jql", &jql)
                    .query("startAt", start_at)
                    .query("maxResults", limit)
                    .query("fields", fields.join(","));
                self.http.execute(ctx, request).await?.json()?
            }
        };
        Ok(self.map_page(page))
    }

    /// Issues of one project, newest first.
    pub async fn get_project_issues(
        &self,
        ctx: &Context,
        project_key: &str,
        limit: Option<u32>,
        start_at: Option<u32>,
        next_page_token: Option<String>,
    ) -> Result<SearchResult> {
        let project_key = required("project_key", project_key)?;
        let query = SearchQuery {
            jql: format!("project = \"{}\" ORDER BY created DESC", project_key),
            fields: None,
            limit,
            start_at,
            next_page_token,
        };
        self.search(ctx, &query).await
    }

    /// Create an issue and return it as stored.
    pub async fn create_issue(&self, ctx: &Context, input: CreateIssueInput) -> Result<Issue> {
        let project_key = required("project_key", &input.project_key)?;
        let summary = required("summary", &input.summary)?;
        let issue_type = required("issue_type", &input.issue_type)?;

        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": project_key }));
        fields.insert("summary".into(), json!(summary));
        fields.insert("issuetype".into(), json!({ "name": issue_type }));
        if let Some(description) = &input.description {
            fields.insert("description".into(), self.encode_text(description)?);
        }
        if let Some(assignee) = &input.assignee {
            fields.insert("assignee".into(), self.user_ref(assignee));
        }
        if let Some(labels) = &input.labels {
            fields.insert("labels".into(), json!(labels));
        }
        if let Some(priority) = &input.priority {
            fields.insert("priority".into(), json!({ "name": priority }));
        }
        fields.extend(input.additional_fields);

        debug!(project = project_key, "Jira create issue");
        let value = self
            .http
            .post_json(ctx, &self.api("/issue"), &json!({ "fields": fields }))
            .await?;
        let created: CreatedIssue = serde_json::from_value(value)?;
        debug!(key = %created.key, id = %created.id, "Jira issue created");
        self.get_issue(ctx, &created.key, None).await
    }

    /// Update the given fields of an issue and return it as stored.
    pub async fn update_issue(&self, ctx: &Context, key: &str, input: UpdateIssueInput) -> Result<Issue> {
        let key = required("issue_key", key)?;
        if input.is_empty() {
            return Err(Error::InvalidInput("no fields to update".into()));
        }

        let mut fields = Map::new();
        if let Some(summary) = &input.summary {
            fields.insert("summary".into(), json!(summary));
        }
        if let Some(description) = &input.description {
            fields.insert("description".into(), self.encode_text(description)?);
        }
        if let Some(assignee) = &input.assignee {
            fields.insert("assignee".into(), self.user_ref(assignee));
        }
        if let Some(labels) = &input.labels {
            fields.insert("labels".into(), json!(labels));
        }
        if let Some(priority) = &input.priority {
            fields.insert("priority".into(), json!({ "name": priority }));
        }
        fields.extend(input.additional_fields);

        debug!(key, "Jira update issue");
        self.http
            .put_json(ctx, &self.api(&format!("/issue/{}", key)), &json!({ "fields": fields }))
            .await?;
        self.get_issue(ctx, key, None).await
    }

    pub async fn delete_issue(&self, ctx: &Context, key: &str, delete_subtasks: bool) -> Result<()> {
        let key = required("issue_key", key)?;
        debug!(key, delete_subtasks, "Jira delete issue");
        let request = Request::delete(self.api(&format!("/issue/{}", key)))
            .query("deleteSubtasks", delete_subtasks);
        self.http.execute(ctx, request).await?;
        Ok(())
    }

    /// Add a comment. The body is markup.
    pub async fn add_comment(&self, ctx: &Context, key: &str, body: &str) -> Result<Comment> {
        let key = required("issue_key", key)?;
        let body = required("body", body)?;
        let payload = json!({ "body": self.encode_text(body)? });
        let value = self
            .http
            .post_json(ctx, &self.api(&format!("/issue/{}/comment", key)), &payload)
            .await?;
        let raw: RawComment = serde_json::from_value(value)?;
        Ok(map_comment(raw))
    }

    // =========================================================================
    // Workflow
    // =========================================================================

    pub async fn get_transitions(&self, ctx: &Context, key: &str) -> Result<Vec<Transition>> {
        let key = required("issue_key", key)?;
        let request = Request::get(self.api(&format!("/issue/{}/transitions", key)));
        let raw: RawTransitions = self.http.execute(ctx, request).await?.json()?;
        Ok(raw.transitions)
    }

    /// Move an issue through its workflow.
    ///
    /// `transition` is a transition id, a transition name, or the name of the
    /// target status (both matched case-insensitively).
    pub async fn transition_issue(
        &self,
        ctx: &Context,
        key: &str,
        transition: &str,
        comment: Option<&str>,
    ) -> Result<()> {
        let key = required("issue_key", key)?;
        let transition = required("transition", transition)?;

        let id = if transition.chars().all(|c| c.is_ascii_digit()) {
            transition.to_string()
        } else {
            let available = self.get_transitions(ctx, key).await?;
            find_transition(&available, transition)
                .map(|t| t.id.clone())
                .ok_or_else(|| {
                    let names: Vec<&str> = available.iter().map(|t| t.name.as_str()).collect();
                    Error::InvalidInput(format!(
                        "no transition '{}' for {}; available: {}",
                        transition,
                        key,
                        names.join(", ")
                    ))
                })?
        };

        let mut payload = json!({ "transition": { "id": id } });
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            payload["update"] = json!({
                "comment": [{ "add": { "body": self.encode_text(comment)? } }]
            });
        }

        debug!(key, transition_id = %id, "Jira transition issue");
        self.http
            .post_json(ctx, &self.api(&format!("/issue/{}/transitions", key)), &payload)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// All visible projects, narrowed to the projects filter when one is set.
    pub async fn get_all_projects(&self, ctx: &Context, include_archived: bool) -> Result<Vec<Project>> {
        let mut projects = match self.flavor {
            Flavor::Cloud => {
                let mut projects = Vec::new();
                for _ in 0..MAX_PROJECT_PAGES {
                    let request = Request::get(self.api("/project/search"))
                        .query("startAt", projects.len())
                        .query("maxResults", DEFAULT_LIMIT);
                    let page: RawProjectPage = self.http.execute(ctx, request).await?.json()?;
                    let done = page.values.is_empty() || page.is_last.unwrap_or(true);
                    projects.extend(page.values);
                    if done {
                        break;
                    }
                }
                projects
            }
            Flavor::SelfHosted => {
                let request = Request::get(self.api("/project"))
                    .query("includeArchived", include_archived);
                self.http.execute(ctx, request).await?.json::<Vec<Project>>()?
            }
        };

        if !include_archived {
            projects.retain(|p| p.archived != Some(true));
        }
        if !self.projects_filter.is_empty() {
            projects.retain(|p| {
                self.projects_filter
                    .iter()
                    .any(|key| key.eq_ignore_ascii_case(&p.key))
            });
        }
        debug!(count = projects.len(), "Jira projects fetched");
        Ok(projects)
    }

    // =========================================================================
    // Agile
    // =========================================================================

    pub async fn get_agile_boards(&self, ctx: &Context, query: &BoardQuery) -> Result<Value> {
        let request = Request::get(Self::agile("/board"))
            .query_opt("name", query.name.as_deref())
            .query_opt("projectKeyOrId", query.project_key.as_deref())
            .query_opt("type", query.board_type.as_deref())
            .query_opt("startAt", query.start_at)
            .query_opt("maxResults", query.limit);
        self.http.get_json(ctx, request).await
    }

    pub async fn get_board_issues(
        &self,
        ctx: &Context,
        board_id: u64,
        jql: Option<&str>,
        limit: Option<u32>,
        start_at: Option<u32>,
    ) -> Result<SearchResult> {
        let request = Request::get(Self::agile(&format!("/board/{}/issue", board_id)))
            .query_opt("jql", jql.filter(|q| !q.trim().is_empty()))
            .query("startAt", start_at.unwrap_or(0))
            .query("maxResults", limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
            .query("fields", DEFAULT_FIELDS.join(","));
        let page: RawSearchPage = self.http.execute(ctx, request).await?.json()?;
        Ok(self.map_page(page))
    }

    /// Sprints of a board; `state` is `future`, `active` or `closed` (comma-separated).
    pub async fn get_sprints_from_board(
        &self,
        ctx: &Context,
        board_id: u64,
        state: Option<&str>,
        start_at: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Value> {
        let request = Request::get(Self::agile(&format!("/board/{}/sprint", board_id)))
            .query_opt("state", state)
            .query_opt("startAt", start_at)
            .query_opt("maxResults", limit);
        self.http.get_json(ctx, request).await
    }

    pub async fn get_sprint_issues(
        &self,
        ctx: &Context,
        sprint_id: u64,
        limit: Option<u32>,
        start_at: Option<u32>,
    ) -> Result<SearchResult> {
        let request = Request::get(Self::agile(&format!("/sprint/{}/issue", sprint_id)))
            .query("startAt", start_at.unwrap_or(0))
            .query("maxResults", limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
            .query("fields", DEFAULT_FIELDS.join(","));
        let page: RawSearchPage = self.http.execute(ctx, request).await?.json()?;
        Ok(self.map_page(page))
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// The user behind the configured credential.
    pub async fn get_current_user(&self, ctx: &Context) -> Result<JiraUser> {
        self.http
            .execute(ctx, Request::get(self.api("/myself")))
            .await?
            .json()
    }

    /// Look up a user by account id (Cloud) or user name (Server).
    pub async fn get_user_profile(&self, ctx: &Context, identifier: &str) -> Result<JiraUser> {
        let identifier = required("user_identifier", identifier)?;
        let param = match self.flavor {
            Flavor::Cloud => "accountId",
            Flavor::SelfHosted => "username",
        };
        let request = Request::get(self.api("/user")).query(param, identifier);
        self.http.execute(ctx, request).await?.json()
    }

    // =========================================================================
    // Mapping
    // =========================================================================

    /// Rich text as sent to the API: a document on Cloud, markup on Server.
    fn encode_text(&self, markup: &str) -> Result<Value> {
        match self.flavor {
            Flavor::Cloud => Ok(serde_json::to_value(to_doc(markup))?),
            Flavor::SelfHosted => Ok(Value::String(markup.to_string())),
        }
    }

    fn user_ref(&self, user: &str) -> Value {
        match self.flavor {
            Flavor::Cloud => json!({ "accountId": user }),
            Flavor::SelfHosted => json!({ "name": user }),
        }
    }

    /// Prefix the projects filter unless the query already names a project.
    fn scoped_jql(&self, jql: &str) -> String {
        if self.projects_filter.is_empty() || mentions_project(jql) {
            return jql.trim().to_string();
        }
        let keys: Vec<String> = self
            .projects_filter
            .iter()
            .map(|key| format!("\"{}\"", key))
            .collect();
        with_clause(jql, &format!("project in ({})", keys.join(", ")))
    }

    fn map_page(&self, page: RawSearchPage) -> SearchResult {
        // Cloud marks the final page with isLast; the token is stale there.
        let next_page_token = match page.is_last {
            Some(true) => None,
            _ => page.next_page_token,
        };
        SearchResult {
            issues: page.issues.into_iter().map(|i| self.map_issue(i)).collect(),
            total: page.total,
            start_at: page.start_at,
            next_page_token,
        }
    }

    fn map_issue(&self, raw: RawIssue) -> Issue {
        let fields = raw.fields;
        let description = fields
            .description
            .as_ref()
            .map(read_text)
            .filter(|text| !text.is_empty());
        let comments = fields
            .comment
            .map(|page| page.comments.into_iter().map(map_comment).collect())
            .unwrap_or_default();

        Issue {
            url: format!("{}/browse/{}", self.http.base_url(), raw.key),
            id: raw.id,
            key: raw.key,
            summary: fields.summary.unwrap_or_default(),
            status: fields.status.map(|s| s.name),
            issue_type: fields.issuetype.map(|t| t.name),
            priority: fields.priority.map(|p| p.name),
            resolution: fields.resolution.map(|r| r.name),
            assignee: fields.assignee.as_ref().and_then(JiraUser::label),
            reporter: fields.reporter.as_ref().and_then(JiraUser::label),
            labels: fields.labels,
            created: fields.created,
            updated: fields.updated,
            description,
            comments,
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

/// Markup for a rich-text field: documents are rendered, strings kept as-is.
fn read_text(value: &Value) -> String {
    value_to_markup(value).trim_end_matches('\n').to_string()
}

fn map_comment(raw: RawComment) -> Comment {
    Comment {
        id: raw.id,
        author: raw.author.as_ref().and_then(JiraUser::label),
        body: raw.body.as_ref().map(read_text).unwrap_or_default(),
        created: raw.created,
        updated: raw.updated,
    }
}

fn find_transition<'a>(transitions: &'a [Transition], wanted: &str) -> Option<&'a Transition> {
    transitions
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(wanted))
        .or_else(|| {
            transitions.iter().find(|t| {
                t.to
                    .as_ref()
                    .is_some_and(|to| to.name.eq_ignore_ascii_case(wanted))
            })
        })
}

fn mentions_project(jql: &str) -> bool {
    jql.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("project"))
}

/// AND `clause` into `jql`, keeping any trailing ORDER BY last.
fn with_clause(jql: &str, clause: &str) -> String {
    let jql = jql.trim();
    // ASCII lowercasing keeps byte offsets valid for slicing `jql`.
    let lower = jql.to_ascii_lowercase();
    let (condition, order) = match lower.find("order by") {
        Some(idx) => (jql[..idx].trim(), jql[idx..].trim()),
        None => (jql, ""),
    };

    let mut out = if condition.is_empty() {
        clause.to_string()
    } else {
        format!("{} AND ({})", clause, condition)
    };
    if !order.is_empty() {
        out.push(' ');
        out.push_str(order);
    }
    out
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl ServiceProvider for JiraClient {
    fn name(&self) -> &'static str {
        "jira"
    }

    fn flavor(&self) -> Flavor {
        self.flavor
    }

    async fn health_check(&self, ctx: &Context) -> Result<Value> {
        let user = self.get_current_user(ctx).await?;
        Ok(serde_json::to_value(user)?)
    }
}
