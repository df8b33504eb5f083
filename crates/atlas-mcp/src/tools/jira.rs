//! Jira tools.

use std::sync::Arc;

use atlas_core::{Context, Result};
use atlas_jira::{
    BoardQuery, Comment, CreateIssueInput, Issue, JiraClient, JiraUser, Project, SearchQuery,
    SearchResult, Transition, UpdateIssueInput,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::args::{comma_list, object_arg};
use super::{with_client, InputSchema, Property, Tag, Tool};

const LIMIT: &str = "Maximum number of results (1-100)";
const START_AT: &str = "Index of the first result (self-hosted pagination)";
const PAGE_TOKEN: &str = "Token of the next page (cloud pagination)";
const FIELDS: &str = "Comma-separated fields to return, e.g. summary,status,assignee";
const ADDITIONAL: &str = "JSON object of extra fields, e.g. {\"customfield_10010\": \"x\"}";

/// Every Jira tool, bound to `client`.
pub fn tools(client: Arc<JiraClient>) -> Vec<Tool> {
    let c = || Arc::clone(&client);
    vec![
        // Read
        Tool::new("jira_get_issue", "Get a Jira issue with its description and comments")
            .tag(Tag::Jira)
            .read()
            .schema(
                InputSchema::new()
                    .required("issue_key", Property::string("Issue key, e.g. PROJ-123"))
                    .optional("fields", Property::string(FIELDS)),
            )
            .handler_arc(with_client(c(), get_issue)),
        Tool::new("jira_search", "Search issues with JQL")
            .tag(Tag::Jira)
            .read()
            .schema(
                InputSchema::new()
                    .required("jql", Property::string("JQL query, e.g. project = PROJ AND status = Open"))
                    .optional("fields", Property::string(FIELDS))
                    .optional("limit", Property::integer(LIMIT).default(50))
                    .optional("start_at", Property::integer(START_AT).default(0))
                    .optional("next_page_token", Property::string(PAGE_TOKEN)),
            )
            .handler_arc(with_client(c(), search)),
        Tool::new("jira_get_all_projects", "List the projects visible to the configured user")
            .tag(Tag::Jira)
            .read()
            .schema(InputSchema::new().optional(
                "include_archived",
                Property::boolean("Include archived projects").default(false),
            ))
            .handler_arc(with_client(c(), get_all_projects)),
        Tool::new("jira_get_project_issues", "List the issues of a project, newest first")
            .tag(Tag::Jira)
            .read()
            .schema(
                InputSchema::new()
                    .required("project_key", Property::string("Project key, e.g. PROJ"))
                    .optional("limit", Property::integer(LIMIT).default(50))
                    .optional("start_at", Property::integer(START_AT).default(0))
                    .optional("next_page_token", Property::string(PAGE_TOKEN)),
            )
            .handler_arc(with_client(c(), get_project_issues)),
        Tool::new("jira_get_transitions", "List the workflow transitions available for an issue")
            .tag(Tag::Jira)
            .read()
            .schema(InputSchema::new().required("issue_key", Property::string("Issue key")))
            .handler_arc(with_client(c(), get_transitions)),
        Tool::new("jira_get_agile_boards", "List agile boards")
            .tag(Tag::Jira)
            .read()
            .schema(
                InputSchema::new()
                    .optional("board_name", Property::string("Board name, matched as a substring"))
                    .optional("project_key", Property::string("Project key or id"))
                    .optional("board_type", Property::one_of("Board type", &["scrum", "kanban"]))
                    .optional("start_at", Property::integer("Index of the first board").default(0))
                    .optional("limit", Property::integer(LIMIT).default(50)),
            )
            .handler_arc(with_client(c(), get_agile_boards)),
        Tool::new("jira_get_board_issues", "List the issues of an agile board")
            .tag(Tag::Jira)
            .read()
            .schema(
                InputSchema::new()
                    .required("board_id", Property::integer("Board id"))
                    .optional("jql", Property::string("Extra JQL filter"))
                    .optional("limit", Property::integer(LIMIT).default(50))
                    .optional("start_at", Property::integer(START_AT).default(0)),
            )
            .handler_arc(with_client(c(), get_board_issues)),
        Tool::new("jira_get_sprints_from_board", "List the sprints of an agile board")
            .tag(Tag::Jira)
            .read()
            .schema(
                InputSchema::new()
                    .required("board_id", Property::integer("Board id"))
                    .optional(
                        "state",
                        Property::one_of("Sprint state", &["future", "active", "closed"]),
                    )
                    .optional("start_at", Property::integer("Index of the first sprint").default(0))
                    .optional("limit", Property::integer(LIMIT).default(50)),
            )
            .handler_arc(with_client(c(), get_sprints_from_board)),
        Tool::new("jira_get_sprint_issues", "List the issues of a sprint")
            .tag(Tag::Jira)
            .read()
            .schema(
                InputSchema::new()
                    .required("sprint_id", Property::integer("Sprint id"))
                    .optional("limit", Property::integer(LIMIT).default(50))
                    .optional("start_at", Property::integer(START_AT).default(0)),
            )
            .handler_arc(with_client(c(), get_sprint_issues)),
        Tool::new("jira_get_user_profile", "Get a user profile, or the current user when no identifier is given")
            .tag(Tag::Jira)
            .read()
            .schema(InputSchema::new().optional(
                "user_identifier",
                Property::string("Account id (cloud) or user name (self-hosted)"),
            ))
            .handler_arc(with_client(c(), get_user_profile)),
        // Write
        Tool::new("jira_create_issue", "Create an issue")
            .tag(Tag::Jira)
            .write()
            .schema(
                InputSchema::new()
                    .required("project_key", Property::string("Project key, e.g. PROJ"))
                    .required("summary", Property::string("Issue summary"))
                    .required("issue_type", Property::string("Issue type, e.g. Task, Bug, Story"))
                    .optional("description", Property::string("Description in markdown"))
                    .optional("assignee", Property::string("Account id (cloud) or user name (self-hosted)"))
                    .optional("labels", Property::strings("Labels"))
                    .optional("priority", Property::string("Priority name, e.g. High"))
                    .optional("additional_fields", Property::string(ADDITIONAL)),
            )
            .handler_arc(with_client(c(), create_issue)),
        Tool::new("jira_update_issue", "Update fields of an issue")
            .tag(Tag::Jira)
            .write()
            .schema(
                InputSchema::new()
                    .required("issue_key", Property::string("Issue key"))
                    .optional("summary", Property::string("New summary"))
                    .optional("description", Property::string("New description in markdown"))
                    .optional("assignee", Property::string("Account id (cloud) or user name (self-hosted)"))
                    .optional("labels", Property::strings("Replacement labels"))
                    .optional("priority", Property::string("Priority name"))
                    .optional("additional_fields", Property::string(ADDITIONAL)),
            )
            .handler_arc(with_client(c(), update_issue)),
        Tool::new("jira_delete_issue", "Delete an issue")
            .tag(Tag::Jira)
            .write()
            .schema(
                InputSchema::new()
                    .required("issue_key", Property::string("Issue key"))
                    .optional(
                        "delete_subtasks",
                        Property::boolean("Also delete subtasks").default(false),
                    ),
            )
            .handler_arc(with_client(c(), delete_issue)),
        Tool::new("jira_add_comment", "Add a comment to an issue")
            .tag(Tag::Jira)
            .write()
            .schema(
                InputSchema::new()
                    .required("issue_key", Property::string("Issue key"))
                    .required("comment", Property::string("Comment text in markdown")),
            )
            .handler_arc(with_client(c(), add_comment)),
        Tool::new("jira_transition_issue", "Move an issue through its workflow")
            .tag(Tag::Jira)
            .write()
            .schema(
                InputSchema::new()
                    .required("issue_key", Property::string("Issue key"))
                    .required(
                        "transition",
                        Property::string("Transition id, transition name or target status"),
                    )
                    .optional("comment", Property::string("Comment added with the transition")),
            )
            .handler_arc(with_client(c(), transition_issue)),
    ]
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Deserialize)]
struct IssueKeyArgs {
    issue_key: String,
    #[serde(default)]
    fields: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    jql: String,
    #[serde(default)]
    fields: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    start_at: Option<u32>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectsArgs {
    #[serde(default)]
    include_archived: bool,
}

#[derive(Debug, Deserialize)]
struct ProjectIssuesArgs {
    project_key: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    start_at: Option<u32>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BoardsArgs {
    board_name: Option<String>,
    project_key: Option<String>,
    board_type: Option<String>,
    start_at: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BoardIssuesArgs {
    board_id: u64,
    #[serde(default)]
    jql: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    start_at: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SprintsArgs {
    board_id: u64,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    start_at: Option<u32>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SprintIssuesArgs {
    sprint_id: u64,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    start_at: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct UserArgs {
    #[serde(default)]
    user_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    project_key: String,
    summary: String,
    issue_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    additional_fields: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    issue_key: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    additional_fields: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    issue_key: String,
    #[serde(default)]
    delete_subtasks: bool,
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    issue_key: String,
    comment: String,
}

#[derive(Debug, Deserialize)]
struct TransitionArgs {
    issue_key: String,
    transition: String,
    #[serde(default)]
    comment: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn get_issue(c: Arc<JiraClient>, ctx: Context, a: IssueKeyArgs) -> Result<Issue> {
    c.get_issue(&ctx, &a.issue_key, a.fields.as_deref()).await
}

async fn search(c: Arc<JiraClient>, ctx: Context, a: SearchArgs) -> Result<SearchResult> {
    let query = SearchQuery {
        jql: a.jql,
        fields: comma_list(a.fields.as_deref()),
        limit: a.limit,
        start_at: a.start_at,
        next_page_token: a.next_page_token,
    };
    c.search(&ctx, &query).await
}

async fn get_all_projects(c: Arc<JiraClient>, ctx: Context, a: ProjectsArgs) -> Result<Vec<Project>> {
    c.get_all_projects(&ctx, a.include_archived).await
}

async fn get_project_issues(
    c: Arc<JiraClient>,
    ctx: Context,
    a: ProjectIssuesArgs,
) -> Result<SearchResult> {
    c.get_project_issues(&ctx, &a.project_key, a.limit, a.start_at, a.next_page_token)
        .await
}

async fn get_transitions(c: Arc<JiraClient>, ctx: Context, a: IssueKeyArgs) -> Result<Vec<Transition>> {
    c.get_transitions(&ctx, &a.issue_key).await
}

async fn get_agile_boards(c: Arc<JiraClient>, ctx: Context, a: BoardsArgs) -> Result<Value> {
    let query = BoardQuery {
        name: a.board_name,
        project_key: a.project_key,
        board_type: a.board_type,
        start_at: a.start_at,
        limit: a.limit,
    };
    c.get_agile_boards(&ctx, &query).await
}

async fn get_board_issues(c: Arc<JiraClient>, ctx: Context, a: BoardIssuesArgs) -> Result<SearchResult> {
    c.get_board_issues(&ctx, a.board_id, a.jql.as_deref(), a.limit, a.start_at)
        .await
}

async fn get_sprints_from_board(c: Arc<JiraClient>, ctx: Context, a: SprintsArgs) -> Result<Value> {
    c.get_sprints_from_board(&ctx, a.board_id, a.state.as_deref(), a.start_at, a.limit)
        .await
}

async fn get_sprint_issues(
    c: Arc<JiraClient>,
    ctx: Context,
    a: SprintIssuesArgs,
) -> Result<SearchResult> {
    c.get_sprint_issues(&ctx, a.sprint_id, a.limit, a.start_at).await
}

async fn get_user_profile(c: Arc<JiraClient>, ctx: Context, a: UserArgs) -> Result<JiraUser> {
    match a.user_identifier.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => c.get_user_profile(&ctx, id).await,
        _ => c.get_current_user(&ctx).await,
    }
}

async fn create_issue(c: Arc<JiraClient>, ctx: Context, a: CreateArgs) -> Result<Issue> {
    let input = CreateIssueInput {
        project_key: a.project_key,
        summary: a.summary,
        issue_type: a.issue_type,
        description: a.description,
        assignee: a.assignee,
        labels: a.labels,
        priority: a.priority,
        additional_fields: object_arg("additional_fields", a.additional_fields)?,
    };
    c.create_issue(&ctx, input).await
}

async fn update_issue(c: Arc<JiraClient>, ctx: Context, a: UpdateArgs) -> Result<Issue> {
    let input = UpdateIssueInput {
        summary: a.summary,
        description: a.description,
        assignee: a.assignee,
        labels: a.labels,
        priority: a.priority,
        additional_fields: object_arg("additional_fields", a.additional_fields)?,
    };
    c.update_issue(&ctx, &a.issue_key, input).await
}

async fn delete_issue(c: Arc<JiraClient>, ctx: Context, a: DeleteArgs) -> Result<Value> {
    c.delete_issue(&ctx, &a.issue_key, a.delete_subtasks).await?;
    Ok(json!({ "deleted": a.issue_key }))
}

async fn add_comment(c: Arc<JiraClient>, ctx: Context, a: CommentArgs) -> Result<Comment> {
    c.add_comment(&ctx, &a.issue_key, &a.comment).await
}

async fn transition_issue(c: Arc<JiraClient>, ctx: Context, a: TransitionArgs) -> Result<Value> {
    c.transition_issue(&ctx, &a.issue_key, &a.transition, a.comment.as_deref())
        .await?;
    Ok(json!({ "issue_key": a.issue_key, "transition": a.transition }))
}
