//! Opsgenie tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use atlas_core::{Context, Error, Result};
use atlas_opsgenie::{
    Alert, AlertAction, AlertQuery, AsyncRequest, CreateAlertInput, IdentifierType, OpsgenieClient,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{with_client, InputSchema, Property, Tag, Tool};

const IDENTIFIER: &str = "Alert id, alias or tiny id";
const IDENTIFIER_TYPES: &[&str] = &["id", "alias", "tiny"];
const RESPONDER_KINDS: &[&str] = &["team", "user", "escalation", "schedule"];

fn identifier_schema() -> InputSchema {
    InputSchema::new()
        .required("identifier", Property::string(IDENTIFIER))
        .optional(
            "identifier_type",
            Property::one_of("How the identifier is interpreted", IDENTIFIER_TYPES).default("id"),
        )
}

fn action_schema() -> InputSchema {
    identifier_schema()
        .optional("user", Property::string("Display name of the acting user"))
        .optional("source", Property::string("Source of the action"))
        .optional("note", Property::string("Note attached to the action"))
}

/// Every Opsgenie tool, bound to `client`.
pub fn tools(client: Arc<OpsgenieClient>) -> Vec<Tool> {
    let c = || Arc::clone(&client);
    vec![
        Tool::new("opsgenie_list_alerts", "List alerts matching an Opsgenie search query")
            .tag(Tag::Opsgenie)
            .read()
            .schema(
                InputSchema::new()
                    .optional("query", Property::string("Search query, e.g. status:open AND priority:P1"))
                    .optional("limit", Property::integer("Maximum number of alerts (1-100)").default(20))
                    .optional("offset", Property::integer("Index of the first alert").default(0))
                    .optional("sort", Property::string("Field to sort on, e.g. createdAt"))
                    .optional("order", Property::one_of("Sort order", &["asc", "desc"])),
            )
            .handler_arc(with_client(c(), list_alerts)),
        Tool::new("opsgenie_get_alert", "Get one alert with its description and details")
            .tag(Tag::Opsgenie)
            .read()
            .schema(identifier_schema())
            .handler_arc(with_client(c(), get_alert)),
        Tool::new("opsgenie_count_alerts", "Count alerts matching a search query")
            .tag(Tag::Opsgenie)
            .read()
            .schema(InputSchema::new().optional("query", Property::string("Search query")))
            .handler_arc(with_client(c(), count_alerts)),
        Tool::new("opsgenie_get_request_status", "Get the outcome of an asynchronous alert request")
            .tag(Tag::Opsgenie)
            .read()
            .schema(InputSchema::new().required("request_id", Property::string("Request id")))
            .handler_arc(with_client(c(), get_request_status)),
        Tool::new("opsgenie_list_schedules", "List on-call schedules")
            .tag(Tag::Opsgenie)
            .read()
            .schema(InputSchema::new().optional(
                "expand_rotations",
                Property::boolean("Include rotation details").default(false),
            ))
            .handler_arc(with_client(c(), list_schedules)),
        Tool::new("opsgenie_get_on_calls", "Get the current on-call participants of a schedule")
            .tag(Tag::Opsgenie)
            .read()
            .schema(
                InputSchema::new()
                    .required("schedule", Property::string("Schedule id or name"))
                    .optional(
                        "schedule_identifier_type",
                        Property::one_of("How the schedule is identified", &["id", "name"]).default("id"),
                    )
                    .optional("flat", Property::boolean("Return participant names only").default(false))
                    .optional("date", Property::string("Point in time, ISO 8601")),
            )
            .handler_arc(with_client(c(), get_on_calls)),
        Tool::new("opsgenie_create_alert", "Create an alert")
            .tag(Tag::Opsgenie)
            .write()
            .schema(
                InputSchema::new()
                    .required("message", Property::string("Alert message, at most 130 characters"))
                    .optional("alias", Property::string("Deduplication key"))
                    .optional("description", Property::string("Longer description"))
                    .optional(
                        "responders",
                        Property::strings("Responders as kind:name, e.g. team:ops or user:jane@example.com"),
                    )
                    .optional("tags", Property::strings("Tags"))
                    .optional("entity", Property::string("Entity the alert relates to"))
                    .optional("source", Property::string("Source of the alert"))
                    .optional(
                        "priority",
                        Property::one_of("Priority", &["P1", "P2", "P3", "P4", "P5"]).default("P3"),
                    )
                    .optional("note", Property::string("Note added on creation"))
                    .optional("user", Property::string("Display name of the creating user")),
            )
            .handler_arc(with_client(c(), create_alert)),
        Tool::new("opsgenie_acknowledge_alert", "Acknowledge an alert")
            .tag(Tag::Opsgenie)
            .write()
            .schema(action_schema())
            .handler_arc(with_client(c(), acknowledge_alert)),
        Tool::new("opsgenie_close_alert", "Close an alert")
            .tag(Tag::Opsgenie)
            .write()
            .schema(action_schema())
            .handler_arc(with_client(c(), close_alert)),
        Tool::new("opsgenie_add_note", "Add a note to an alert")
            .tag(Tag::Opsgenie)
            .write()
            .schema(
                identifier_schema()
                    .required("note", Property::string("Note text"))
                    .optional("user", Property::string("Display name of the acting user"))
                    .optional("source", Property::string("Source of the note")),
            )
            .handler_arc(with_client(c(), add_note)),
    ]
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Deserialize)]
struct IdentifierArgs {
    identifier: String,
    #[serde(default)]
    identifier_type: IdentifierType,
}

#[derive(Debug, Deserialize)]
struct ActionArgs {
    identifier: String,
    #[serde(default)]
    identifier_type: IdentifierType,
    #[serde(flatten)]
    action: AlertAction,
}

#[derive(Debug, Deserialize)]
struct NoteArgs {
    identifier: String,
    #[serde(default)]
    identifier_type: IdentifierType,
    note: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountArgs {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestArgs {
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct SchedulesArgs {
    #[serde(default)]
    expand_rotations: bool,
}

#[derive(Debug, Deserialize)]
struct OnCallArgs {
    schedule: String,
    #[serde(default)]
    schedule_identifier_type: Option<String>,
    #[serde(default)]
    flat: bool,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    message: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    responders: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    details: BTreeMap<String, String>,
    #[serde(default)]
    entity: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

/// Parse `kind:name` into an Opsgenie responder object.
fn responder(raw: &str) -> Result<Value> {
    let (kind, name) = raw
        .split_once(':')
        .map(|(k, n)| (k.trim().to_ascii_lowercase(), n.trim()))
        .filter(|(k, n)| !n.is_empty() && RESPONDER_KINDS.contains(&k.as_str()))
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "responder '{}' must look like team:name, user:email, escalation:name or schedule:name",
                raw
            ))
        })?;
    let key = if kind == "user" { "username" } else { "name" };
    Ok(json!({ "type": kind, key: name }))
}

// =============================================================================
// Handlers
// =============================================================================

async fn list_alerts(c: Arc<OpsgenieClient>, ctx: Context, a: AlertQuery) -> Result<Vec<Alert>> {
    c.list_alerts(&ctx, &a).await
}

async fn get_alert(c: Arc<OpsgenieClient>, ctx: Context, a: IdentifierArgs) -> Result<Alert> {
    c.get_alert(&ctx, &a.identifier, a.identifier_type).await
}

async fn count_alerts(c: Arc<OpsgenieClient>, ctx: Context, a: CountArgs) -> Result<Value> {
    let count = c.count_alerts(&ctx, a.query.as_deref()).await?;
    Ok(json!({ "count": count }))
}

async fn get_request_status(c: Arc<OpsgenieClient>, ctx: Context, a: RequestArgs) -> Result<Value> {
    c.get_request_status(&ctx, &a.request_id).await
}

async fn list_schedules(c: Arc<OpsgenieClient>, ctx: Context, a: SchedulesArgs) -> Result<Value> {
    c.list_schedules(&ctx, a.expand_rotations).await
}

async fn get_on_calls(c: Arc<OpsgenieClient>, ctx: Context, a: OnCallArgs) -> Result<Value> {
    let by_name = match a.schedule_identifier_type.as_deref() {
        None | Some("id") => false,
        Some("name") => true,
        Some(other) => {
            return Err(Error::InvalidInput(format!(
                "schedule_identifier_type must be id or name, got '{}'",
                other
            )))
        }
    };
    c.get_on_calls(&ctx, &a.schedule, by_name, a.flat, a.date.as_deref())
        .await
}

async fn create_alert(c: Arc<OpsgenieClient>, ctx: Context, a: CreateArgs) -> Result<AsyncRequest> {
    let responders = a
        .responders
        .iter()
        .map(|r| responder(r))
        .collect::<Result<Vec<_>>>()?;
    let input = CreateAlertInput {
        message: a.message,
        alias: a.alias,
        description: a.description,
        responders,
        tags: a.tags,
        details: a.details,
        entity: a.entity,
        source: a.source,
        priority: a.priority,
        note: a.note,
        user: a.user,
    };
    c.create_alert(&ctx, &input).await
}

async fn acknowledge_alert(c: Arc<OpsgenieClient>, ctx: Context, a: ActionArgs) -> Result<AsyncRequest> {
    c.acknowledge_alert(&ctx, &a.identifier, a.identifier_type, &a.action)
        .await
}

async fn close_alert(c: Arc<OpsgenieClient>, ctx: Context, a: ActionArgs) -> Result<AsyncRequest> {
    c.close_alert(&ctx, &a.identifier, a.identifier_type, &a.action)
        .await
}

async fn add_note(c: Arc<OpsgenieClient>, ctx: Context, a: NoteArgs) -> Result<AsyncRequest> {
    let action = AlertAction {
        user: a.user,
        source: a.source,
        note: None,
    };
    c.add_note(&ctx, &a.identifier, a.identifier_type, &a.note, &action)
        .await
}
