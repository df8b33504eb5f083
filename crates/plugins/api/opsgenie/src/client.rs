//! Opsgenie API client implementation.
//!
//! Write endpoints are asynchronous on the Opsgenie side: they answer 202
//! with a request id whose outcome is read from `get_request_status`.

use async_trait::async_trait;
use atlas_core::{Context, Error, Flavor, HttpClient, Request, Result, ServiceProvider};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::{
    Alert, AlertAction, AlertCount, AlertQuery, AsyncRequest, CreateAlertInput, Envelope,
    IdentifierType,
};

const MAX_LIMIT: u32 = 100;
const MAX_MESSAGE_CHARS: usize = 130;
const MAX_ALIAS_CHARS: usize = 512;
const PRIORITIES: &[&str] = &["P1", "P2", "P3", "P4", "P5"];

/// Opsgenie API client.
pub struct OpsgenieClient {
    http: HttpClient,
}

impl OpsgenieClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn get_data<T: DeserializeOwned>(&self, ctx: &Context, request: Request) -> Result<T> {
        let envelope: Envelope<T> = self.http.execute(ctx, request).await?.json()?;
        Ok(envelope.data)
    }

    async fn post_request(&self, ctx: &Context, request: Request) -> Result<AsyncRequest> {
        self.http.execute(ctx, request).await?.json()
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    pub async fn list_alerts(&self, ctx: &Context, query: &AlertQuery) -> Result<Vec<Alert>> {
        debug!(query = ?query.query, "Opsgenie list alerts");
        let request = Request::get("/v2/alerts")
            .query_opt("query", query.query.as_deref().filter(|q| !q.trim().is_empty()))
            .query_opt("limit", query.limit.map(|l| l.clamp(1, MAX_LIMIT)))
            .query_opt("offset", query.offset)
            .query_opt("sort", query.sort.as_deref())
            .query_opt("order", query.order.as_deref());
        self.get_data(ctx, request).await
    }

    pub async fn get_alert(
        &self,
        ctx: &Context,
        identifier: &str,
        identifier_type: IdentifierType,
    ) -> Result<Alert> {
        let identifier = required("identifier", identifier)?;
        let request = Request::get(format!("/v2/alerts/{}", identifier))
            .query("identifierType", identifier_type.as_str());
        self.get_data(ctx, request).await
    }

    /// Number of alerts matching `query` (all alerts when unset).
    pub async fn count_alerts(&self, ctx: &Context, query: Option<&str>) -> Result<u64> {
        let request = Request::get("/v2/alerts/count")
            .query_opt("query", query.filter(|q| !q.trim().is_empty()));
        let count: AlertCount = self.get_data(ctx, request).await?;
        Ok(count.count)
    }

    pub async fn create_alert(&self, ctx: &Context, input: &CreateAlertInput) -> Result<AsyncRequest> {
        validate_alert(input)?;
        debug!(priority = ?input.priority, "Opsgenie create alert");
        self.post_request(ctx, Request::post("/v2/alerts").json(input)?)
            .await
    }

    pub async fn acknowledge_alert(
        &self,
        ctx: &Context,
        identifier: &str,
        identifier_type: IdentifierType,
        action: &AlertAction,
    ) -> Result<AsyncRequest> {
        self.alert_action(ctx, identifier, identifier_type, "acknowledge", action)
            .await
    }

    pub async fn close_alert(
        &self,
        ctx: &Context,
        identifier: &str,
        identifier_type: IdentifierType,
        action: &AlertAction,
    ) -> Result<AsyncRequest> {
        self.alert_action(ctx, identifier, identifier_type, "close", action)
            .await
    }

    pub async fn add_note(
        &self,
        ctx: &Context,
        identifier: &str,
        identifier_type: IdentifierType,
        note: &str,
        action: &AlertAction,
    ) -> Result<AsyncRequest> {
        let note = required("note", note)?;
        let action = AlertAction {
            note: Some(note.to_string()),
            ..action.clone()
        };
        self.alert_action(ctx, identifier, identifier_type, "notes", &action)
            .await
    }

    async fn alert_action(
        &self,
        ctx: &Context,
        identifier: &str,
        identifier_type: IdentifierType,
        action_name: &str,
        action: &AlertAction,
    ) -> Result<AsyncRequest> {
        let identifier = required("identifier", identifier)?;
        debug!(identifier, action = action_name, "Opsgenie alert action");
        let request = Request::post(format!("/v2/alerts/{}/{}", identifier, action_name))
            .query("identifierType", identifier_type.as_str())
            .json(action)?;
        self.post_request(ctx, request).await
    }

    /// Outcome of an asynchronous request.
    pub async fn get_request_status(&self, ctx: &Context, request_id: &str) -> Result<Value> {
        let request_id = required("request_id", request_id)?;
        self.get_data(ctx, Request::get(format!("/v2/alerts/requests/{}", request_id)))
            .await
    }

    // =========================================================================
    // Schedules
    // =========================================================================

    pub async fn list_schedules(&self, ctx: &Context, expand_rotations: bool) -> Result<Value> {
        let request = Request::get("/v2/schedules")
            .query_opt("expand", expand_rotations.then_some("rotation"));
        self.get_data(ctx, request).await
    }

    /// Current on-call participants of a schedule, by schedule id or name.
    pub async fn get_on_calls(
        &self,
        ctx: &Context,
        schedule: &str,
        by_name: bool,
        flat: bool,
        date: Option<&str>,
    ) -> Result<Value> {
        let schedule = required("schedule", schedule)?;
        let request = Request::get(format!("/v2/schedules/{}/on-calls", schedule))
            .query("scheduleIdentifierType", if by_name { "name" } else { "id" })
            .query("flat", flat)
            .query_opt("date", date);
        self.get_data(ctx, request).await
    }

    pub async fn get_account(&self, ctx: &Context) -> Result<Value> {
        self.get_data(ctx, Request::get("/v2/account")).await
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

fn validate_alert(input: &CreateAlertInput) -> Result<()> {
    let message = required("message", &input.message)?;
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(Error::InvalidInput(format!(
            "message is limited to {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    if let Some(alias) = &input.alias {
        if alias.chars().count() > MAX_ALIAS_CHARS {
            return Err(Error::InvalidInput(format!(
                "alias is limited to {} characters",
                MAX_ALIAS_CHARS
            )));
        }
    }
    if let Some(priority) = &input.priority {
        if !PRIORITIES.contains(&priority.as_str()) {
            return Err(Error::InvalidInput(format!(
                "priority must be one of {}",
                PRIORITIES.join(", ")
            )));
        }
    }
    Ok(())
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl ServiceProvider for OpsgenieClient {
    fn name(&self) -> &'static str {
        "opsgenie"
    }

    fn flavor(&self) -> Flavor {
        Flavor::Cloud
    }

    async fn health_check(&self, ctx: &Context) -> Result<Value> {
        let account = self.get_account(ctx).await?;
        Ok(json!({ "account": account }))
    }
}
