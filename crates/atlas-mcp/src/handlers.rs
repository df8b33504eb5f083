//! Tool invocation.
//!
//! Handler failures never become protocol errors: every error, panic or
//! cancellation is turned into a tool result with `isError` set.

use std::any::Any;
use std::sync::Arc;

use atlas_core::{Context, Error};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::protocol::ToolCallResult;
use crate::tools::Tool;

/// Run `tool` with `args` under `ctx`.
///
/// The handler runs as its own task so a panic is contained. If `ctx` finishes
/// first the task is aborted and the cancellation cause is reported.
pub async fn invoke(ctx: &Context, tool: &Tool, args: Map<String, Value>) -> ToolCallResult {
    let Some(handler) = tool.handler_ref().map(Arc::clone) else {
        return error_result(&Error::Unsupported(format!("tool '{}' has no handler", tool.name())));
    };
    let name = tool.name().to_string();
    debug!(tool = %name, "Invoking tool");

    let call_ctx = ctx.child();
    let task_ctx = call_ctx.clone();
    let mut task = tokio::spawn(async move { handler.call(&task_ctx, args).await });

    let outcome = tokio::select! {
        joined = &mut task => match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(Error::Other(anyhow::anyhow!(
                "tool panicked: {}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(Error::Cancelled(e.to_string())),
        },
        cause = ctx.done() => {
            call_ctx.cancel();
            task.abort();
            Err(cause)
        }
    };

    match outcome {
        Ok(result) => result,
        Err(err) => {
            warn!(tool = %name, kind = err.kind(), error = %err, "Tool failed");
            error_result(&err)
        }
    }
}

/// Tool result describing `err`.
///
/// The first item is `"<kind>: <message>"`. When the upstream answered with a
/// status, a second item carries `{"reason", "status", "body"}` as JSON.
pub fn error_result(err: &Error) -> ToolCallResult {
    let result = ToolCallResult::error(format!("{}: {}", err.kind(), err));
    match err.status() {
        Some(status) => {
            let detail = json!({
                "reason": err.kind(),
                "status": status,
                "body": err.body().unwrap_or_default(),
            });
            result.with_text(detail.to_string())
        }
        None => result,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
