//! Tool model: definitions, tags and handlers.

pub mod args;
pub mod confluence;
pub mod jira;
pub mod opsgenie;
pub mod schema;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use atlas_core::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol::{ToolCallResult, ToolDefinition};

pub use schema::{InputSchema, Property};

/// Tool tag: a service or an access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Jira,
    Confluence,
    Opsgenie,
    Read,
    Write,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Jira => "jira",
            Tag::Confluence => "confluence",
            Tag::Opsgenie => "opsgenie",
            Tag::Read => "read",
            Tag::Write => "write",
        }
    }
}

/// Executes one tool call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &Context, args: Map<String, Value>) -> Result<ToolCallResult>;
}

/// A named, schema-described tool.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    schema: InputSchema,
    tags: Vec<Tag>,
    handler: Option<Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: InputSchema::new(),
            tags: Vec::new(),
            handler: None,
        }
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn read(self) -> Self {
        self.tag(Tag::Read)
    }

    pub fn write(self) -> Self {
        self.tag(Tag::Write)
    }

    pub fn schema(mut self, schema: InputSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn handler(self, handler: impl ToolHandler + 'static) -> Self {
        self.handler_arc(Arc::new(handler))
    }

    pub fn handler_arc(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_write(&self) -> bool {
        self.has_tag(Tag::Write)
    }

    pub(crate) fn handler_ref(&self) -> Option<&Arc<dyn ToolHandler>> {
        self.handler.as_ref()
    }

    /// Public part, as listed to clients.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.to_json(),
        }
    }
}

// =============================================================================
// Closure handlers
// =============================================================================

/// Handler backed by an async closure.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Context, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolCallResult>> + Send + 'static,
{
    async fn call(&self, ctx: &Context, args: Map<String, Value>) -> Result<ToolCallResult> {
        (self.f)(ctx.clone(), args).await
    }
}

/// Handler that decodes `A`, calls `f` with a shared client and renders the
/// output as pretty JSON.
pub fn with_client<C, A, T, F, Fut>(client: Arc<C>, f: F) -> Arc<dyn ToolHandler>
where
    C: Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    T: Serialize + Send + 'static,
    F: Fn(Arc<C>, Context, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(FnHandler::new(move |ctx: Context, raw: Map<String, Value>| {
        let call = args::decode::<A>(raw).map(|decoded| f(Arc::clone(&client), ctx, decoded));
        async move {
            let output = call?.await?;
            ToolCallResult::json(&output)
        }
    }))
}
