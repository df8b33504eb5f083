//! MCP (Model Context Protocol) runtime for atlas-tools.
//!
//! Reads JSON-RPC 2.0 envelopes one per line, dispatches `tools/call` to the
//! registered tool handlers and writes one response per request.
//!
//! # Example
//!
//! ```ignore
//! use atlas_mcp::{build_registry, McpServer, Services, ToolFilter};
//!
//! let services = Services::from_config(&config)?;
//! let registry = build_registry(&services)?;
//! let server = McpServer::new(registry, ToolFilter::new(config.enabled_tools, config.read_only));
//! server.run(&ctx, &mut LineTransport::stdio()).await?;
//! ```

pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod services;
pub mod tools;
pub mod transport;

pub use registry::{RegistryError, ToolFilter, ToolRegistry};
pub use server::McpServer;
pub use services::{build_registry, Services};
pub use tools::{Tag, Tool, ToolHandler};
pub use transport::LineTransport;
