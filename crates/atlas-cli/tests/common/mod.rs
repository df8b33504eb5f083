//! Common test utilities for driving a server session in memory.
//!
//! A [`Session`] runs [`McpServer::run`] on its own task over a duplex stream;
//! the test writes request lines and reads response lines from the other end.

use std::time::Duration;

use atlas_core::config::Config;
use atlas_core::Context;
use atlas_mcp::{build_registry, LineTransport, McpServer, Services, ToolFilter, ToolRegistry};
use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Session {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    handle: JoinHandle<atlas_core::Result<()>>,
    ctx: Context,
}

impl Session {
    pub fn start(server: McpServer) -> Self {
        let ctx = Context::new();
        let (client, server_io) = tokio::io::duplex(256 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);

        let run_ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            let mut transport = LineTransport::new(BufReader::new(server_read), server_write);
            server.run(&run_ctx, &mut transport).await
        });

        let (client_read, writer) = tokio::io::split(client);
        Self {
            writer,
            lines: BufReader::new(client_read).lines(),
            handle,
            ctx,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(RESPONSE_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a response")
            .unwrap()
            .expect("server closed the stream");
        serde_json::from_str(&line).unwrap()
    }

    pub async fn request(&mut self, line: &str) -> Value {
        self.send(line).await;
        self.recv().await
    }

    /// Cancel the session context and wait for the loop to end.
    pub async fn cancel(self) -> atlas_core::Result<()> {
        self.ctx.cancel();
        self.handle.await.unwrap()
    }

    /// Close the input stream and wait for the loop to end.
    pub async fn close(mut self) -> atlas_core::Result<()> {
        self.writer.shutdown().await.unwrap();
        self.handle.await.unwrap()
    }
}

/// Config from TOML text, with no environment applied.
pub fn config(toml_text: &str) -> Config {
    let config: Config = toml::from_str(toml_text).unwrap();
    config.validate().unwrap();
    config
}

/// Server over the real tool tables of `config`.
pub fn server_for(config: &Config) -> McpServer {
    let services = Services::from_config(config).unwrap();
    let registry = build_registry(&services).unwrap();
    McpServer::new(
        registry,
        ToolFilter::new(config.enabled_tools.iter().cloned(), config.read_only),
    )
}

/// Server over a hand-built registry.
pub fn server_with(registry: ToolRegistry, read_only: bool) -> McpServer {
    McpServer::new(registry, ToolFilter::new(Vec::<String>::new(), read_only))
}

/// A Jira section pointing at `url`, with fast failure.
pub fn jira_config(url: &str, extra: &str) -> Config {
    config(&format!(
        r#"
        {extra}

        [http]
        max_attempts = 1

        [jira]
        url = "{url}"
        username = "bot@example.com"
        api_token = "jira-api-token"
        "#
    ))
}
