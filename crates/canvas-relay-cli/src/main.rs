//! Canvas Relay CLI
//!
//! Runs the relay server the design-tool plugin connects to, and serves an
//! MCP session on stdio for the agent that launched it.

use canvas_relay_core::config::defaults::{
    DEFAULT_CHANNEL, DEFAULT_EVENT_CAPACITY, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_MS,
};
use canvas_relay_core::{McpServer, Relay, RelayConfig};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod relay_server;
mod stdio;

/// Canvas Relay - MCP bridge between AI agents and a design-tool plugin
#[derive(Parser, Debug)]
#[command(name = "canvas-relay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Port for the plugin socket, polling and HTTP MCP endpoints
    #[arg(short, long, env = "CANVAS_RELAY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Timeout for each forwarded host call, in milliseconds
    #[arg(long, env = "CANVAS_RELAY_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Number of host events kept in the ring buffer
    #[arg(long, env = "CANVAS_RELAY_EVENT_CAPACITY", default_value_t = DEFAULT_EVENT_CAPACITY)]
    event_capacity: usize,

    /// Reserved default channel label
    #[arg(long, env = "CANVAS_RELAY_CHANNEL", default_value = DEFAULT_CHANNEL)]
    default_channel: String,

    /// Run only the relay server, without the stdio MCP session
    #[arg(long)]
    relay_only: bool,
}

impl Args {
    fn config(&self) -> RelayConfig {
        RelayConfig::new()
            .with_port(self.port)
            .with_request_timeout_ms(self.timeout_ms)
            .with_event_capacity(self.event_capacity)
            .with_default_channel(self.default_channel.clone())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the MCP stream, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    let relay = Relay::new(args.config()).map_err(String::from)?;
    let mcp = Arc::new(McpServer::new(relay.clone()).map_err(String::from)?);

    let listener = relay_server::bind(relay.config().port).await?;
    tracing::info!(
        "Starting Canvas Relay v{} on port {}",
        canvas_relay_core::RELAY_VERSION,
        relay.config().port
    );

    let server = relay_server::serve(listener, relay.clone(), mcp.clone());
    if args.relay_only {
        return server.await;
    }

    tokio::select! {
        result = server => result,
        result = stdio::run_stdio(mcp) => result,
    }
}
