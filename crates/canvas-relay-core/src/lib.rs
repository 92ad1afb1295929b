//! Canvas Relay Core Library
//!
//! Core of a relay that lets AI agents drive a design-tool plugin over MCP.
//! The relay forwards tool calls to the plugin, correlates its replies,
//! buffers the events it pushes and runs a handful of tools locally.
//! Servers and transports live in the binary crate; everything here is
//! transport-agnostic.
//!
//! # Modules
//!
//! - [`relay`] - The relay context that owns all shared state
//! - [`delivery`] - Routing of forwarded calls and inbound host messages
//! - [`correlation`] - Pending-call table with timeouts
//! - [`transport`] - Socket and polling links to the host
//! - [`events`] - Bounded, channel-tagged event buffer
//! - [`channels`] - Channel registry
//! - [`snapshot`] - Node snapshot diffing
//! - [`tools`] - Tool catalog and argument schemas
//! - [`dispatcher`] - Tool execution
//! - [`prompts`] - Prompt catalog
//! - [`mcp`] - MCP JSON-RPC request handling
//! - [`protocol`] - Wire types
//! - [`config`] - Relay configuration
//! - [`ids`] - Identifier generation
//! - [`error`] - Error types

pub mod channels;
pub mod config;
pub mod correlation;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod ids;
pub mod mcp;
pub mod prompts;
pub mod protocol;
pub mod relay;
pub mod snapshot;
pub mod tools;
pub mod transport;

/// Version announced in handshakes and `initialize`
pub const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use config::RelayConfig;
pub use delivery::InboundKind;
pub use dispatcher::{ToolDispatcher, ToolResult};
pub use error::{RelayError, Result};
pub use events::{Event, EventQuery};
pub use mcp::McpServer;
pub use protocol::{McpRequest, McpResponse, RelayMessage, RequestEnvelope};
pub use relay::{ChannelListing, LeaveReport, Relay, RelayStatus};
pub use snapshot::{diff, DiffResult};
pub use tools::ToolCatalog;
pub use transport::{HostLink, TransportType};
