/// Default relay listen port
pub const DEFAULT_PORT: u16 = 8765;

/// Default timeout for a forwarded host call (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Default number of host events kept in the ring buffer
pub const DEFAULT_EVENT_CAPACITY: usize = 200;

/// Reserved channel label; can never be left
pub const DEFAULT_CHANNEL: &str = "default";

/// Name announced to agents and host plugins
pub const DEFAULT_SERVER_NAME: &str = "canvas-relay";
