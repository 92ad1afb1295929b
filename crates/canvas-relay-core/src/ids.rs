//! Identifier generation
//!
//! Correlation ids must stay unique while a call is pending, so they combine
//! a microsecond timestamp with a random alphanumeric suffix
//! (e.g. `req-61f0c2a9b3d41-k3J9xQ2a`). Connection ids are plain UUIDs.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Length of the random suffix appended to timestamped ids
const SUFFIX_LEN: usize = 8;

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

fn timestamped(prefix: &str) -> String {
    let micros = Utc::now().timestamp_micros();
    format!("{}-{:x}-{}", prefix, micros, random_suffix())
}

/// Generate a correlation id for a forwarded host call
pub fn correlation_id() -> String {
    timestamped("req")
}

/// Generate an id for a buffered host event
pub fn event_id() -> String {
    timestamped("evt")
}

/// Generate a connection id for a host socket
pub fn connection_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current wall-clock time in milliseconds since UNIX_EPOCH
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
