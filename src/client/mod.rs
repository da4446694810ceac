// One-shot client helper for talking to the load balancer.

use serde_json::{json, Value};

use crate::protocol;

/// Renders the read-path request line for a `resource/key` path.
pub fn build_request(path: &str) -> String {
    format!("GET {}\n", path)
}

/// Sends one request line and returns the parsed JSON response. Any
/// transport or parse failure yields the synthetic client-side error
/// response instead of an `Err`; callers always get a status to print.
pub async fn send_request(addr: &str, request_line: &str) -> Value {
    match protocol::exchange(addr, request_line).await {
        Ok(line) => serde_json::from_str(&line).unwrap_or_else(|_| connection_error()),
        Err(_) => connection_error(),
    }
}

fn connection_error() -> Value {
    json!({
        "status": "CLIENT_CONNECTION_ERROR",
        "data": null,
    })
}
