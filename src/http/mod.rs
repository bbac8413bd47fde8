//! HTTP module
//!
//! The HTTP listener speaks just enough HTTP/1.1 for the legacy launcher: one
//! request per connection, read in a single bounded chunk, answered with a
//! plain-text body and `Connection: close`. Routes:
//!
//! - `/AuthLogin`   web login, issues a session ticket
//! - `/ShardList/`  shard directory in the legacy INI-like format
//! - `/health`      liveness probe
//!
//! Anything else is a 400.

pub mod auth;
pub mod shards;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::state::AppState;

/// A parsed HTTP request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub params: HashMap<String, String>,
}

/// Parse the request line out of a raw HTTP request.
///
/// Only the first line matters; headers and body are ignored. Returns `None`
/// when the line does not look like `METHOD /path[?query] HTTP/x`.
pub fn parse_request(raw: &str) -> Option<HttpRequest> {
    let line = raw.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;
    // Third token must exist for a well-formed request line.
    parts.next()?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    Some(HttpRequest {
        method,
        path: path.to_string(),
        params: parse_query_string(query),
    })
}

/// Split a query string into key/value pairs.
///
/// Later duplicates win. Values are taken verbatim; the legacy launcher does
/// not percent-encode.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => params.insert(key.to_string(), value.to_string()),
            None => params.insert(pair.to_string(), String::new()),
        };
    }
    params
}

/// Format a minimal plain-text HTTP/1.1 response
pub fn make_response(status: u16, body: &str) -> String {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )
}

/// Route one raw HTTP request to its handler and build the full response
pub async fn handle_request(state: &Arc<AppState>, raw: &str) -> String {
    let request = match parse_request(raw) {
        Some(request) => request,
        None => {
            warn!("Unparsable HTTP request");
            return make_response(400, "Invalid request\n");
        }
    };

    debug!(method = %request.method, path = %request.path, "HTTP request");

    match request.path.as_str() {
        "/AuthLogin" => {
            let reply =
                auth::handle_auth_login(&request.params, &state.credentials, &state.sessions)
                    .await;
            let status = if reply.is_granted() { 200 } else { 401 };
            make_response(status, &reply.body())
        }
        "/ShardList/" => make_response(200, &state.shards.format_response()),
        "/health" => make_response(200, "Server is running\n"),
        _ => {
            debug!(path = %request.path, "Unknown HTTP route");
            make_response(400, "Invalid request\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_request_with_query() {
        let raw = "GET /AuthLogin?username=molly&password=pw HTTP/1.1\r\nHost: x\r\n\r\n";
        let request = parse_request(raw).unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/AuthLogin");
        assert_eq!(request.params.get("username").unwrap(), "molly");
        assert_eq!(request.params.get("password").unwrap(), "pw");
    }

    #[test]
    fn test_parse_request_without_query() {
        let request = parse_request("GET /health HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(request.path, "/health");
        assert!(request.params.is_empty());
    }

    #[test]
    fn test_parse_request_malformed() {
        assert_eq!(parse_request(""), None);
        assert_eq!(parse_request("GET"), None);
        assert_eq!(parse_request("GET /health"), None);
        assert_eq!(parse_request("\r\n\r\n"), None);
    }

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string("a=1&b=&c&a=2");
        assert_eq!(params.get("a").unwrap(), "2");
        assert_eq!(params.get("b").unwrap(), "");
        assert_eq!(params.get("c").unwrap(), "");
    }

    #[test]
    fn test_make_response() {
        let response = make_response(200, "Valid=TRUE\n");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 11\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.ends_with("\r\n\r\nValid=TRUE\n"));
    }
}
