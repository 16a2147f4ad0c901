use std::collections::HashMap;
use std::fmt;
use std::mem;

use axum::http::{header, request::Parts};
use axum::response::Response;
use serde_json::{Map, Value};

use crate::utils::response::Protocol;

/// Per-request key/value store shared by every middleware in the chain and
/// exposed to the route handler through a request extension.
#[derive(Debug, Clone, Default)]
pub struct ScratchData {
    data: HashMap<String, Value>,
}

impl ScratchData {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn merge(&mut self, entries: Map<String, Value>) {
        self.data.extend(entries);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Callback fired once the request has a final response, whether that is a
/// middleware failure or the route handler's own reply.
pub type EndHook = Box<dyn FnOnce(&RequestContext, &Response) + Send>;

/// Everything the chain knows about one inbound request.
///
/// A context is built fresh per request: scratch and end hooks start empty
/// and are never carried across requests.
pub struct RequestContext {
    /// lowercase HTTP verb
    pub method: String,
    pub path: String,
    /// header name (lowercase) → first value; non-UTF-8 values are dropped
    pub headers: HashMap<String, String>,
    /// parameters from a JSON object body; empty otherwise
    pub body: Map<String, Value>,
    /// token from `Authorization: Bearer <token>`; empty when absent or
    /// malformed
    pub bearer_token: String,
    /// negotiated content type was `application/json`
    pub rpc: bool,
    pub scratch: ScratchData,
    end_hooks: Vec<EndHook>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            method: "get".to_string(),
            path: String::new(),
            headers: HashMap::new(),
            body: Map::new(),
            bearer_token: String::new(),
            rpc: false,
            scratch: ScratchData::default(),
            end_hooks: Vec::new(),
        }
    }

    /// Parses request info out of buffered parts: method, headers, bearer
    /// token, protocol and body parameters.
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Self {
        let headers: HashMap<String, String> = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let bearer_token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(parse_bearer)
            .unwrap_or_default();

        let rpc = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        let body = if rpc {
            serde_json::from_slice::<Value>(body)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default()
        } else {
            Map::new()
        };

        Self {
            method: parts.method.as_str().to_lowercase(),
            path: parts.uri.path().to_string(),
            headers,
            body,
            bearer_token,
            rpc,
            scratch: ScratchData::default(),
            end_hooks: Vec::new(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::from_rpc_flag(self.rpc)
    }

    /// Registers a callback to run once the request has a final response.
    pub fn on_end(&mut self, hook: impl FnOnce(&RequestContext, &Response) + Send + 'static) {
        self.end_hooks.push(Box::new(hook));
    }

    /// Fires the registered end hooks in registration order. Hooks run at
    /// most once; calling this again is a no-op.
    pub fn finish(&mut self, response: &Response) {
        let hooks = mem::take(&mut self.end_hooks);
        for hook in hooks {
            hook(self, response);
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("bearer_token", &self.bearer_token)
            .field("rpc", &self.rpc)
            .field("end_hooks", &self.end_hooks.len())
            .finish_non_exhaustive()
    }
}

/// Second whitespace-separated piece of the header value, so `Bearer x`
/// yields `x` and a schemeless or empty value yields an empty string.
pub fn parse_bearer(value: &str) -> String {
    value
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(parse_bearer("abc.def.ghi"), "");
        assert_eq!(parse_bearer(""), "");
        assert_eq!(parse_bearer("Bearer"), "");
    }

    #[test]
    fn test_scratch_set_get() {
        let mut scratch = ScratchData::default();
        assert!(scratch.is_empty());
        scratch.set("k", serde_json::json!({"v": 1}));
        assert_eq!(scratch.get("k").unwrap()["v"], 1);
        assert!(scratch.get("missing").is_none());
    }
}
