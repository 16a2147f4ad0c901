use std::fmt;

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::utils::response::ApiResponse;

/// A typed middleware failure: message, status and a machine-readable kind
/// the client can switch on.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub message: String,
    pub status: StatusCode,
    pub kind: String,
}

impl Rejection {
    pub fn new(message: impl Into<String>, status: StatusCode, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            kind: kind.into(),
        }
    }

    /// 400 with the default kind.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST, "middleware_exception")
    }

    /// The failure payload: `{message, type, code}`.
    pub fn body(&self) -> Value {
        json!({
            "message": self.message,
            "type": self.kind,
            "code": self.status.as_u16(),
        })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// What a handler hands back when it aborts the chain.
#[derive(Debug)]
pub enum MiddlewareError {
    /// A typed rejection, rendered as `{message, type, code}` at its
    /// status.
    Rejection(Rejection),
    /// A pre-rendered response, returned as-is. Takes precedence over the
    /// generic failure shaping.
    Response(ApiResponse),
    /// Anything else. Logged with the handler's identity and rendered as
    /// an empty 400.
    Unexpected(anyhow::Error),
}

impl From<Rejection> for MiddlewareError {
    fn from(rejection: Rejection) -> Self {
        MiddlewareError::Rejection(rejection)
    }
}

impl From<ApiResponse> for MiddlewareError {
    fn from(response: ApiResponse) -> Self {
        MiddlewareError::Response(response)
    }
}

impl From<anyhow::Error> for MiddlewareError {
    fn from(error: anyhow::Error) -> Self {
        MiddlewareError::Unexpected(error)
    }
}
