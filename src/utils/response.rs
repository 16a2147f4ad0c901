//! Response shaping for the two inbound protocols.
//!
//! Plain HTTP requests get a JSON body with the status as given. RPC-style
//! requests (negotiated content type `application/json`) get the envelope
//! `{success, code, data}` on success, or `{success: false, code, ...}` on
//! failure with the payload fields merged at the top level. RPC replies
//! always travel as HTTP 200; the envelope's `code` carries the real status.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

pub fn is_ok_response(status: StatusCode) -> bool {
    let code = status.as_u16();
    (200..300).contains(&code)
}

/// A shaped response, ready to hand back to axum.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Builds the RPC envelope for `(data, status)`.
///
/// Success nests the payload under `data`; failure merges the payload's
/// fields into the envelope itself. Callers relying on the failure shape
/// must read `message`/`type` at the top level, not under `data`.
pub fn rpc_envelope(data: Value, status: StatusCode) -> Value {
    let mut envelope = json!({
        "success": is_ok_response(status),
        "code": status.as_u16(),
    });

    if is_ok_response(status) {
        envelope["data"] = data;
        return envelope;
    }

    if let (Some(fields), Some(env)) = (data.as_object(), envelope.as_object_mut()) {
        for (key, value) in fields {
            env.insert(key.clone(), value.clone());
        }
    }
    envelope
}

/// The negotiated protocol of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Rpc,
}

impl Protocol {
    pub fn from_content_type(value: Option<&str>) -> Self {
        match value {
            Some(ct) if ct.contains("application/json") => Protocol::Rpc,
            _ => Protocol::Http,
        }
    }

    pub fn from_rpc_flag(rpc: bool) -> Self {
        if rpc { Protocol::Rpc } else { Protocol::Http }
    }

    pub fn is_rpc(self) -> bool {
        matches!(self, Protocol::Rpc)
    }

    /// Shapes `(data, status)` into a response for this protocol.
    pub fn respond(self, data: Value, status: StatusCode) -> ApiResponse {
        match self {
            Protocol::Http => ApiResponse { status, body: data },
            Protocol::Rpc => ApiResponse {
                status: StatusCode::OK,
                body: rpc_envelope(data, status),
            },
        }
    }
}

impl<S> FromRequestParts<S> for Protocol
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        Ok(Protocol::from_content_type(content_type))
    }
}
