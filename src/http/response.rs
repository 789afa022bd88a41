//! Response construction.
//!
//! # Responsibilities
//! - Build JSON responses with the right content type
//! - Attach CORS headers on every path
//! - Map panics caught at the service boundary to the internal-error body
//! - Give middleware rejections (408, 413) a JSON body
//!
//! # Design Decisions
//! - Relayed JSON is sent as the upstream bytes, not re-serialized
//! - Streaming responses are built in the relay; they never pass through here

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Response, StatusCode};
use serde_json::{json, Value};
use std::any::Any;

use crate::config::ApiKey;
use crate::http::cors::apply_cors;

/// JSON response from a value.
pub fn json_response(status: StatusCode, value: &Value) -> Response<Body> {
    json_bytes_response(status, Bytes::from(value.to_string()))
}

/// JSON response from bytes already known to be JSON.
pub fn json_bytes_response(status: StatusCode, body: Bytes) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_cors(response.headers_mut());
    response
}

/// `CatchPanicLayer` handler: same body as any internal error, with the
/// credential scrubbed from the panic message.
pub fn panic_handler(
    key: Option<ApiKey>,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response<Body> + Clone + Send + Sync + 'static {
    move |panic| panic_response(panic, key.as_ref())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, key: Option<&ApiKey>) -> Response<Body> {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    let details = match key {
        Some(key) => key.redact(&details),
        None => details,
    };
    tracing::error!(details = %details, outcome = "internal", "Relay handler panicked");
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "error": "Internal Server Error", "details": details }),
    )
}

/// Replace the plain bodies of middleware rejections with JSON.
pub async fn json_rejections(response: Response<Body>) -> Response<Body> {
    let error = match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => "Payload too large",
        StatusCode::REQUEST_TIMEOUT => "Request timeout",
        _ => return response,
    };
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }
    json_response(response.status(), &json!({ "error": error }))
}
