//! HTTP helpers for Lambda functions.

use lambda_http::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, VARY,
};
use lambda_http::http::HeaderValue;
use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::{Error, Result};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(
    status: u16,
    data: &T,
) -> std::result::Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(data)?))
        .map_err(Box::new)?)
}

/// Create an error response with the given status code and message.
pub fn error_response(
    status: u16,
    message: impl Into<String>,
) -> std::result::Result<Response<Body>, lambda_http::Error> {
    json_response(status, &ApiError::new(message))
}

/// Turn a failed operation into a response. Server-side failures are
/// logged and answered with `failure_message`; the cause never reaches the
/// caller.
pub fn failure_response(
    err: &Error,
    failure_message: &str,
) -> std::result::Result<Response<Body>, lambda_http::Error> {
    let status = err.status_code();
    let message = match err {
        Error::Validation(msg) => msg.clone(),
        Error::Auth(_) => "Authentication required".to_string(),
        Error::NotFound(_) => "Chat not found".to_string(),
        _ => {
            error!("{}: {}", failure_message, err);
            failure_message.to_string()
        }
    };
    error_response(status, message)
}

/// Parse request body as JSON.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<T> {
    if body.as_ref().is_empty() {
        return Err(Error::Validation("Missing request body".to_string()));
    }
    serde_json::from_slice(body.as_ref())
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))
}

/// Cross-origin policy for the single allowed web client.
#[derive(Debug, Clone, Default)]
pub struct Cors {
    origin: Option<HeaderValue>,
}

impl Cors {
    pub const ALLOW_METHODS: &'static str = "GET, POST, PUT, OPTIONS";
    pub const ALLOW_HEADERS: &'static str = "Authorization, Content-Type";

    /// Allow credentialed requests from `origin`. Without an origin no CORS
    /// headers are sent.
    pub fn new(origin: Option<&str>) -> Self {
        Self {
            origin: origin.and_then(|o| HeaderValue::from_str(o).ok()),
        }
    }

    /// Add the CORS headers to a response.
    pub fn apply(&self, mut response: Response<Body>) -> Response<Body> {
        if let Some(origin) = &self.origin {
            let headers = response.headers_mut();
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
        response
    }

    /// Answer an `OPTIONS` preflight.
    pub fn preflight(&self) -> std::result::Result<Response<Body>, lambda_http::Error> {
        let response = Response::builder()
            .status(204)
            .header(ACCESS_CONTROL_ALLOW_METHODS, Self::ALLOW_METHODS)
            .header(ACCESS_CONTROL_ALLOW_HEADERS, Self::ALLOW_HEADERS)
            .body(Body::Empty)
            .map_err(Box::new)?;
        Ok(self.apply(response))
    }
}

/// Strip the API Gateway `/api` stage prefix if present.
pub fn route_path(raw_path: &str) -> &str {
    match raw_path.strip_prefix("/api") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => raw_path,
    }
}
