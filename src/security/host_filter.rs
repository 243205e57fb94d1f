//! Inbound request screening.
//!
//! Rejects requests addressed to a host the service is not configured to
//! answer for, and non-GET requests that do not carry a JSON payload.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// State for [`host_filter_middleware`].
#[derive(Debug, Clone)]
pub struct HostFilter {
    allowed_hosts: Arc<HashSet<String>>,
    require_json: bool,
}

impl HostFilter {
    pub fn new<I, S>(allowed_hosts: I, require_json: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_hosts: Arc::new(allowed_hosts.into_iter().map(Into::into).collect()),
            require_json,
        }
    }

    /// Whether `host` (port already stripped) is served.
    pub fn allows(&self, host: &str) -> bool {
        self.allowed_hosts.contains(host)
    }
}

/// Host from `X-Forwarded-Host`, falling back to `Host`, without its port.
fn request_host(req: &Request<Body>) -> String {
    let raw = req
        .headers()
        .get("x-forwarded-host")
        .or_else(|| req.headers().get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().host().map(str::to_string))
        .unwrap_or_default();

    raw.split(':').next().unwrap_or_default().to_string()
}

/// Media type of the request, parameters dropped.
fn media_type(req: &Request<Body>) -> &str {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or("")
}

pub async fn host_filter_middleware(
    State(filter): State<HostFilter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let host = request_host(&request);
    if !filter.allows(&host) {
        tracing::warn!(host = %host, "Host not allowed");
        return (StatusCode::BAD_REQUEST, "Host not allowed.").into_response();
    }

    if filter.require_json
        && request.method() != Method::GET
        && !media_type(&request).eq_ignore_ascii_case("application/json")
    {
        tracing::debug!(method = %request.method(), "Rejecting non-JSON payload");
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    }

    next.run(request).await
}
