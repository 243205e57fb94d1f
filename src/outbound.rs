//! Outbound HTTP capability for collaborators that need to call other
//! services (token exchanges, remote stores) under the same address rules as
//! the relay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, Request};
use rustls::ClientConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::RelayConfig;
use crate::relay::client::RelayClient;
use crate::security::address_guard::AddressGuard;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request failed: {0}")]
    Transport(#[source] hyper_util::client::legacy::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("reading response body: {0}")]
    Body(#[source] axum::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decoding response body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A call to make.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Sent with `Content-Type: application/json` when present.
    pub json: Option<Value>,
}

impl OutboundRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            json: None,
        }
    }

    pub fn post_json(url: impl Into<String>, json: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            json: Some(json),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful (200 or 201) response.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, OutboundError> {
        serde_json::from_slice(&self.body).map_err(OutboundError::Decode)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn perform(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError>;
}

/// [`HttpClient`] whose connections go through the address guard.
#[derive(Clone)]
pub struct GuardedHttpClient {
    client: RelayClient,
    timeout: Duration,
    max_body_bytes: usize,
}

impl GuardedHttpClient {
    pub fn new(config: &RelayConfig, guard: Arc<AddressGuard>, tls: &ClientConfig) -> Self {
        Self {
            client: RelayClient::new(guard, tls, config.dial_settings()),
            timeout: config.client_timeout(),
            max_body_bytes: config.max_response_bytes,
        }
    }

    fn build(&self, request: OutboundRequest) -> Result<Request<Body>, OutboundError> {
        let mut headers = HeaderMap::with_capacity(request.headers.len() + 1);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| OutboundError::InvalidRequest(format!("header name {:?}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| OutboundError::InvalidRequest(format!("value of header {:?}", name)))?;
            headers.append(name, value);
        }

        let body = match request.json {
            Some(json) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                let bytes = serde_json::to_vec(&json)
                    .map_err(|e| OutboundError::InvalidRequest(e.to_string()))?;
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        let mut built = Request::builder()
            .method(request.method)
            .uri(request.url.as_str())
            .body(body)
            .map_err(|e| OutboundError::InvalidRequest(e.to_string()))?;
        *built.headers_mut() = headers;
        Ok(built)
    }
}

#[async_trait]
impl HttpClient for GuardedHttpClient {
    async fn perform(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError> {
        let url = request.url.clone();
        let built = self.build(request)?;

        let exchange = async {
            let response = self
                .client
                .request(built)
                .await
                .map_err(OutboundError::Transport)?;
            let status = response.status().as_u16();
            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
                .await
                .map_err(OutboundError::Body)?;
            Ok::<_, OutboundError>((status, parts.headers, body))
        };

        let (status, headers, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| OutboundError::Timeout(self.timeout))??;

        if status != 200 && status != 201 {
            tracing::warn!(url = %url, status, "Outbound call returned an unexpected status");
            return Err(OutboundError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(OutboundResponse {
            status,
            headers,
            body,
        })
    }
}
