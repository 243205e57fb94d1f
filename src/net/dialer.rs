//! Guarded connection establishment for relayed calls.
//!
//! # Responsibilities
//! - Refuse destinations whose literal host is disallowed, before any I/O
//! - Connect through hyper-util's `HttpConnector` (DNS, connect timeout, keep-alive)
//! - Re-check the concrete peer address after connecting (DNS rebinding)
//!
//! # Design Decisions
//! - Implemented as a `tower::Service<Uri>` so TLS (hyper-rustls) wraps it and
//!   the checks always run on the raw TCP peer
//! - A rejected stream is dropped, which closes the socket
//! - There is a window between the peer check and first use of the stream;
//!   this is accepted

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;
use tower::{Service, ServiceExt};

use crate::observability::metrics;
use crate::security::address_guard::{bracketed, AddressGuard};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to establish a guarded connection.
#[derive(Debug, Error)]
pub enum DialError {
    /// The destination uses a scheme that is not carried over TCP here.
    #[error("unsupported network for scheme {0:?}")]
    UnsupportedScheme(String),

    /// The destination URI has no host component.
    #[error("missing host in destination")]
    MissingHost,

    /// The literal host was rejected before any network I/O.
    #[error("this host is not allowed: {0}")]
    AddressNotAllowed(String),

    /// The connection succeeded but the peer address is disallowed.
    #[error("this resolved host is not allowed: {0}")]
    ResolvedAddressNotAllowed(String),

    /// Ordinary DNS/connect failure.
    #[error("dial tcp")]
    Connect(#[source] BoxError),

    /// Socket inspection failed after connect.
    #[error("inspecting connection: {0}")]
    Io(#[from] std::io::Error),
}

impl DialError {
    /// Whether this failure came from the address guard.
    pub fn is_address_rejection(&self) -> bool {
        matches!(
            self,
            DialError::AddressNotAllowed(_) | DialError::ResolvedAddressNotAllowed(_)
        )
    }
}

/// Timing knobs for [`SecureDialer`].
#[derive(Debug, Clone, Copy)]
pub struct DialSettings {
    pub connect_timeout: Duration,
    pub keepalive: Duration,
}

impl Default for DialSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            keepalive: Duration::from_secs(30),
        }
    }
}

/// Connector that consults an [`AddressGuard`] before and after connecting.
#[derive(Clone)]
pub struct SecureDialer {
    inner: HttpConnector,
    guard: Arc<AddressGuard>,
}

impl SecureDialer {
    pub fn new(guard: Arc<AddressGuard>, settings: DialSettings) -> Self {
        let mut inner = HttpConnector::new();
        // TLS is layered above us, so https destinations pass through here too.
        inner.enforce_http(false);
        inner.set_connect_timeout(Some(settings.connect_timeout));
        inner.set_keepalive(Some(settings.keepalive));
        inner.set_nodelay(true);
        Self { inner, guard }
    }

    /// The guard this dialer enforces.
    pub fn guard(&self) -> &AddressGuard {
        &self.guard
    }
}

impl Service<Uri> for SecureDialer {
    type Response = TokioIo<TcpStream>;
    type Error = DialError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let inner = self.inner.clone();
        let guard = Arc::clone(&self.guard);
        Box::pin(dial(inner, guard, dst))
    }
}

async fn dial(
    inner: HttpConnector,
    guard: Arc<AddressGuard>,
    dst: Uri,
) -> Result<TokioIo<TcpStream>, DialError> {
    match dst.scheme_str() {
        Some("http") | Some("https") => {}
        other => return Err(DialError::UnsupportedScheme(other.unwrap_or_default().to_string())),
    }

    // `Uri::host` keeps IPv6 literals bracketed, matching the deny-set form.
    let host = dst.host().ok_or(DialError::MissingHost)?.to_string();
    if !guard.is_allowed(&host) {
        tracing::warn!(host = %host, "Refusing to dial disallowed host");
        metrics::record_address_rejection("pre_dial");
        return Err(DialError::AddressNotAllowed(host));
    }

    let stream = inner
        .oneshot(dst)
        .await
        .map_err(|e| DialError::Connect(e.into()))?;

    let peer = bracketed(stream.inner().peer_addr()?.ip());
    if !guard.is_allowed(&peer) {
        tracing::warn!(host = %host, peer = %peer, "Resolved address is not allowed, closing");
        metrics::record_address_rejection("post_dial");
        drop(stream);
        return Err(DialError::ResolvedAddressNotAllowed(peer));
    }

    tracing::trace!(host = %host, peer = %peer, "Connection established");
    Ok(stream)
}
