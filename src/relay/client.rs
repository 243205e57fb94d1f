//! Transport for relayed calls: guarded dialer, TLS, HTTP/1.1 and HTTP/2.

use std::sync::Arc;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;
use url::Url;

use crate::net::dialer::{DialSettings, SecureDialer};
use crate::relay::redirect::HopRequest;
use crate::security::address_guard::AddressGuard;

pub type GuardedConnector = HttpsConnector<SecureDialer>;

/// HTTP client whose every connection passes the [`AddressGuard`].
///
/// Never follows redirects and never stores cookies on its own.
#[derive(Clone)]
pub struct RelayClient {
    inner: Client<GuardedConnector, Body>,
}

impl RelayClient {
    pub fn new(guard: Arc<AddressGuard>, tls: &ClientConfig, settings: DialSettings) -> Self {
        let dialer = SecureDialer::new(guard, settings);
        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls.clone())
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(dialer);

        Self {
            inner: Client::builder(TokioExecutor::new()).build(connector),
        }
    }

    /// Send `hop` with exactly `headers`.
    pub async fn send(
        &self,
        hop: &HopRequest,
        uri: Uri,
        headers: HeaderMap,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        let mut request = Request::new(Body::from(hop.body.clone()));
        *request.method_mut() = hop.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;

        self.inner.request(request).await
    }

    /// Issue an arbitrary request.
    pub async fn request(
        &self,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        self.inner.request(request).await
    }
}

/// `url` as a request target the transport accepts.
pub fn to_uri(url: &Url) -> Result<Uri, hyper::http::uri::InvalidUri> {
    url.as_str().parse::<Uri>()
}
