//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay handler
//! - Wire up middleware (host filter, body limit, timeout, request ID, tracing)
//! - Serve over plain TCP or TLS until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{middleware, routing::any, Router};
use axum_server::tls_rustls::RustlsConfig;
use rustls::ClientConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{RelayConfig, RelayServiceConfig};
use crate::http::handlers::proxy_handler;
use crate::net::tls::client_tls_config;
use crate::security::address_guard::AddressGuard;
use crate::security::host_filter::{host_filter_middleware, HostFilter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayConfig,
    pub guard: Arc<ArcSwap<AddressGuard>>,
    pub tls: Arc<ClientConfig>,
}

/// HTTP server for the request relay.
pub struct HttpServer {
    router: Router,
    config: RelayServiceConfig,
    guard: Arc<ArcSwap<AddressGuard>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayServiceConfig) -> Result<Self, rustls::Error> {
        let guard = Arc::new(ArcSwap::from_pointee(AddressGuard::from_entries(
            &config.relay.disallowed,
        )));
        Self::with_guard(config, guard)
    }

    /// Create a server sharing an existing deny-list handle (e.g. one a
    /// config watcher reloads).
    pub fn with_guard(
        config: RelayServiceConfig,
        guard: Arc<ArcSwap<AddressGuard>>,
    ) -> Result<Self, rustls::Error> {
        let state = AppState {
            relay: config.relay.clone(),
            guard: Arc::clone(&guard),
            tls: client_tls_config()?,
        };

        tracing::info!(
            denied_hosts = guard.load().denied_host_count(),
            denied_networks = guard.load().denied_network_count(),
            allowed_hosts = ?config.security.allowed_hosts,
            "Relay configured"
        );

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            guard,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayServiceConfig, state: AppState) -> Router {
        let host_filter = HostFilter::new(
            config.security.allowed_hosts.iter().cloned(),
            config.security.require_json,
        );

        Router::new()
            .route("/proxy", any(proxy_handler))
            .route("/proxy/", any(proxy_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(host_filter, host_filter_middleware))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            signal_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayServiceConfig {
        &self.config
    }

    /// The live deny-list handle.
    pub fn guard(&self) -> Arc<ArcSwap<AddressGuard>> {
        Arc::clone(&self.guard)
    }
}
