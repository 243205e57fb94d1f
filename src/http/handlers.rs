//! Request handlers for the relay endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::relay::Relay;

/// Where `GET /proxy` sends people looking for documentation.
pub const PROXY_DOCS_LOCATION: &str = "./docs/guides/proxy/";

/// `POST` runs a relay job; `GET` redirects to the guide; anything else is refused.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Response {
    if method == Method::GET {
        return (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, PROXY_DOCS_LOCATION)],
        )
            .into_response();
    }

    if method != Method::POST {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid-method-for-proxy",
            "Invalid method for proxy",
        );
    }

    // Snapshot the deny-list so a reload cannot change it mid-relay.
    let relay = Relay::new(
        state.relay.clone(),
        state.guard.load_full(),
        state.tls.clone(),
    );

    match relay.handle(&body).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => e.into_response(),
    }
}
