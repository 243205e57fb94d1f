//! Shared utilities for integration tests: an httpbin-like target server and
//! a relay server, both on ephemeral ports.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Path, Query, Request},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use request_relay::{HttpServer, RelayServiceConfig, Shutdown};

/// A running target server.
pub struct Target {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl Target {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Same server addressed by name instead of IP.
    pub fn localhost_url(&self, path: &str) -> String {
        format!("http://localhost:{}{}", self.addr.port(), path)
    }

    pub fn localhost_key(&self) -> String {
        format!("localhost:{}", self.addr.port())
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a target that mimics the httpbin endpoints the relay is tested against.
pub async fn start_target() -> Target {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let app = Router::new()
        .route("/get", get(echo))
        .route("/headers", get(echo))
        .route("/post", post(post_echo))
        .route("/cookies", get(cookies))
        .route("/cookies/set", get(cookies_set))
        .route("/cookies/delete", get(cookies_delete))
        .route("/redirect/{n}", any(redirect_n))
        .route("/redirect-to", any(redirect_to))
        .route("/delay/{secs}", get(delay))
        .layer(middleware::from_fn(move |request: Request, next: Next| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                next.run(request).await
            }
        }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Target { addr, hits }
}

fn headers_json(headers: &HeaderMap) -> Value {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(value.to_str().unwrap_or_default().to_string());
    }
    json!(map)
}

async fn echo(
    uri: Uri,
    headers: HeaderMap,
    Query(args): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    Json(json!({
        "args": args,
        "headers": headers_json(&headers),
        "url": uri.to_string(),
    }))
}

async fn post_echo(headers: HeaderMap, request: Request) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();
        let mut form = Map::new();
        let mut files = Map::new();
        let mut file_types = Map::new();

        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();
            let field_type = field.content_type().map(str::to_string);
            let text = field.text().await.unwrap();
            if is_file {
                files.insert(name.clone(), json!(text));
                file_types.insert(name, json!(field_type));
            } else {
                form.insert(name, json!(text));
            }
        }

        return Json(json!({
            "form": form,
            "files": files,
            "fileTypes": file_types,
            "headers": headers_json(&headers),
        }));
    }

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .unwrap();
    Json(json!({
        "data": String::from_utf8_lossy(&bytes),
        "headers": headers_json(&headers),
    }))
}

async fn cookies(headers: HeaderMap) -> Json<Value> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(header::COOKIE) {
        for pair in value.to_str().unwrap_or_default().split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies.insert(name.to_string(), value.to_string());
            }
        }
    }
    Json(json!({ "cookies": cookies }))
}

async fn cookies_set(Query(args): Query<BTreeMap<String, String>>) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, "/cookies");
    for (name, value) in args {
        builder = builder.header(header::SET_COOKIE, format!("{}={}; Path=/", name, value));
    }
    builder.body(Body::empty()).unwrap()
}

async fn cookies_delete(Query(args): Query<BTreeMap<String, String>>) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, "/cookies");
    for name in args.keys() {
        builder = builder.header(
            header::SET_COOKIE,
            format!("{}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/", name),
        );
    }
    builder.body(Body::empty()).unwrap()
}

async fn redirect_n(Path(n): Path<u32>) -> Response {
    let location = if n > 1 {
        format!("/redirect/{}", n - 1)
    } else {
        "../get".to_string()
    };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

#[derive(Deserialize)]
struct RedirectTo {
    url: String,
    status_code: Option<u16>,
}

async fn redirect_to(Query(params): Query<RedirectTo>) -> Response {
    let status = StatusCode::from_u16(params.status_code.unwrap_or(302)).unwrap();
    (status, [(header::LOCATION, params.url)]).into_response()
}

async fn delay(Path(secs): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    Json(json!({ "delayed": secs }))
}

/// A running relay. Dropping it shuts the server down.
pub struct RelayServer {
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

impl RelayServer {
    pub fn proxy_url(&self) -> String {
        format!("http://{}/proxy", self.addr)
    }
}

/// Start a relay that refuses exactly `disallowed`.
pub async fn start_relay(disallowed: &[&str]) -> RelayServer {
    let disallowed: Vec<String> = disallowed.iter().map(|s| s.to_string()).collect();
    start_relay_with(move |config| config.relay.disallowed = disallowed).await
}

pub async fn start_relay_with<F>(configure: F) -> RelayServer
where
    F: FnOnce(&mut RelayServiceConfig),
{
    let mut config = RelayServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    configure(&mut config);

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, shutdown_rx).await.unwrap();
    });

    RelayServer {
        addr,
        _shutdown: shutdown,
    }
}

/// Post `job` to the relay and decode the JSON answer.
pub async fn relay(server: &RelayServer, job: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(server.proxy_url())
        .json(&job)
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let body: Value = response.json().await.unwrap();
    (status, body)
}

/// First value of header `name` in a `[[name, value], ...]` list.
pub fn find_header<'a>(headers: &'a Value, name: &str) -> Option<&'a str> {
    headers
        .as_array()?
        .iter()
        .find(|pair| pair[0] == name)
        .and_then(|pair| pair[1].as_str())
}

/// The JSON document the target put in a realised response body.
pub fn target_json(realised: &Value) -> Value {
    serde_json::from_str(realised["body"].as_str().unwrap()).unwrap()
}
