//! Address guarding and client timeouts.

mod common;

use serde_json::{json, Value};

use common::{relay, start_relay, start_relay_with, start_target};

#[tokio::test]
async fn default_deny_list_blocks_loopback() {
    let target = start_target().await;
    let relay_server = start_relay_with(|_| {}).await;

    let (status, result) = relay(
        &relay_server,
        json!({"id": "ssrf", "method": "GET", "url": target.url("/get")}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(result["id"], "ssrf");
    assert_eq!(result["response"], Value::Null);
    let message = result["error"]["message"].as_str().unwrap();
    assert!(message.contains("not allowed"), "unexpected message: {}", message);
    assert_eq!(target.hits(), 0);
}

#[tokio::test]
async fn denied_name_is_blocked_before_resolution() {
    let target = start_target().await;
    let relay_server = start_relay(&["localhost"]).await;

    let (_, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.localhost_url("/get")}),
    )
    .await;

    let message = result["error"]["message"].as_str().unwrap();
    assert!(
        message.contains("this host is not allowed: localhost"),
        "unexpected message: {}",
        message
    );
    assert_eq!(target.hits(), 0);
}

#[tokio::test]
async fn resolved_address_is_checked_after_connecting() {
    let target = start_target().await;
    let relay_server = start_relay(&["127.0.0.0/8", "::1/128"]).await;

    let (_, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.localhost_url("/get")}),
    )
    .await;

    let message = result["error"]["message"].as_str().unwrap();
    assert!(
        message.contains("this resolved host is not allowed"),
        "unexpected message: {}",
        message
    );
    assert_eq!(target.hits(), 0);
}

#[tokio::test]
async fn redirect_to_a_denied_host_is_not_followed() {
    let target = start_target().await;
    let relay_server = start_relay(&["localhost"]).await;

    let next = target.localhost_url("/get");
    let (status, result) = relay(
        &relay_server,
        json!({
            "method": "GET",
            "url": target.url(&format!("/redirect-to?url={}", next)),
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(result["response"], Value::Null);
    let message = result["error"]["message"].as_str().unwrap();
    assert!(
        message.starts_with(&format!("GET \"{}\": ", next)),
        "unexpected message: {}",
        message
    );
    assert!(message.ends_with("this host is not allowed: localhost"));
    // Only the redirecting endpoint was reached.
    assert_eq!(target.hits(), 1);
}

#[tokio::test]
async fn slow_target_hits_the_client_timeout() {
    let target = start_target().await;
    let relay_server = start_relay_with(|config| {
        config.relay.disallowed.clear();
        config.relay.client_timeout_secs = 1;
    })
    .await;

    let (status, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.url("/delay/3")}),
    )
    .await;

    assert_eq!(status, 200);
    let message = result["error"]["message"].as_str().unwrap();
    assert!(
        message.contains("client timeout exceeded"),
        "unexpected message: {}",
        message
    );
}
