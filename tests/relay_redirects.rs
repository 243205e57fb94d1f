//! Redirect following and history recording.

mod common;

use serde_json::json;

use common::{find_header, relay, start_relay, start_relay_with, start_target, target_json};

#[tokio::test]
async fn follows_a_redirect_and_records_history() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (status, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.url("/redirect/1")}),
    )
    .await;

    assert_eq!(status, 200);
    let history = result["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], 302);
    assert_eq!(history[0]["statusText"], "302 Found");
    assert_eq!(history[0]["url"], target.url("/redirect/1"));
    assert_eq!(find_header(&history[0]["headers"], "Location"), Some("../get"));

    let response = &result["response"];
    assert_eq!(response["status"], 200);
    assert_eq!(response["url"], target.url("/get"));
    assert_eq!(
        find_header(&response["request"]["headers"], "Referer"),
        Some(target.url("/redirect/1").as_str())
    );
}

#[tokio::test]
async fn see_other_turns_post_into_get() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (_, result) = relay(
        &relay_server,
        json!({
            "method": "POST",
            "url": target.url("/redirect-to?url=/get&status_code=303"),
            "headers": [["Content-Type", "text/plain"]],
            "body": "payload",
        }),
    )
    .await;

    let history = result["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    // The original body is reported on the earliest request only.
    assert_eq!(history[0]["request"]["method"], "POST");
    assert_eq!(history[0]["request"]["body"], "payload");

    let response = &result["response"];
    assert_eq!(response["request"]["method"], "GET");
    assert_eq!(response["request"]["body"], "");
    assert_eq!(find_header(&response["request"]["headers"], "Content-Type"), None);
}

#[tokio::test]
async fn temporary_redirect_replays_the_body() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (_, result) = relay(
        &relay_server,
        json!({
            "method": "POST",
            "url": target.url("/redirect-to?url=/post&status_code=307"),
            "headers": [["Content-Type", "text/plain"]],
            "body": "payload",
        }),
    )
    .await;

    let response = &result["response"];
    assert_eq!(response["status"], 200);
    assert_eq!(response["request"]["method"], "POST");
    assert_eq!(response["url"], target.url("/post"));

    let echoed = target_json(response);
    assert_eq!(echoed["data"], "payload");
}

#[tokio::test]
async fn stops_after_the_redirect_limit() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (status, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.url("/redirect/12")}),
    )
    .await;

    assert_eq!(status, 200);
    assert!(result.get("error").is_none());
    assert_eq!(result["history"].as_array().unwrap().len(), 9);

    // The tenth redirect is returned as the final response.
    let response = &result["response"];
    assert_eq!(response["status"], 302);
    assert_eq!(response["url"], target.url("/redirect/3"));
}

#[tokio::test]
async fn redirect_limit_is_configurable() {
    let target = start_target().await;
    let relay_server = start_relay_with(|config| {
        config.relay.disallowed.clear();
        config.relay.max_redirects = 2;
    })
    .await;

    let (_, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.url("/redirect/5")}),
    )
    .await;

    assert_eq!(result["history"].as_array().unwrap().len(), 2);
    assert_eq!(result["response"]["url"], target.url("/redirect/3"));
}

#[tokio::test]
async fn authorization_is_dropped_when_leaving_the_host() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    // 127.0.0.1 and localhost are different hosts to the redirect policy.
    let next = target.localhost_url("/headers");
    let (_, result) = relay(
        &relay_server,
        json!({
            "method": "GET",
            "url": target.url(&format!("/redirect-to?url={}", next)),
            "headers": [["Authorization", "Bearer secret"], ["X-Keep", "yes"]],
        }),
    )
    .await;

    let history = result["history"].as_array().unwrap();
    assert_eq!(
        find_header(&history[0]["request"]["headers"], "Authorization"),
        Some("Bearer secret")
    );

    let response = &result["response"];
    assert_eq!(response["url"], next);
    assert_eq!(find_header(&response["request"]["headers"], "Authorization"), None);
    assert_eq!(find_header(&response["request"]["headers"], "X-Keep"), Some("yes"));

    let echoed = target_json(response);
    assert!(echoed["headers"].get("authorization").is_none());
}
