//! Cookie state round-trips through relayed calls.

mod common;

use serde_json::{json, Value};

use common::{relay, start_relay, start_target, target_json};

#[tokio::test]
async fn set_cookie_is_returned_in_cookie_state() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (status, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.localhost_url("/cookies/set?name=Sherlock")}),
    )
    .await;

    assert_eq!(status, 200);
    // The jar sends the fresh cookie on the redirect to /cookies.
    let echoed = target_json(&result["response"]);
    assert_eq!(echoed["cookies"]["name"], "Sherlock");

    let cookie = &result["cookies"][target.localhost_key()]["/"]["name"];
    assert_eq!(cookie["value"], "Sherlock");
    assert_eq!(cookie["expires"], Value::Null);
    assert_eq!(cookie["secure"], false);
}

#[tokio::test]
async fn seeded_cookies_are_sent_and_kept() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (_, result) = relay(
        &relay_server,
        json!({
            "method": "GET",
            "url": target.localhost_url("/cookies/set?brother=Mycroft"),
            "cookies": {
                target.localhost_key(): {"/": {"name": {"value": "Sherlock"}}},
            },
        }),
    )
    .await;

    let echoed = target_json(&result["response"]);
    assert_eq!(echoed["cookies"]["name"], "Sherlock");
    assert_eq!(echoed["cookies"]["brother"], "Mycroft");

    let cookies = &result["cookies"][target.localhost_key()]["/"];
    assert_eq!(cookies["name"]["value"], "Sherlock");
    assert_eq!(cookies["brother"]["value"], "Mycroft");
}

#[tokio::test]
async fn deleted_cookie_leaves_no_state() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (status, result) = relay(
        &relay_server,
        json!({
            "method": "GET",
            "url": target.localhost_url("/cookies/delete?name"),
            "cookies": {
                target.localhost_key(): {"/": {"name": {"value": "Sherlock"}}},
            },
        }),
    )
    .await;

    assert_eq!(status, 200);
    let echoed = target_json(&result["response"]);
    assert_eq!(echoed["cookies"], json!({}));
    assert_eq!(result["cookies"], Value::Null);
}

#[tokio::test]
async fn no_cookies_serialize_as_null() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (_, result) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.url("/get")}),
    )
    .await;

    assert_eq!(result["cookies"], Value::Null);
}

#[tokio::test]
async fn null_cookie_state_is_accepted_back() {
    let target = start_target().await;
    let relay_server = start_relay(&[]).await;

    let (status, first) = relay(
        &relay_server,
        json!({"method": "GET", "url": target.url("/get")}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(first["cookies"], Value::Null);

    // Send the returned state straight back, as a browser session does.
    let (status, second) = relay(
        &relay_server,
        json!({
            "url": target.localhost_url("/cookies/set?name=Sherlock"),
            "method": "GET",
            "headers": [],
            "timeout": 300,
            "cookies": first["cookies"],
            "bodyType": "raw",
            "body": "",
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert!(second.get("error").is_none());
    assert_eq!(
        second["cookies"][target.localhost_key()]["/"]["name"]["value"],
        "Sherlock"
    );
}
