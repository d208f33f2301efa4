use actix_web::http::StatusCode;
use awc::Client;
use care_relay_service::config::Config;
use care_relay_service::middleware::Role;
use serde_json::json;

use super::support::{next_json, start_server, start_server_with};

#[actix_rt::test]
async fn push_to_user_is_accepted_and_delivered() {
    let server = start_server().await.expect("start server");
    let mut conn = server.connect("u1", Role::Patient).await;

    let resp = Client::new()
        .post(server.url("/internal/v1/relay/users/u1"))
        .send_json(&json!({"type": "conversation:updated", "data": {"conversation_id": "c1"}}))
        .await
        .expect("push request");
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let frame = next_json(&mut conn).await.expect("pushed frame");
    assert_eq!(frame["type"], "conversation:updated");
    assert_eq!(frame["data"]["conversation_id"], "c1");
    assert!(frame.get("timestamp").is_none());

    server.stop().await;
}

#[actix_rt::test]
async fn push_requires_api_key_when_configured() {
    let mut config = Config::test_defaults();
    config.internal_api_key = Some("relay-key".into());
    let server = start_server_with(config).await.expect("start server");
    let mut conn = server.connect("d1", Role::Doctor).await;

    let resp = Client::new()
        .post(server.url("/internal/v1/relay/roles/doctor"))
        .send_json(&json!({"type": "report:uploaded"}))
        .await
        .expect("push request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(next_json(&mut conn).await.is_none());

    let resp = Client::new()
        .post(server.url("/internal/v1/relay/roles/doctor"))
        .insert_header(("X-Internal-Api-Key", "relay-key"))
        .send_json(&json!({"type": "report:uploaded", "stamp": true}))
        .await
        .expect("push request");
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let frame = next_json(&mut conn).await.expect("pushed frame");
    assert_eq!(frame["type"], "report:uploaded");
    assert!(frame["timestamp"].is_string());

    server.stop().await;
}

#[actix_rt::test]
async fn health_and_metrics_are_served() {
    let server = start_server().await.expect("start server");

    let mut resp = Client::new()
        .get(server.url("/health"))
        .send()
        .await
        .expect("health request");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.body().await.expect("health body");
    assert_eq!(&body[..], b"OK");

    let resp = Client::new()
        .get(server.url("/metrics"))
        .send()
        .await
        .expect("metrics request");
    assert_eq!(resp.status(), StatusCode::OK);

    server.stop().await;
}
