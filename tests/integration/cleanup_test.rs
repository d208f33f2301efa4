use awc::ws;
use care_relay_service::middleware::Role;
use futures_util::SinkExt;

use super::support::{eventually, start_server};

#[actix_rt::test]
async fn clean_close_removes_connection() {
    let server = start_server().await.expect("start server");
    let mut tab_a = server.connect("u1", Role::Patient).await;
    let _tab_b = server.connect("u1", Role::Patient).await;
    assert_eq!(server.state.registry.connection_count("u1"), 2);

    tab_a
        .send(ws::Message::Close(Some(ws::CloseCode::Normal.into())))
        .await
        .expect("send close");

    let registry = server.state.registry.clone();
    assert!(eventually(|| registry.connection_count("u1") == 1).await);
    assert!(registry.contains_user("u1"));

    server.stop().await;
}

#[actix_rt::test]
async fn abrupt_drop_removes_user_entry() {
    let server = start_server().await.expect("start server");
    let conn = server.connect("u1", Role::Doctor).await;
    assert!(server.state.registry.contains_user("u1"));

    drop(conn);

    let registry = server.state.registry.clone();
    assert!(eventually(|| !registry.contains_user("u1")).await);
    assert_eq!(registry.total_connections(), 0);

    server.stop().await;
}

#[actix_rt::test]
async fn slot_frees_up_after_close() {
    let mut config = care_relay_service::config::Config::test_defaults();
    config.ws.max_connections_per_user = Some(1);
    let server = super::support::start_server_with(config)
        .await
        .expect("start server");

    let first = server.connect("u1", Role::Patient).await;
    drop(first);

    let registry = server.state.registry.clone();
    assert!(eventually(|| registry.connection_count("u1") == 0).await);

    let _second = server.connect("u1", Role::Patient).await;
    assert_eq!(registry.connection_count("u1"), 1);

    server.stop().await;
}

#[actix_rt::test]
async fn silent_client_is_dropped_after_timeout() {
    let mut config = care_relay_service::config::Config::test_defaults();
    config.ws.heartbeat_interval = std::time::Duration::from_millis(200);
    config.ws.client_timeout = std::time::Duration::from_millis(600);
    let server = super::support::serve(config).await.expect("start server");

    // Never read, so the server's pings go unanswered
    let _silent = server.connect("u1", Role::Patient).await;
    assert!(server.state.registry.contains_user("u1"));

    let registry = server.state.registry.clone();
    assert!(eventually(|| !registry.contains_user("u1")).await);
    assert_eq!(registry.total_connections(), 0);

    server.stop().await;
}
