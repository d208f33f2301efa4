use care_relay_service::middleware::Role;
use care_relay_service::websocket::OutboundMessage;
use serde_json::json;

use super::support::{next_json, start_server};

#[actix_rt::test]
async fn unicast_reaches_every_tab_of_target_user_only() {
    let server = start_server().await.expect("start server");
    let mut tab_a = server.connect("u1", Role::Patient).await;
    let mut tab_b = server.connect("u1", Role::Patient).await;
    let mut other = server.connect("u2", Role::Patient).await;

    let msg = OutboundMessage::new("message:new", json!({"conversation_id": "c1", "text": "hi"}));
    assert_eq!(server.state.registry.send_to_user("u1", &msg), 2);

    for conn in [&mut tab_a, &mut tab_b] {
        let frame = next_json(conn).await.expect("message frame");
        assert_eq!(frame["type"], "message:new");
        assert_eq!(frame["data"]["text"], "hi");
    }
    assert!(next_json(&mut other).await.is_none());

    server.stop().await;
}

#[actix_rt::test]
async fn role_broadcast_reaches_only_that_role() {
    let server = start_server().await.expect("start server");
    let mut doctor = server.connect("d1", Role::Doctor).await;
    let mut patient = server.connect("p1", Role::Patient).await;
    let mut admin = server.connect("a1", Role::Admin).await;

    let msg = OutboundMessage::new("report:uploaded", json!({"report_id": "r1"}));
    assert_eq!(server.state.registry.broadcast_to_role(Role::Doctor, &msg), 1);

    let frame = next_json(&mut doctor).await.expect("doctor frame");
    assert_eq!(frame["type"], "report:uploaded");
    assert!(next_json(&mut patient).await.is_none());
    assert!(next_json(&mut admin).await.is_none());

    server.stop().await;
}

#[actix_rt::test]
async fn unicast_to_offline_user_is_silent() {
    let server = start_server().await.expect("start server");
    let mut present = server.connect("u1", Role::Patient).await;

    let msg = OutboundMessage::new("message:new", json!({}));
    assert_eq!(server.state.registry.send_to_user("ghost", &msg), 0);
    assert!(!server.state.registry.contains_user("ghost"));
    assert!(next_json(&mut present).await.is_none());

    server.stop().await;
}
