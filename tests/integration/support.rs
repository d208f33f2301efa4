#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use awc::error::WsProtocolError;
use awc::{ws, Client};
use care_relay_service::config::Config;
use care_relay_service::middleware::{Identity, Role};
use care_relay_service::routes;
use care_relay_service::state::AppState;
use futures_util::{Sink, Stream, StreamExt};
use serde_json::Value;

/// Client side of a relay connection
pub trait WsConnection:
    Stream<Item = Result<ws::Frame, WsProtocolError>>
    + Sink<ws::Message, Error = WsProtocolError>
    + Unpin
{
}

impl<T> WsConnection for T where
    T: Stream<Item = Result<ws::Frame, WsProtocolError>>
        + Sink<ws::Message, Error = WsProtocolError>
        + Unpin
{
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub state: AppState,
}

impl TestServer {
    pub fn ws_url(&self, token: &str) -> String {
        format!("http://{}/ws?token={}", self.addr, token)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token(&self, user_id: &str, role: Role) -> String {
        let identity = Identity {
            user_id: user_id.to_string(),
            role,
            is_approved: true,
        };
        self.state
            .verifier
            .issue(&identity, chrono::Duration::minutes(5))
            .expect("issue token")
    }

    /// Connect and consume the `connection` confirmation
    pub async fn connect(&self, user_id: &str, role: Role) -> impl WsConnection {
        let (_resp, mut conn) = Client::new()
            .ws(self.ws_url(&self.token(user_id, role)))
            .connect()
            .await
            .expect("connect websocket client");

        let confirmation = next_json(&mut conn).await.expect("confirmation frame");
        assert_eq!(confirmation["type"], "connection");
        conn
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

pub async fn start_server() -> std::io::Result<TestServer> {
    start_server_with(Config::test_defaults()).await
}

pub async fn start_server_with(mut config: Config) -> std::io::Result<TestServer> {
    // Keep heartbeats out of the way of test assertions
    config.ws.heartbeat_interval = Duration::from_secs(60);
    config.ws.client_timeout = Duration::from_secs(120);
    serve(config).await
}

/// Start a server exactly as configured, heartbeat timing included
pub async fn serve(config: Config) -> std::io::Result<TestServer> {
    let state = AppState::new(config);
    let app_state = state.clone();
    let ws_path = state.config.ws.path.clone();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = HttpServer::new(move || {
        let ws_path = ws_path.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(move |cfg| routes::configure(cfg, &ws_path))
    })
    .workers(1)
    .listen(listener)?
    .run();

    let handle = server.handle();
    actix_rt::spawn(server);
    Ok(TestServer {
        addr,
        handle,
        state,
    })
}

/// Next text frame as JSON, or `None` if nothing arrives within a second
pub async fn next_json(conn: &mut impl WsConnection) -> Option<Value> {
    next_json_within(conn, Duration::from_secs(1)).await
}

pub async fn next_json_within(conn: &mut impl WsConnection, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let frame = tokio::time::timeout_at(deadline, conn.next()).await.ok()??;
        match frame.ok()? {
            ws::Frame::Text(bytes) => return serde_json::from_slice(&bytes).ok(),
            // Control frames are not part of the relay protocol
            ws::Frame::Ping(_) | ws::Frame::Pong(_) => continue,
            _ => return None,
        }
    }
}

/// Poll until `predicate` holds or two seconds pass
pub async fn eventually(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..40 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    predicate()
}
