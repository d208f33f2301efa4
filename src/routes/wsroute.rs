use crate::error::AppError;
use crate::metrics::{self, outcome};
use crate::state::AppState;
use crate::websocket::{handlers, Connection, ConnectionRegistry, OutboundMessage};
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// First `token` query parameter, if non-empty.
///
/// Repeated parameters are allowed; an undecodable query counts as no token.
pub fn token_from_query(query: &str) -> Option<String> {
    let pairs = web::Query::<Vec<(String, String)>>::from_query(query).ok()?;
    pairs
        .into_inner()
        .into_iter()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value)
        .filter(|token| !token.trim().is_empty())
}

// WebSocket Actor
struct RelaySession {
    connection: Connection,
    outbound: Option<UnboundedReceiver<String>>,
    registry: ConnectionRegistry,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    hb: Instant,
}

impl RelaySession {
    fn new(
        connection: Connection,
        outbound: UnboundedReceiver<String>,
        registry: ConnectionRegistry,
        heartbeat_interval: Duration,
        client_timeout: Duration,
    ) -> Self {
        Self {
            connection,
            outbound: Some(outbound),
            registry,
            heartbeat_interval,
            client_timeout,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.client_timeout {
                tracing::warn!(
                    user_id = %act.connection.user_id(),
                    connection_id = %act.connection.id(),
                    "relay heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for RelaySession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if let Err(e) = self.registry.register(self.connection.clone()) {
            // Lost a race against another tab of the same user for the last slot
            tracing::warn!(error = %e, "relay connection refused after upgrade");
            ctx.close(Some(ws::CloseReason {
                code: ws::CloseCode::Policy,
                description: Some(e.to_string()),
            }));
            ctx.stop();
            return;
        }
        self.connection.mark_open();

        tracing::info!(
            user_id = %self.connection.user_id(),
            role = %self.connection.role(),
            connection_id = %self.connection.id(),
            "relay session started"
        );

        // Confirmation goes out before anything queued by fan-out
        match OutboundMessage::connection(self.connection.user_id(), self.connection.role())
            .to_frame()
        {
            Ok(frame) => ctx.text(frame),
            Err(e) => tracing::warn!(error = %e, "failed to serialize connection confirmation"),
        }

        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }

        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.connection.mark_closed();
        self.registry
            .unregister(self.connection.user_id(), self.connection.id());

        tracing::info!(
            user_id = %self.connection.user_id(),
            connection_id = %self.connection.id(),
            "relay session stopped"
        );
    }
}

// Frames queued by fan-out
impl StreamHandler<String> for RelaySession {
    fn handle(&mut self, frame: String, ctx: &mut Self::Context) {
        ctx.text(frame);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        // Queue closes only once the registry let go of the connection
        tracing::debug!(connection_id = %self.connection.id(), "outbound queue closed");
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                handlers::handle_text_frame(&self.registry, &self.connection, &text);
            }
            Ok(ws::Message::Binary(_)) => {
                self.hb = Instant::now();
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                tracing::warn!("Fragmented WebSocket messages not supported");
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(
                    user_id = %self.connection.user_id(),
                    connection_id = %self.connection.id(),
                    error = %e,
                    "relay transport error"
                );
                ctx.stop();
            }
        }
    }
}

/// Refuse the upgrade and close the transport once the response is written
fn reject(err: AppError) -> HttpResponse {
    HttpResponse::build(actix_web::ResponseError::status_code(&err))
        .force_close()
        .json(json!({
            "error": err.code(),
            "message": err.to_string(),
        }))
}

// HTTP handler
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let Some(token) = token_from_query(req.query_string()) else {
        tracing::warn!("relay connection rejected: no token provided");
        metrics::record_upgrade(outcome::MISSING_TOKEN);
        return Ok(reject(AppError::Unauthorized));
    };

    let identity = match state.verifier.verify(&token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("relay connection rejected: invalid token");
            metrics::record_upgrade(outcome::INVALID_TOKEN);
            return Ok(reject(e));
        }
    };

    if let Err(e) = state.registry.ensure_capacity(&identity.user_id) {
        tracing::warn!(user_id = %identity.user_id, "relay connection rejected: {}", e);
        metrics::record_upgrade(outcome::LIMIT_EXCEEDED);
        return Ok(reject(e));
    }

    tracing::debug!(
        user_id = %identity.user_id,
        role = %identity.role,
        approved = identity.is_approved,
        "relay authentication successful"
    );

    let (connection, outbound) = Connection::new(identity.user_id, identity.role);
    let session = RelaySession::new(
        connection,
        outbound,
        state.registry.clone(),
        state.config.ws.heartbeat_interval,
        state.config.ws.client_timeout,
    );

    let resp = ws::start(session, &req, stream)?;
    metrics::record_upgrade(outcome::ACCEPTED);
    Ok(resp)
}
