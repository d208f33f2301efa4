//! Internal push API
//!
//! The REST layer calls these after its own writes (new chat message, report
//! upload, conversation change) to notify connected clients. Delivery is
//! best-effort and the response never reveals whether anyone was connected.

use crate::error::{AppError, AppResult};
use crate::middleware::{InternalCaller, Role};
use crate::state::AppState;
use crate::websocket::OutboundMessage;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

/// Event pushed by a collaborator
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    /// Stamp the frame with server time
    #[serde(default)]
    pub stamp: bool,
}

impl PushRequest {
    fn into_message(self) -> AppResult<OutboundMessage> {
        if self.kind.trim().is_empty() {
            return Err(AppError::BadRequest("type must not be empty".into()));
        }
        let message = OutboundMessage::new(self.kind, self.data);
        Ok(if self.stamp { message.stamped() } else { message })
    }
}

/// POST /internal/v1/relay/users/{user_id}
pub async fn push_to_user(
    _caller: InternalCaller,
    path: web::Path<String>,
    state: web::Data<AppState>,
    body: web::Json<PushRequest>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let message = body.into_inner().into_message()?;

    state.registry.send_to_user(&user_id, &message);
    Ok(HttpResponse::Accepted().finish())
}

/// POST /internal/v1/relay/roles/{role}
pub async fn push_to_role(
    _caller: InternalCaller,
    path: web::Path<String>,
    state: web::Data<AppState>,
    body: web::Json<PushRequest>,
) -> AppResult<HttpResponse> {
    let role: Role = path.into_inner().parse()?;
    let message = body.into_inner().into_message()?;

    state.registry.broadcast_to_role(role, &message);
    Ok(HttpResponse::Accepted().finish())
}

/// POST /internal/v1/relay/broadcast
pub async fn push_to_all(
    _caller: InternalCaller,
    state: web::Data<AppState>,
    body: web::Json<PushRequest>,
) -> AppResult<HttpResponse> {
    let message = body.into_inner().into_message()?;

    state.registry.broadcast_to_all(&message);
    Ok(HttpResponse::Accepted().finish())
}
