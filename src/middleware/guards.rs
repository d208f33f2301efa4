//! Request guards for the internal push API

use std::future::{ready, Ready};

use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, Error, FromRequest, HttpRequest};

pub const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

/// A caller allowed to push events into the relay.
///
/// When `INTERNAL_API_KEY` is configured the request must carry the same value
/// in `X-Internal-Api-Key`; otherwise every caller is accepted.
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequest for InternalCaller {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            tracing::error!("AppState missing from app data");
            return ready(Err(AppError::Internal.into()));
        };

        let Some(expected) = state.config.internal_api_key.as_deref() else {
            return ready(Ok(InternalCaller));
        };

        let presented = req
            .headers()
            .get(INTERNAL_API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        if presented == Some(expected) {
            ready(Ok(InternalCaller))
        } else {
            tracing::warn!(path = %req.path(), "internal push rejected: bad api key");
            ready(Err(AppError::Unauthorized.into()))
        }
    }
}
