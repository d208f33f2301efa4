use crate::{config::Config, middleware::TokenVerifier, websocket::ConnectionRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub verifier: Arc<TokenVerifier>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the process-wide state: one registry and one verifier per server.
    pub fn new(config: Config) -> Self {
        let registry = ConnectionRegistry::with_limit(config.ws.max_connections_per_user);
        let verifier = Arc::new(TokenVerifier::new(&config.jwt_secret));
        Self {
            registry,
            verifier,
            config: Arc::new(config),
        }
    }
}
