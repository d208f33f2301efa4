use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::metrics;
use crate::middleware::Role;

pub mod connection;
pub mod handlers;
pub mod message_types;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use message_types::{InboundMessage, OutboundKind, OutboundMessage};

/// Connection registry for relay clients
///
/// Maps user id to every connection that user currently holds (one per open
/// tab or device). A user id is present only while it has at least one
/// connection. Lock sections never await, so the registry can be used from
/// actor lifecycle hooks directly.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // user_id -> connections in registration order
    inner: Arc<RwLock<HashMap<String, Vec<Connection>>>>,
    max_per_user: Option<usize>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that refuses more than `max_per_user` connections per user.
    /// `None` keeps it unbounded.
    pub fn with_limit(max_per_user: Option<usize>) -> Self {
        Self {
            inner: Arc::default(),
            max_per_user,
        }
    }

    fn check_limit(&self, user_id: &str, current: usize) -> Result<(), AppError> {
        match self.max_per_user {
            Some(limit) if current >= limit => Err(AppError::TooManyConnections {
                user_id: user_id.to_string(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// Fails if `user_id` is already at the per-user cap
    pub fn ensure_capacity(&self, user_id: &str) -> Result<(), AppError> {
        self.check_limit(user_id, self.connection_count(user_id))
    }

    /// Add a connection under its owning user id
    pub fn register(&self, connection: Connection) -> Result<(), AppError> {
        let mut guard = self.inner.write();
        let current = guard.get(connection.user_id()).map(Vec::len).unwrap_or(0);
        self.check_limit(connection.user_id(), current)?;

        let entry = guard.entry(connection.user_id().to_string()).or_default();
        entry.push(connection.clone());
        let count = entry.len();
        drop(guard);

        metrics::connection_opened();
        tracing::debug!(
            user_id = %connection.user_id(),
            connection_id = %connection.id(),
            connections = count,
            "registered relay connection"
        );
        Ok(())
    }

    /// Remove one connection; drops the user entry once it is empty.
    ///
    /// Idempotent: returns false when the connection was already gone.
    pub fn unregister(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        let mut guard = self.inner.write();

        let Some(connections) = guard.get_mut(user_id) else {
            return false;
        };

        let before = connections.len();
        connections.retain(|c| c.id() != connection_id);
        let removed = connections.len() != before;
        let remaining = connections.len();

        if connections.is_empty() {
            guard.remove(user_id);
        }
        drop(guard);

        if removed {
            metrics::connection_closed();
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                remaining,
                "unregistered relay connection"
            );
        }
        removed
    }

    /// Snapshot of a user's connections in registration order
    pub fn lookup(&self, user_id: &str) -> Vec<Connection> {
        self.inner
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.inner.read().get(user_id).map(Vec::len).unwrap_or(0)
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.inner.read().contains_key(user_id)
    }

    pub fn total_connections(&self) -> usize {
        self.inner.read().values().map(Vec::len).sum()
    }

    pub fn connected_users_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Deliver to every open connection of `user_id`.
    ///
    /// Returns how many connections the frame was queued on; zero when the
    /// user has nothing open.
    pub fn send_to_user(&self, user_id: &str, message: &OutboundMessage) -> usize {
        let Some(frame) = Self::encode(message) else {
            return 0;
        };

        let delivered = self
            .inner
            .read()
            .get(user_id)
            .map(|connections| connections.iter().filter(|c| c.deliver(&frame)).count())
            .unwrap_or(0);

        metrics::record_delivered("user", delivered);
        tracing::debug!(user_id = %user_id, kind = %message.kind, delivered, "unicast");
        delivered
    }

    /// Deliver to every open connection whose owner has `role`
    pub fn broadcast_to_role(&self, role: Role, message: &OutboundMessage) -> usize {
        let Some(frame) = Self::encode(message) else {
            return 0;
        };

        let delivered = self
            .inner
            .read()
            .values()
            .flatten()
            .filter(|c| c.role() == role)
            .filter(|c| c.deliver(&frame))
            .count();

        metrics::record_delivered("role", delivered);
        tracing::debug!(role = %role, kind = %message.kind, delivered, "role broadcast");
        delivered
    }

    /// Deliver to every open connection
    pub fn broadcast_to_all(&self, message: &OutboundMessage) -> usize {
        let Some(frame) = Self::encode(message) else {
            return 0;
        };

        let delivered = self
            .inner
            .read()
            .values()
            .flatten()
            .filter(|c| c.deliver(&frame))
            .count();

        metrics::record_delivered("all", delivered);
        tracing::debug!(kind = %message.kind, delivered, "broadcast");
        delivered
    }

    fn encode(message: &OutboundMessage) -> Option<String> {
        match message.to_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(kind = %message.kind, error = %e, "failed to serialize outbound message");
                None
            }
        }
    }
}
