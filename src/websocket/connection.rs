use crate::middleware::Role;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Unique identifier for a relay connection
///
/// Used to unregister exactly the connection that closed when a user has
/// several open at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport liveness of a connection.
///
/// Transitions are one-way: `Connecting -> Open -> Closed`, or straight to
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// One live client channel as held by the registry.
///
/// Cloning is cheap; clones share the liveness state and the outbound queue.
/// Frames pushed through [`Connection::deliver`] are drained in order by the
/// session actor that owns the receiving half.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: Arc<str>,
    role: Role,
    state: Arc<AtomicU8>,
    sender: UnboundedSender<String>,
}

impl Connection {
    /// Create a connection in the `Connecting` state plus the receiver its
    /// session drains.
    pub fn new(user_id: impl Into<Arc<str>>, role: Role) -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let conn = Self {
            id: ConnectionId::new(),
            user_id: user_id.into(),
            role,
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting as u8)),
            sender: tx,
        };
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// `Connecting -> Open`. Returns false if the connection already closed.
    pub fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn mark_closed(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }

    /// Queue a serialized frame if the connection is open.
    ///
    /// Returns whether the frame was queued. A connection whose session has
    /// gone away is flipped to `Closed` here.
    pub fn deliver(&self, frame: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        if self.sender.send(frame.to_owned()).is_err() {
            self.mark_closed();
            return false;
        }
        true
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}
