//! Inbound frame dispatch
//!
//! The relay does not interpret payloads. Known kinds are re-tagged and echoed
//! to every connection of the sending user; everything else is logged and
//! dropped without touching the connection.

use super::{Connection, ConnectionRegistry, InboundMessage, OutboundKind, OutboundMessage};
use crate::metrics;

/// Route a parsed inbound message. Returns the number of connections reached.
pub fn dispatch(registry: &ConnectionRegistry, origin: &Connection, message: InboundMessage) -> usize {
    metrics::record_inbound(message.kind());

    let outbound = match message {
        InboundMessage::GlucoseUpdate(data) => {
            OutboundMessage::relay(OutboundKind::GlucoseAlert, data).stamped()
        }
        InboundMessage::PredictionUpdate(data) => {
            OutboundMessage::relay(OutboundKind::Prediction, data)
        }
        InboundMessage::Notification(data) => {
            OutboundMessage::relay(OutboundKind::Notification, data)
        }
        InboundMessage::Unknown { kind } => {
            tracing::warn!(
                user_id = %origin.user_id(),
                connection_id = %origin.id(),
                kind = %kind,
                "ignoring unknown relay message type"
            );
            return 0;
        }
    };

    registry.send_to_user(origin.user_id(), &outbound)
}

/// Parse and dispatch a raw text frame. Malformed frames are dropped.
pub fn handle_text_frame(registry: &ConnectionRegistry, origin: &Connection, text: &str) -> usize {
    match InboundMessage::parse(text) {
        Ok(message) => dispatch(registry, origin, message),
        Err(e) => {
            metrics::record_inbound("malformed");
            tracing::warn!(
                user_id = %origin.user_id(),
                connection_id = %origin.id(),
                error = %e,
                "failed to parse relay frame"
            );
            0
        }
    }
}
