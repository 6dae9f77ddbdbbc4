//! Broadcast Hub (§4.6): fans out the post-mutation snapshot to every live connection
//! bound to a room.
//!
//! Sends are fire-and-forget: a dead receiver (closed connection) is swallowed here,
//! not propagated, matching the transport-failure policy in §7. Cleanup happens on
//! the connection's own close path (`ws::handle_socket`), not here.

use crate::protocol::ServerMessage;
use crate::registry::{Outbox, Registry};
use crate::session::Session;

/// Publishes the full snapshot of `session` to every connection bound to its room.
pub async fn broadcast_snapshot(registry: &Registry, session: &Session) {
    let message = ServerMessage::snapshot(session);
    for outbox in registry.outboxes(&session.game_id).await {
        let _ = outbox.send(message.clone());
    }
}

/// Sends an error frame directly to the caller's own outbox (the common case: the
/// WebSocket read loop always has its own sender at hand).
pub fn send_error_to(outbox: &Outbox, message: impl Into<String>) {
    let _ = outbox.send(ServerMessage::error(message));
}
