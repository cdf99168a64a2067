use axum::extract::ws::Utf8Bytes;
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

use crate::{
    db::{DrawingEvent, EventKind},
    eventlog::EventLog,
    registry::{ConnectionId, RoomRegistry},
};

/// Who is on the other end of a connection.
#[derive(Debug, Clone)]
pub(crate) struct Peer {
    pub(crate) room_id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
}

/// The parts of an inbound frame the relay cares about. Everything else rides along untouched.
#[derive(Debug)]
pub(crate) struct Inbound {
    kind: Option<String>,
    data: Option<Value>,
}

impl Inbound {
    /// Fails for anything that isn't a JSON object.
    pub(crate) fn parse(text: &str) -> serde_json::Result<Self> {
        let mut fields: Map<String, Value> = serde_json::from_str(text)?;

        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => Some(kind),
            _ => None,
        };

        Ok(Self {
            kind,
            data: fields.remove("data"),
        })
    }

    /// Event kind and payload, for the types that get persisted. Missing or null `data` becomes `{}`.
    pub(crate) fn into_drawing(self) -> Option<(EventKind, Value)> {
        let kind = EventKind::parse(self.kind.as_deref()?)?;
        let data = match self.data {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(data) => data,
        };

        Some((kind, data))
    }
}

pub(crate) fn user_joined(peer: &Peer, users_count: usize) -> Utf8Bytes {
    notice("user_joined", peer, users_count)
}

pub(crate) fn user_left(peer: &Peer, users_count: usize) -> Utf8Bytes {
    notice("user_left", peer, users_count)
}

fn notice(kind: &str, peer: &Peer, users_count: usize) -> Utf8Bytes {
    json!({
        "type": kind,
        "user_id": peer.user_id,
        "username": peer.username,
        "users_count": users_count,
    })
    .to_string()
    .into()
}

/// Everything a session needs to act on one inbound frame.
pub(crate) struct Relay<'a> {
    pub(crate) registry: &'a RoomRegistry,
    pub(crate) event_log: &'a EventLog,
    pub(crate) peer: &'a Peer,
    pub(crate) conn: ConnectionId,
}

impl Relay<'_> {
    /// Queues drawing events for the event log and forwards the frame verbatim
    /// to the rest of the room. Malformed frames are dropped.
    pub(crate) fn handle(&self, text: Utf8Bytes) {
        let inbound = match Inbound::parse(text.as_str()) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(room = %self.peer.room_id, user = %self.peer.user_id, error = %e, "dropping malformed message");
                return;
            }
        };
        let received_at = OffsetDateTime::now_utc();

        let persisted = inbound.into_drawing().map(|(kind, data)| {
            self.event_log.submit(DrawingEvent {
                room_id: self.peer.room_id.clone(),
                user_id: self.peer.user_id.clone(),
                kind,
                data,
                timestamp: received_at,
            });
            kind
        });

        let delivered = self.registry.broadcast(&self.peer.room_id, &text, Some(self.conn));
        tracing::trace!(room = %self.peer.room_id, kind = ?persisted, delivered, "relayed");
    }
}
