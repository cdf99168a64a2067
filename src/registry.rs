//! Live room membership and fan-out.
//!
//! Every room id maps to the participants currently connected to it. A room
//! entry exists only while it has at least one participant. Each entry sits
//! behind its dashmap shard lock, so membership changes and broadcasts on the
//! same room are serialized while other rooms stay independent.

use std::fmt;

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Identifies one connection. User ids may repeat across connections, this doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sending half of a connection's outbound queue. The connection's writer task drains it.
pub type Outbound = mpsc::Sender<Utf8Bytes>;

/// One connected client in one room, identity and transport handle together.
#[derive(Debug)]
pub struct Participant {
    id: ConnectionId,
    pub user_id: String,
    pub username: String,
    outbound: Outbound,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, outbound: Outbound) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id: user_id.into(),
            username: username.into(),
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Vec<Participant>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant, creating the room on first join. Returns the room's new count.
    pub fn register(&self, room_id: &str, participant: Participant) -> usize {
        let mut members = self.rooms.entry(room_id.to_owned()).or_default();
        members.push(participant);
        members.len()
    }

    /// Removes one connection from a room and drops the room once it's empty.
    /// Idempotent. Returns the count left behind.
    pub fn deregister(&self, room_id: &str, conn: ConnectionId) -> usize {
        let remaining = {
            let Some(mut members) = self.rooms.get_mut(room_id) else {
                return 0;
            };
            members.retain(|p| p.id != conn);
            members.len()
        };

        if remaining == 0 {
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
        }

        remaining
    }

    pub fn count_in(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |members| members.len())
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn members(&self, room_id: &str) -> Vec<Member> {
        self.rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .map(|p| Member {
                        user_id: p.user_id.clone(),
                        username: p.username.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Queues `message` for everyone in the room except `exclude`.
    ///
    /// Recipients whose queue is closed are dropped from the room in the same
    /// pass. A full queue only loses this message. Returns how many
    /// recipients got it.
    pub fn broadcast(&self, room_id: &str, message: &Utf8Bytes, exclude: Option<ConnectionId>) -> usize {
        let mut delivered = 0;

        let emptied = {
            let Some(mut members) = self.rooms.get_mut(room_id) else {
                return 0;
            };

            members.retain(|p| {
                if Some(p.id) == exclude {
                    return true;
                }

                match p.outbound.try_send(message.clone()) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(room = %room_id, conn = %p.id, user = %p.user_id, "outbound queue full, dropping message");
                        true
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(room = %room_id, conn = %p.id, user = %p.user_id, "pruning closed transport");
                        false
                    }
                }
            });

            members.is_empty()
        };

        if emptied {
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
        }

        delivered
    }
}
