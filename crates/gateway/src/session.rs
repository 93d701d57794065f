// Connection Context
//
// Per-connection record of who is on the socket and which room it is
// attached to. Values are replaced wholesale by the hub on join/leave.

use crate::identity::Viewer;
use deskcal_booking::RoomKey;
use std::fmt;

/// Server-assigned connection identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionContext {
    pub id: ConnectionId,

    /// Peer address, for logs
    pub addr: String,

    /// Viewer id used when a join carries no identity
    pub anonymous_id: String,

    pub connected_at: chrono::DateTime<chrono::Utc>,

    membership: Option<Membership>,
}

#[derive(Debug, Clone, PartialEq)]
struct Membership {
    room_key: RoomKey,
    viewer: Viewer,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
            anonymous_id: crate::identity::anonymous_id(),
            connected_at: chrono::Utc::now(),
            membership: None,
        }
    }

    pub fn room_key(&self) -> Option<&RoomKey> {
        self.membership.as_ref().map(|m| &m.room_key)
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.membership.as_ref().map(|m| &m.viewer)
    }

    /// True when this connection already holds `(room_key, user_id)`.
    pub fn is_in(&self, room_key: &RoomKey, user_id: &str) -> bool {
        self.membership
            .as_ref()
            .is_some_and(|m| &m.room_key == room_key && m.viewer.id == user_id)
    }

    pub(crate) fn joined(&self, room_key: RoomKey, viewer: Viewer) -> Self {
        Self {
            membership: Some(Membership { room_key, viewer }),
            ..self.clone()
        }
    }

    pub(crate) fn left(&self) -> Self {
        Self {
            membership: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskcal_booking::room_key_for_presence;

    fn viewer(id: &str) -> Viewer {
        Viewer {
            id: id.to_string(),
            display_name: id.to_string(),
            color: "#000000".to_string(),
            photo: None,
        }
    }

    #[test]
    fn test_join_and_leave_replace_context() {
        let ctx = ConnectionContext::new(ConnectionId::from("c1"), "127.0.0.1:1");
        assert!(ctx.room_key().is_none());

        let room = room_key_for_presence("loc1", "2024-01");
        let joined = ctx.joined(room.clone(), viewer("a"));
        assert!(ctx.room_key().is_none());
        assert_eq!(joined.room_key(), Some(&room));
        assert!(joined.is_in(&room, "a"));
        assert!(!joined.is_in(&room, "b"));

        let left = joined.left();
        assert!(left.room_key().is_none());
        assert_eq!(left.anonymous_id, ctx.anonymous_id);
    }
}
