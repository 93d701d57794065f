use crate::model::Booking;
use crate::room_key::RoomKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What happened to a booking, as seen from one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "booking:created")]
    Created,
    #[serde(rename = "booking:updated")]
    Updated,
    /// The booking left this room for another date/location scope
    #[serde(rename = "booking:moved_out")]
    MovedOut,
    #[serde(rename = "booking:deleted")]
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub before: Option<Booking>,
}

impl BookingChange {
    pub fn new(kind: ChangeKind, booking: Booking) -> Self {
        Self {
            kind,
            booking,
            before: None,
        }
    }

    pub fn with_before(mut self, before: Booking) -> Self {
        self.before = Some(before);
        self
    }
}

/// Delivers committed booking changes to whoever watches a room.
///
/// Implementations must not block on slow recipients.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn data_changed(&self, room_key: &RoomKey, change: BookingChange);
}
