// Broadcast Dispatcher
//
// Each connection owns a bounded outbound queue drained by its socket task.
// Emission only enqueues, so a slow or vanished client never holds up the
// rest of the room. A full queue sheds the event; clients that fall behind
// re-fetch through bookings.list. No acknowledgement, retry or replay.

use crate::presence::PresenceTable;
use crate::protocol::{DataChanged, GatewayEvent, PresenceUpdate};
use crate::session::ConnectionId;
use deskcal_booking::{BookingChange, RoomKey};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Events a connection may have queued before new ones are dropped
pub const OUTBOX_CAPACITY: usize = 256;

/// Sending half of a connection's outbound queue
pub type Outbox = mpsc::Sender<GatewayEvent>;

#[derive(Debug, Default)]
pub struct Dispatcher {
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: ConnectionId, outbox: Outbox) {
        self.outboxes.insert(connection, outbox);
    }

    pub fn unregister(&mut self, connection: &ConnectionId) {
        self.outboxes.remove(connection);
    }

    /// Send the room's full viewer snapshot to everyone in it.
    pub fn emit_presence_update(&self, table: &PresenceTable, room_key: &RoomKey) -> usize {
        let event = GatewayEvent::PresenceUpdate(PresenceUpdate {
            room_key: room_key.clone(),
            viewers: table.viewers(room_key),
        });
        self.deliver(table, room_key, event)
    }

    pub fn emit_data_changed(
        &self,
        table: &PresenceTable,
        room_key: &RoomKey,
        change: BookingChange,
    ) -> usize {
        let event = GatewayEvent::DataChanged(DataChanged {
            room_key: room_key.clone(),
            change,
        });
        self.deliver(table, room_key, event)
    }

    /// Returns how many connections the event was queued for.
    fn deliver(&self, table: &PresenceTable, room_key: &RoomKey, event: GatewayEvent) -> usize {
        let mut delivered = 0;
        for connection in table.connections(room_key) {
            let Some(outbox) = self.outboxes.get(&connection) else {
                tracing::debug!("No outbox for {} in {}", connection, room_key);
                continue;
            };
            match outbox.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Outbox full for {} in {}, dropping event", connection, room_key);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("Outbox closed for {}, dropping event", connection);
                }
            }
        }
        delivered
    }
}
