// Presence Hub
//
// Owns the room table, the connection contexts and the dispatcher behind one
// lock. Every join/leave/disconnect and every emission runs under it, so
// connection counts are never read and written in separate steps and events
// for a room are queued in dispatch order.

use crate::dispatcher::{Dispatcher, Outbox};
use crate::identity::Viewer;
use crate::presence::PresenceTable;
use crate::session::{ConnectionContext, ConnectionId};
use async_trait::async_trait;
use deskcal_booking::{BookingChange, ChangeNotifier, RoomKey};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct HubState {
    table: PresenceTable,
    dispatcher: Dispatcher,
    contexts: HashMap<ConnectionId, ConnectionContext>,
}

impl HubState {
    /// Drop the connection's current membership and tell the room.
    fn leave_current(&mut self, connection: &ConnectionId) -> Option<RoomKey> {
        let context = self.contexts.get(connection)?;
        let room_key = context.room_key()?.clone();
        let user_id = context.viewer()?.id.clone();
        let next = context.left();
        self.contexts.insert(connection.clone(), next);

        if self.table.remove(&room_key, connection, &user_id) {
            tracing::debug!("{} left {} as {}", connection, room_key, user_id);
            self.dispatcher.emit_presence_update(&self.table, &room_key);
        }
        Some(room_key)
    }
}

#[derive(Default)]
pub struct PresenceHub {
    state: Mutex<HubState>,
}

impl PresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection and its outbound queue.
    pub async fn connect(&self, addr: &str, outbox: Outbox) -> ConnectionContext {
        let context = ConnectionContext::new(ConnectionId::generate(), addr);
        let mut state = self.state.lock().await;
        state.dispatcher.register(context.id.clone(), outbox);
        state.contexts.insert(context.id.clone(), context.clone());
        context
    }

    /// Attach the connection to `room_key` as `viewer`, leaving its previous
    /// room first. Returns the room's snapshot, or `None` for an unknown
    /// connection.
    pub async fn join(
        &self,
        connection: &ConnectionId,
        room_key: RoomKey,
        viewer: Viewer,
    ) -> Option<Vec<Viewer>> {
        let mut state = self.state.lock().await;
        let Some(context) = state.contexts.get(connection) else {
            tracing::warn!("Join from unknown connection {}", connection);
            return None;
        };

        if !context.is_in(&room_key, &viewer.id) {
            state.leave_current(connection);
        }

        let context = state.contexts.get(connection)?.joined(room_key.clone(), viewer.clone());
        state.contexts.insert(connection.clone(), context);
        if state.table.add(&room_key, connection, &viewer) {
            tracing::debug!("{} joined {} as {}", connection, room_key, viewer.id);
        }
        state.dispatcher.emit_presence_update(&state.table, &room_key);
        Some(state.table.viewers(&room_key))
    }

    /// Detach the connection from its room. Returns the room it left.
    pub async fn leave(&self, connection: &ConnectionId) -> Option<RoomKey> {
        let mut state = self.state.lock().await;
        state.leave_current(connection)
    }

    /// Leave the current room and forget the connection entirely.
    pub async fn disconnect(&self, connection: &ConnectionId) {
        let mut state = self.state.lock().await;
        state.leave_current(connection);
        state.dispatcher.unregister(connection);
        state.contexts.remove(connection);
    }

    pub async fn emit_data_changed(&self, room_key: &RoomKey, change: BookingChange) -> usize {
        let state = self.state.lock().await;
        let delivered = state
            .dispatcher
            .emit_data_changed(&state.table, room_key, change);
        tracing::debug!("data:changed for {} queued to {} connections", room_key, delivered);
        delivered
    }

    pub async fn viewers(&self, room_key: &RoomKey) -> Vec<Viewer> {
        self.state.lock().await.table.viewers(room_key)
    }

    pub async fn context(&self, connection: &ConnectionId) -> Option<ConnectionContext> {
        self.state.lock().await.contexts.get(connection).cloned()
    }

    pub async fn connection_count(&self, room_key: &RoomKey, user_id: &str) -> usize {
        self.state
            .lock()
            .await
            .table
            .entry(room_key, user_id)
            .map_or(0, |e| e.connection_count)
    }

    pub async fn room_count(&self) -> usize {
        self.state.lock().await.table.room_count()
    }

    pub async fn connections(&self) -> usize {
        self.state.lock().await.contexts.len()
    }
}

#[async_trait]
impl ChangeNotifier for PresenceHub {
    async fn data_changed(&self, room_key: &RoomKey, change: BookingChange) {
        self.emit_data_changed(room_key, change).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::OUTBOX_CAPACITY;
    use crate::protocol::GatewayEvent;
    use deskcal_booking::room_key_for_presence;
    use tokio::sync::mpsc;

    fn viewer(id: &str) -> Viewer {
        Viewer {
            id: id.to_string(),
            display_name: id.to_string(),
            color: "#000000".to_string(),
            photo: None,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<GatewayEvent>) -> Vec<GatewayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn snapshot_ids(event: &GatewayEvent) -> (String, Vec<String>) {
        match event {
            GatewayEvent::PresenceUpdate(update) => (
                update.room_key.to_string(),
                update.viewers.iter().map(|v| v.id.clone()).collect(),
            ),
            other => panic!("expected presence update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_room_switch_leaves_old_room() {
        let hub = PresenceHub::new();
        let (tx_watcher, mut rx_watcher) = mpsc::channel(OUTBOX_CAPACITY);
        let (tx_mover, mut rx_mover) = mpsc::channel(OUTBOX_CAPACITY);
        let watcher = hub.connect("w", tx_watcher).await;
        let mover = hub.connect("m", tx_mover).await;

        let jan = room_key_for_presence("loc1", "2024-01");
        let feb = room_key_for_presence("loc1", "2024-02");
        hub.join(&watcher.id, jan.clone(), viewer("w")).await.unwrap();
        hub.join(&mover.id, jan.clone(), viewer("m")).await.unwrap();
        drain(&mut rx_watcher);
        drain(&mut rx_mover);

        let feb_viewers = hub.join(&mover.id, feb.clone(), viewer("m")).await.unwrap();
        assert_eq!(feb_viewers, vec![viewer("m")]);

        let seen = drain(&mut rx_watcher);
        assert_eq!(seen.len(), 1);
        assert_eq!(
            snapshot_ids(&seen[0]),
            (jan.to_string(), vec!["w".to_string()])
        );

        let mover_seen = drain(&mut rx_mover);
        assert_eq!(mover_seen.len(), 1);
        assert_eq!(
            snapshot_ids(&mover_seen[0]),
            (feb.to_string(), vec!["m".to_string()])
        );
        assert_eq!(hub.context(&mover.id).await.unwrap().room_key(), Some(&feb));
    }

    #[tokio::test]
    async fn test_rejoin_same_room_is_idempotent() {
        let hub = PresenceHub::new();
        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let conn = hub.connect("c", tx).await;
        let room = room_key_for_presence("loc1", "2024-01");

        hub.join(&conn.id, room.clone(), viewer("a")).await;
        hub.join(&conn.id, room.clone(), viewer("a")).await;
        assert_eq!(hub.connection_count(&room, "a").await, 1);
        // Each join still sends a snapshot.
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn test_rejoin_with_new_profile_is_broadcast() {
        let hub = PresenceHub::new();
        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let conn = hub.connect("c", tx).await;
        let room = room_key_for_presence("loc1", "2024-01");
        hub.join(&conn.id, room.clone(), viewer("a")).await;
        drain(&mut rx);

        let renamed = Viewer {
            display_name: "Alice B".to_string(),
            ..viewer("a")
        };
        let snapshot = hub.join(&conn.id, room.clone(), renamed.clone()).await.unwrap();
        assert_eq!(snapshot, vec![renamed.clone()]);
        match drain(&mut rx).as_slice() {
            [GatewayEvent::PresenceUpdate(update)] => assert_eq!(update.viewers, vec![renamed]),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_everything() {
        let hub = PresenceHub::new();
        let (tx, _rx) = mpsc::channel(OUTBOX_CAPACITY);
        let conn = hub.connect("c", tx).await;
        let room = room_key_for_presence("loc1", "2024-01");
        hub.join(&conn.id, room.clone(), viewer("a")).await;

        hub.disconnect(&conn.id).await;
        assert_eq!(hub.room_count().await, 0);
        assert_eq!(hub.connections().await, 0);
        assert!(hub.viewers(&room).await.is_empty());
        assert!(hub.join(&conn.id, room, viewer("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_leave_without_room_is_noop() {
        let hub = PresenceHub::new();
        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let conn = hub.connect("c", tx).await;
        assert!(hub.leave(&conn.id).await.is_none());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_data_changed_reaches_only_joined_room() {
        use chrono::{NaiveDate, Utc};
        use deskcal_booking::{Booking, ChangeKind};

        let hub = PresenceHub::new();
        let (tx_in, mut rx_in) = mpsc::channel(OUTBOX_CAPACITY);
        let (tx_out, mut rx_out) = mpsc::channel(OUTBOX_CAPACITY);
        let inside = hub.connect("in", tx_in).await;
        let _outside = hub.connect("out", tx_out).await;
        let room = room_key_for_presence("loc1", "2024-01");
        hub.join(&inside.id, room.clone(), viewer("a")).await;
        drain(&mut rx_in);

        let booking = Booking {
            id: "b1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            team_id: "teamX".to_string(),
            team_name: "Team X".to_string(),
            people_count: 3,
            location_id: "loc1".to_string(),
            notes: String::new(),
            created_at: Utc::now(),
        };
        hub.data_changed(&room, BookingChange::new(ChangeKind::Created, booking))
            .await;

        let events = drain(&mut rx_in);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], GatewayEvent::DataChanged(d) if d.room_key == room));
        assert!(drain(&mut rx_out).is_empty());
    }
}
