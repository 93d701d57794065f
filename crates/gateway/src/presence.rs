// Presence Room Table
//
// Which users view which room, with one entry per user whose count tracks how
// many of that user's connections are in the room. Entries never sit at zero
// and rooms without connections are dropped.

use crate::identity::Viewer;
use crate::session::ConnectionId;
use deskcal_booking::RoomKey;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEntry {
    pub viewer: Viewer,
    pub connection_count: usize,
    /// Orders the snapshot by first arrival
    joined_seq: u64,
}

#[derive(Debug, Default)]
struct RoomPresence {
    entries: HashMap<String, PresenceEntry>,
    connections: HashSet<ConnectionId>,
}

#[derive(Debug, Default)]
pub struct PresenceTable {
    rooms: HashMap<RoomKey, RoomPresence>,
    next_seq: u64,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `connection` as `viewer` in `room_key`. Returns false when the
    /// connection was already counted there; its profile is still refreshed.
    pub fn add(&mut self, room_key: &RoomKey, connection: &ConnectionId, viewer: &Viewer) -> bool {
        let room = self.rooms.entry(room_key.clone()).or_default();
        if !room.connections.insert(connection.clone()) {
            if let Some(entry) = room.entries.get_mut(&viewer.id) {
                entry.viewer = viewer.clone();
            }
            return false;
        }

        match room.entries.get_mut(&viewer.id) {
            Some(entry) => {
                entry.connection_count += 1;
                // Latest profile wins.
                entry.viewer = viewer.clone();
            }
            None => {
                self.next_seq += 1;
                room.entries.insert(
                    viewer.id.clone(),
                    PresenceEntry {
                        viewer: viewer.clone(),
                        connection_count: 1,
                        joined_seq: self.next_seq,
                    },
                );
            }
        }
        true
    }

    /// Undo one `add`. Returns false when the connection was not counted.
    pub fn remove(&mut self, room_key: &RoomKey, connection: &ConnectionId, user_id: &str) -> bool {
        let Some(room) = self.rooms.get_mut(room_key) else {
            return false;
        };
        if !room.connections.remove(connection) {
            return false;
        }

        if let Some(entry) = room.entries.get_mut(user_id) {
            entry.connection_count -= 1;
            if entry.connection_count == 0 {
                room.entries.remove(user_id);
            }
        } else {
            tracing::warn!(
                "Connection {} left {} as unknown user {}",
                connection,
                room_key,
                user_id
            );
        }

        if room.connections.is_empty() {
            self.rooms.remove(room_key);
        }
        true
    }

    /// Current viewers in first-join order
    pub fn viewers(&self, room_key: &RoomKey) -> Vec<Viewer> {
        let Some(room) = self.rooms.get(room_key) else {
            return Vec::new();
        };
        let mut entries: Vec<&PresenceEntry> = room.entries.values().collect();
        entries.sort_by_key(|e| e.joined_seq);
        entries.into_iter().map(|e| e.viewer.clone()).collect()
    }

    /// Connections currently joined to `room_key`
    pub fn connections(&self, room_key: &RoomKey) -> Vec<ConnectionId> {
        self.rooms
            .get(room_key)
            .map(|room| room.connections.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entry(&self, room_key: &RoomKey, user_id: &str) -> Option<&PresenceEntry> {
        self.rooms.get(room_key)?.entries.get(user_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, room_key: &RoomKey) -> bool {
        self.rooms.contains_key(room_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskcal_booking::room_key_for_presence;

    fn viewer(id: &str) -> Viewer {
        Viewer {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            color: "#112233".to_string(),
            photo: None,
        }
    }

    fn ids(viewers: &[Viewer]) -> Vec<&str> {
        viewers.iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn test_tabs_share_one_entry() {
        let mut table = PresenceTable::new();
        let room = room_key_for_presence("loc1", "2024-01");
        let (tab1, tab2) = (ConnectionId::from("t1"), ConnectionId::from("t2"));

        assert!(table.add(&room, &tab1, &viewer("a")));
        assert!(table.add(&room, &tab2, &viewer("a")));
        assert_eq!(ids(&table.viewers(&room)), vec!["a"]);
        assert_eq!(table.entry(&room, "a").unwrap().connection_count, 2);

        assert!(table.remove(&room, &tab1, "a"));
        assert_eq!(ids(&table.viewers(&room)), vec!["a"]);
        assert_eq!(table.entry(&room, "a").unwrap().connection_count, 1);

        assert!(table.remove(&room, &tab2, "a"));
        assert!(table.viewers(&room).is_empty());
        assert!(table.entry(&room, "a").is_none());
        assert!(!table.contains_room(&room));
        assert_eq!(table.room_count(), 0);
    }

    #[test]
    fn test_same_connection_counted_once() {
        let mut table = PresenceTable::new();
        let room = room_key_for_presence("loc1", "2024-01");
        let conn = ConnectionId::from("c1");

        assert!(table.add(&room, &conn, &viewer("a")));
        assert!(!table.add(&room, &conn, &viewer("a")));
        assert_eq!(table.entry(&room, "a").unwrap().connection_count, 1);

        assert!(table.remove(&room, &conn, "a"));
        assert!(!table.remove(&room, &conn, "a"));
    }

    #[test]
    fn test_rejoin_refreshes_profile() {
        let mut table = PresenceTable::new();
        let room = room_key_for_presence("loc1", "2024-01");
        let conn = ConnectionId::from("c1");
        table.add(&room, &conn, &viewer("a"));

        let renamed = Viewer {
            display_name: "Renamed".to_string(),
            color: "#445566".to_string(),
            ..viewer("a")
        };
        assert!(!table.add(&room, &conn, &renamed));
        assert_eq!(table.viewers(&room), vec![renamed]);
        assert_eq!(table.entry(&room, "a").unwrap().connection_count, 1);
    }

    #[test]
    fn test_snapshot_in_arrival_order() {
        let mut table = PresenceTable::new();
        let room = room_key_for_presence("loc1", "2024-01");
        for (conn, user) in [("c1", "zed"), ("c2", "amy"), ("c3", "mia"), ("c4", "amy")] {
            table.add(&room, &ConnectionId::from(conn), &viewer(user));
        }
        assert_eq!(ids(&table.viewers(&room)), vec!["zed", "amy", "mia"]);
        assert_eq!(table.connections(&room).len(), 4);
    }

    #[test]
    fn test_rooms_are_independent() {
        let mut table = PresenceTable::new();
        let jan = room_key_for_presence("loc1", "2024-01");
        let feb = room_key_for_presence("loc1", "2024-02");
        table.add(&jan, &ConnectionId::from("c1"), &viewer("a"));
        table.add(&feb, &ConnectionId::from("c2"), &viewer("a"));

        assert_eq!(table.room_count(), 2);
        table.remove(&jan, &ConnectionId::from("c1"), "a");
        assert_eq!(ids(&table.viewers(&feb)), vec!["a"]);
        assert_eq!(table.room_count(), 1);
    }

    #[test]
    fn test_distinct_user_count_matches_positive_counts() {
        let mut table = PresenceTable::new();
        let room = room_key_for_presence("loc2", "2024-05");
        let ops: [(&str, &str, bool); 9] = [
            ("c1", "a", true),
            ("c2", "b", true),
            ("c3", "a", true),
            ("c4", "c", true),
            ("c1", "a", false),
            ("c2", "b", false),
            ("c5", "b", true),
            ("c4", "c", false),
            ("c3", "a", false),
        ];
        let mut counts: HashMap<&str, i32> = HashMap::new();
        for (conn, user, join) in ops {
            let conn = ConnectionId::from(conn);
            if join {
                table.add(&room, &conn, &viewer(user));
                *counts.entry(user).or_default() += 1;
            } else {
                table.remove(&room, &conn, user);
                *counts.entry(user).or_default() -= 1;
            }
            let expected = counts.values().filter(|n| **n > 0).count();
            let viewers = table.viewers(&room);
            assert_eq!(viewers.len(), expected);
            let mut unique = ids(&viewers);
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), viewers.len());
        }
        assert_eq!(ids(&table.viewers(&room)), vec!["b"]);
    }
}
