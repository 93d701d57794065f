use super::{materialize, BookingStore};
use crate::error::StoreError;
use crate::model::{Booking, Location, NewBooking};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    locations: HashMap<String, Location>,
    /// Kept in insertion order
    bookings: Vec<Booking>,
}

/// Process-local store. Enforces the same team-per-day uniqueness as the
/// sqlite schema so both backends fail the same way.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_locations(locations: impl IntoIterator<Item = Location>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for location in locations {
                state.locations.insert(location.id.clone(), location);
            }
        }
        store
    }
}

fn conflicts(bookings: &[Booking], candidate: &Booking) -> bool {
    bookings.iter().any(|b| {
        b.id != candidate.id
            && b.date == candidate.date
            && b.location_id == candidate.location_id
            && b.team_id == candidate.team_id
    })
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_bookings(
        &self,
        date: Option<NaiveDate>,
        location_id: Option<&str>,
    ) -> Result<Vec<Booking>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| date.map_or(true, |d| b.date == d))
            .filter(|b| location_id.map_or(true, |l| b.location_id == l))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        Ok(found)
    }

    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, StoreError> {
        let state = self.state.read().await;
        Ok(state.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn get_location(&self, id: &str) -> Result<Option<Location>, StoreError> {
        let state = self.state.read().await;
        Ok(state.locations.get(id).cloned())
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let state = self.state.read().await;
        let mut locations: Vec<Location> = state.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(locations)
    }

    async fn upsert_location(&self, location: Location) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.locations.insert(location.id.clone(), location);
        Ok(())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let booking = materialize(booking);
        let mut state = self.state.write().await;
        if conflicts(&state.bookings, &booking) {
            return Err(StoreError::conflict_with(&booking));
        }
        state.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn update_booking(&self, booking: &Booking) -> Result<Option<Booking>, StoreError> {
        let mut state = self.state.write().await;
        if conflicts(&state.bookings, booking) {
            return Err(StoreError::conflict_with(booking));
        }
        match state.bookings.iter_mut().find(|b| b.id == booking.id) {
            Some(slot) => {
                *slot = booking.clone();
                Ok(Some(booking.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_booking(&self, id: &str) -> Result<Option<Booking>, StoreError> {
        let mut state = self.state.write().await;
        let position = state.bookings.iter().position(|b| b.id == id);
        Ok(position.map(|idx| state.bookings.remove(idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_booking(team: &str, day: u32) -> NewBooking {
        NewBooking {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            team_id: team.to_string(),
            team_name: team.to_string(),
            people_count: 3,
            location_id: "loc1".to_string(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_filter() {
        let store = MemoryStore::new();
        store.insert_booking(new_booking("teamX", 15)).await.unwrap();
        store.insert_booking(new_booking("teamY", 16)).await.unwrap();

        let day = store
            .find_bookings(NaiveDate::from_ymd_opt(2024, 1, 15), Some("loc1"))
            .await
            .unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].team_id, "teamX");

        let all = store.find_bookings(None, Some("loc1")).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_unique_team_per_day() {
        let store = MemoryStore::new();
        store.insert_booking(new_booking("teamX", 15)).await.unwrap();
        let err = store
            .insert_booking(new_booking("teamX", 15))
            .await
            .unwrap_err();
        match err {
            StoreError::Conflict { team_id, location_id, .. } => {
                assert_eq!(team_id, "teamX");
                assert_eq!(location_id, "loc1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_returns_record() {
        let store = MemoryStore::new();
        let created = store.insert_booking(new_booking("teamX", 15)).await.unwrap();
        let deleted = store.delete_booking(&created.id).await.unwrap();
        assert_eq!(deleted, Some(created.clone()));
        assert!(store.get_booking(&created.id).await.unwrap().is_none());
        assert!(store.delete_booking(&created.id).await.unwrap().is_none());
    }
}
