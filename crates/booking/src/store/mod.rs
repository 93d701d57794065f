//! Persistent store seam consulted and written by `BookingService`.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::model::{Booking, Location, NewBooking};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Bookings matching the given filters, ordered by date then creation.
    async fn find_bookings(
        &self,
        date: Option<NaiveDate>,
        location_id: Option<&str>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, StoreError>;

    async fn get_location(&self, id: &str) -> Result<Option<Location>, StoreError>;

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError>;

    async fn upsert_location(&self, location: Location) -> Result<(), StoreError>;

    /// Persist a new booking. Rejects a second booking for the same
    /// `(date, location_id, team_id)` with `StoreError::Conflict`.
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError>;

    /// Overwrite the stored record with the same id. `None` if it is gone.
    async fn update_booking(&self, booking: &Booking) -> Result<Option<Booking>, StoreError>;

    /// Remove a booking, returning the deleted record.
    async fn delete_booking(&self, id: &str) -> Result<Option<Booking>, StoreError>;
}

fn materialize(new: NewBooking) -> Booking {
    Booking {
        id: uuid::Uuid::new_v4().to_string(),
        date: new.date,
        team_id: new.team_id,
        team_name: new.team_name,
        people_count: new.people_count,
        location_id: new.location_id,
        notes: new.notes,
        created_at: Utc::now(),
    }
}
