//! Booking mutation orchestration.
//!
//! Every mutation runs validate → persist → derive room key(s) → notify.
//! Nothing is announced unless the store accepted the write. The
//! validate/persist pair is not serialized here; the store's uniqueness guard
//! is what finally rejects a racing duplicate.

use crate::error::{BookingError, StoreError};
use crate::model::{Booking, BookingPatch, Location, NewBooking};
use crate::notifier::{BookingChange, ChangeKind, ChangeNotifier};
use crate::room_key::{is_year_month, year_month_of, RoomKey};
use crate::store::BookingStore;
use crate::validator::{validate, Proposed};
use chrono::NaiveDate;
use std::sync::Arc;

pub struct BookingService {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn create(&self, input: NewBooking) -> Result<Booking, BookingError> {
        input.check()?;
        let capacity = self.capacity_of(&input.location_id).await?;
        let existing = self
            .store
            .find_bookings(Some(input.date), Some(&input.location_id))
            .await?;

        let outcome = validate(
            Proposed {
                team_id: &input.team_id,
                people_count: input.people_count,
                notes: &input.notes,
            },
            &existing,
            None,
            capacity,
        )?;
        if outcome.overbooked {
            tracing::info!(
                "Overbooking accepted for team {} at {} on {}",
                input.team_id,
                input.location_id,
                input.date
            );
        }

        let created = self
            .store
            .insert_booking(NewBooking {
                notes: outcome.notes,
                ..input
            })
            .await
            .map_err(conflict_as_duplicate)?;

        let room_key = RoomKey::for_booking(&created);
        tracing::debug!("Booking {} created in {}", created.id, room_key);
        self.notifier
            .data_changed(
                &room_key,
                BookingChange::new(ChangeKind::Created, created.clone()),
            )
            .await;
        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: BookingPatch) -> Result<Booking, BookingError> {
        let before = self
            .store
            .get_booking(id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(id.to_string()))?;

        // Checks run against the target date/location, not the current one.
        let mut target = patch.apply_to(&before);
        crate::model::check_fields(&target.team_id, &target.location_id, target.people_count)?;
        let capacity = self.capacity_of(&target.location_id).await?;
        let existing = self
            .store
            .find_bookings(Some(target.date), Some(&target.location_id))
            .await?;

        let outcome = validate(Proposed::from(&target), &existing, Some(id), capacity)?;
        target.notes = outcome.notes;

        let after = self
            .store
            .update_booking(&target)
            .await
            .map_err(conflict_as_duplicate)?
            .ok_or_else(|| BookingError::BookingNotFound(id.to_string()))?;

        let before_key = RoomKey::for_booking(&before);
        let after_key = RoomKey::for_booking(&after);

        self.notifier
            .data_changed(
                &after_key,
                BookingChange::new(ChangeKind::Updated, after.clone()).with_before(before.clone()),
            )
            .await;
        if before_key != after_key {
            tracing::debug!("Booking {} moved {} -> {}", id, before_key, after_key);
            self.notifier
                .data_changed(
                    &before_key,
                    BookingChange::new(ChangeKind::MovedOut, after.clone()).with_before(before),
                )
                .await;
        }
        Ok(after)
    }

    pub async fn delete(&self, id: &str) -> Result<Booking, BookingError> {
        let existing = self
            .store
            .get_booking(id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(id.to_string()))?;
        let room_key = RoomKey::for_booking(&existing);

        let deleted = self
            .store
            .delete_booking(id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(id.to_string()))?;

        self.notifier
            .data_changed(
                &room_key,
                BookingChange::new(ChangeKind::Deleted, deleted.clone()),
            )
            .await;
        Ok(deleted)
    }

    /// Authoritative bookings for one room, the read path clients use after
    /// missing broadcasts.
    pub async fn list_month(
        &self,
        location_id: &str,
        year_month: &str,
    ) -> Result<Vec<Booking>, BookingError> {
        if !is_year_month(year_month) {
            return Err(BookingError::InvalidInput(format!(
                "yearMonth must be YYYY-MM, got '{}'",
                year_month
            )));
        }
        let bookings = self.store.find_bookings(None, Some(location_id)).await?;
        Ok(bookings
            .into_iter()
            .filter(|b| year_month_of(b.date) == year_month)
            .collect())
    }

    pub async fn list_day(
        &self,
        date: NaiveDate,
        location_id: &str,
    ) -> Result<Vec<Booking>, BookingError> {
        Ok(self
            .store
            .find_bookings(Some(date), Some(location_id))
            .await?)
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>, BookingError> {
        Ok(self.store.list_locations().await?)
    }

    async fn capacity_of(&self, location_id: &str) -> Result<u32, BookingError> {
        self.store
            .get_location(location_id)
            .await?
            .map(|location| location.capacity)
            .ok_or_else(|| BookingError::LocationNotFound(location_id.to_string()))
    }
}

/// A store-level uniqueness rejection means a concurrent writer won the race
/// for the same team and day.
fn conflict_as_duplicate(err: StoreError) -> BookingError {
    match err {
        StoreError::Conflict {
            team_id,
            date,
            location_id,
        } => {
            tracing::warn!(
                "Store rejected duplicate booking for team {} on {} at {}",
                team_id,
                date,
                location_id
            );
            BookingError::DuplicateTeamBooking { team_id }
        }
        other => {
            tracing::error!("Booking persistence failed: {}", other);
            BookingError::PersistenceFailure(other)
        }
    }
}
