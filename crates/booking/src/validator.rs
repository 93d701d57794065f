//! Duplicate-team and capacity checks for a proposed booking.
//!
//! Pure: the caller supplies the bookings already on the target
//! `(date, location)` and the location's capacity.

use crate::error::BookingError;
use crate::model::Booking;

/// Prefix stored in the notes of a booking accepted over capacity.
pub const OVERBOOKED_MARKER: &str = "[OVERBOOKED] ";

/// Outcome of a passing validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Notes to persist, marked when the booking is over capacity
    pub notes: String,
    pub overbooked: bool,
}

/// The part of a booking the checks look at
#[derive(Debug, Clone, Copy)]
pub struct Proposed<'a> {
    pub team_id: &'a str,
    pub people_count: u32,
    pub notes: &'a str,
}

impl<'a> From<&'a Booking> for Proposed<'a> {
    fn from(booking: &'a Booking) -> Self {
        Self {
            team_id: &booking.team_id,
            people_count: booking.people_count,
            notes: &booking.notes,
        }
    }
}

pub fn validate(
    proposed: Proposed<'_>,
    existing: &[Booking],
    excluding_id: Option<&str>,
    capacity: u32,
) -> Result<Validation, BookingError> {
    let others = existing
        .iter()
        .filter(|b| excluding_id.map_or(true, |id| b.id != id));

    let mut other_total: u64 = 0;
    for booking in others {
        if booking.team_id == proposed.team_id {
            return Err(BookingError::DuplicateTeamBooking {
                team_id: proposed.team_id.to_string(),
            });
        }
        other_total += u64::from(booking.people_count);
    }

    if other_total + u64::from(proposed.people_count) <= u64::from(capacity) {
        return Ok(Validation {
            notes: proposed.notes.to_string(),
            overbooked: false,
        });
    }

    if justification(proposed.notes).is_empty() {
        let available = u64::from(capacity).saturating_sub(other_total) as u32;
        return Err(BookingError::CapacityExceeded { available });
    }

    Ok(Validation {
        notes: mark_overbooked(proposed.notes),
        overbooked: true,
    })
}

pub fn is_overbooked(notes: &str) -> bool {
    notes.starts_with(OVERBOOKED_MARKER)
}

/// Notes text without the marker
pub fn justification(notes: &str) -> &str {
    notes
        .strip_prefix(OVERBOOKED_MARKER)
        .unwrap_or(notes)
        .trim()
}

fn mark_overbooked(notes: &str) -> String {
    if is_overbooked(notes) {
        notes.to_string()
    } else {
        format!("{}{}", OVERBOOKED_MARKER, notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn existing(id: &str, team: &str, people: u32) -> Booking {
        Booking {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            team_id: team.to_string(),
            team_name: team.to_string(),
            people_count: people,
            location_id: "loc1".to_string(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    fn proposed<'a>(team: &'a str, people: u32, notes: &'a str) -> Proposed<'a> {
        Proposed {
            team_id: team,
            people_count: people,
            notes,
        }
    }

    #[test]
    fn test_within_capacity_passes_unchanged() {
        let current = vec![existing("b1", "teamX", 15)];
        let outcome = validate(proposed("teamY", 6, "hi"), &current, None, 21).unwrap();
        assert_eq!(outcome.notes, "hi");
        assert!(!outcome.overbooked);
    }

    #[test]
    fn test_capacity_exceeded_reports_available() {
        let current = vec![existing("b1", "teamX", 15)];
        let err = validate(proposed("teamY", 10, ""), &current, None, 21).unwrap_err();
        assert!(matches!(err, BookingError::CapacityExceeded { available: 6 }));
    }

    #[test]
    fn test_whitespace_notes_do_not_justify() {
        let current = vec![existing("b1", "teamX", 15)];
        let err = validate(proposed("teamY", 10, "   "), &current, None, 21).unwrap_err();
        assert!(matches!(err, BookingError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_justified_overbooking_is_marked() {
        let current = vec![existing("b1", "teamX", 15)];
        let outcome = validate(proposed("teamY", 10, "approved"), &current, None, 21).unwrap();
        assert!(outcome.overbooked);
        assert_eq!(outcome.notes, "[OVERBOOKED] approved");
    }

    #[test]
    fn test_marker_not_doubled() {
        let current = vec![existing("b1", "teamX", 15)];
        let outcome = validate(
            proposed("teamY", 10, "[OVERBOOKED] approved"),
            &current,
            None,
            21,
        )
        .unwrap();
        assert_eq!(outcome.notes, "[OVERBOOKED] approved");
    }

    #[test]
    fn test_duplicate_team_wins_over_capacity() {
        let current = vec![existing("b1", "teamX", 1)];
        for notes in ["", "approved"] {
            let err = validate(proposed("teamX", 1, notes), &current, None, 100).unwrap_err();
            assert!(matches!(err, BookingError::DuplicateTeamBooking { .. }));
        }
    }

    #[test]
    fn test_excluded_booking_is_ignored() {
        let current = vec![existing("b1", "teamX", 15), existing("b2", "teamY", 5)];
        // b1 resizing itself: its own 15 must not count against it.
        let outcome = validate(proposed("teamX", 16, ""), &current, Some("b1"), 21).unwrap();
        assert!(!outcome.overbooked);

        let err = validate(proposed("teamX", 17, ""), &current, Some("b1"), 21).unwrap_err();
        assert!(matches!(err, BookingError::CapacityExceeded { available: 16 }));
    }

    #[test]
    fn test_available_saturates_when_already_over() {
        let current = vec![existing("b1", "teamX", 25)];
        let err = validate(proposed("teamY", 1, ""), &current, None, 21).unwrap_err();
        assert!(matches!(err, BookingError::CapacityExceeded { available: 0 }));
    }
}
