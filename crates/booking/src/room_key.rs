//! Room keys scope presence and change broadcasts to one location and one
//! calendar month: `presence:{locationId}:{YYYY-MM}`.

use crate::error::BookingError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

const PREFIX: &str = "presence";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key for the month containing `date`; infallible for typed dates.
    pub fn for_date(date: NaiveDate, location_id: &str) -> Self {
        room_key_for_presence(location_id, &year_month_of(date))
    }

    pub fn for_booking(booking: &crate::Booking) -> Self {
        Self::for_date(booking.date, &booking.location_id)
    }

    /// Accept a client-supplied key only if it is in canonical form.
    /// Returns the key with its `(location_id, year_month)` parts.
    pub fn parse(raw: &str) -> Option<(Self, String, String)> {
        let rest = raw.strip_prefix(PREFIX)?.strip_prefix(':')?;
        let (location_id, year_month) = rest.rsplit_once(':')?;
        if location_id.is_empty() || !is_year_month(year_month) {
            return None;
        }
        Some((
            Self(raw.to_string()),
            location_id.to_string(),
            year_month.to_string(),
        ))
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn room_key_for_presence(location_id: &str, year_month: &str) -> RoomKey {
    RoomKey(format!("{}:{}:{}", PREFIX, location_id, year_month))
}

/// Derive the room for a `YYYY-MM-DD` date string.
///
/// Upstream input handling should already guarantee the shape, so a failure
/// here points at a caller bug rather than bad user input.
pub fn room_key_for_booking(date: &str, location_id: &str) -> Result<RoomKey, BookingError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .filter(|_| date.len() == 10)
        .ok_or_else(|| BookingError::InvalidDateFormat(date.to_string()))?;
    Ok(RoomKey::for_date(parsed, location_id))
}

pub fn year_month_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// `YYYY-MM` with a real month number.
pub fn is_year_month(value: &str) -> bool {
    let Some((year, month)) = value.split_once('-') else {
        return false;
    };
    year.len() == 4
        && month.len() == 2
        && year.chars().all(|c| c.is_ascii_digit())
        && matches!(month.parse::<u32>(), Ok(1..=12))
}
