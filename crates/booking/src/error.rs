use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by a `BookingStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A uniqueness guard in the store rejected the write.
    #[error("team {team_id} already booked on {date} at {location_id}")]
    Conflict {
        team_id: String,
        date: NaiveDate,
        location_id: String,
    },
    #[error("stored record is malformed: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid date format: {0} (expected YYYY-MM-DD)")]
    InvalidDateFormat(String),
    #[error("team {team_id} already has a booking for this day at this location")]
    DuplicateTeamBooking { team_id: String },
    #[error("capacity exceeded: only {available} places left; add a note to overbook")]
    CapacityExceeded { available: u32 },
    #[error("booking not found: {0}")]
    BookingNotFound(String),
    #[error("location not found: {0}")]
    LocationNotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),
}

impl StoreError {
    pub(crate) fn conflict_with(booking: &crate::Booking) -> Self {
        Self::Conflict {
            team_id: booking.team_id.clone(),
            date: booking.date,
            location_id: booking.location_id.clone(),
        }
    }
}

impl BookingError {
    /// HTTP-style status the API layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::DuplicateTeamBooking { .. }
            | Self::CapacityExceeded { .. }
            | Self::InvalidInput(_) => 400,
            Self::BookingNotFound(_) | Self::LocationNotFound(_) => 404,
            Self::InvalidDateFormat(_) | Self::PersistenceFailure(_) => 500,
        }
    }
}
