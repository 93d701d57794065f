use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A team's reservation of places at a location for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub date: NaiveDate,
    pub team_id: String,
    pub team_name: String,
    pub people_count: u32,
    pub location_id: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only location reference consulted for capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
}

/// Fields supplied when creating a booking; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub date: NaiveDate,
    pub team_id: String,
    #[serde(default)]
    pub team_name: String,
    pub people_count: u32,
    pub location_id: String,
    #[serde(default)]
    pub notes: String,
}

impl NewBooking {
    pub(crate) fn check(&self) -> Result<(), crate::BookingError> {
        check_fields(&self.team_id, &self.location_id, self.people_count)
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub people_count: Option<u32>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookingPatch {
    /// The record `current` would become, before validation adjusts notes.
    pub fn apply_to(&self, current: &Booking) -> Booking {
        Booking {
            id: current.id.clone(),
            date: self.date.unwrap_or(current.date),
            team_id: self
                .team_id
                .clone()
                .unwrap_or_else(|| current.team_id.clone()),
            team_name: self
                .team_name
                .clone()
                .unwrap_or_else(|| current.team_name.clone()),
            people_count: self.people_count.unwrap_or(current.people_count),
            location_id: self
                .location_id
                .clone()
                .unwrap_or_else(|| current.location_id.clone()),
            notes: self.notes.clone().unwrap_or_else(|| current.notes.clone()),
            created_at: current.created_at,
        }
    }
}

pub(crate) fn check_fields(
    team_id: &str,
    location_id: &str,
    people_count: u32,
) -> Result<(), crate::BookingError> {
    if team_id.trim().is_empty() {
        return Err(crate::BookingError::InvalidInput(
            "teamId cannot be empty".to_string(),
        ));
    }
    if location_id.trim().is_empty() {
        return Err(crate::BookingError::InvalidInput(
            "locationId cannot be empty".to_string(),
        ));
    }
    if people_count == 0 {
        return Err(crate::BookingError::InvalidInput(
            "peopleCount must be at least 1".to_string(),
        ));
    }
    Ok(())
}
