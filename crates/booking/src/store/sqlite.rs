use super::{materialize, BookingStore};
use crate::error::StoreError;
use crate::model::{Booking, Location, NewBooking};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{ffi, params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS locations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    capacity INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    team_id TEXT NOT NULL,
    team_name TEXT NOT NULL,
    people_count INTEGER NOT NULL,
    location_id TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    UNIQUE (date, location_id, team_id)
);
CREATE INDEX IF NOT EXISTS bookings_by_location_date ON bookings (location_id, date);
";

const BOOKING_COLUMNS: &str =
    "id, date, team_id, team_name, people_count, location_id, notes, created_at";

/// Booking store on a single SQLite connection.
///
/// The unique index on `(date, location_id, team_id)` is the authoritative
/// guard for concurrent creates that both pass validation.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("sqlite connection poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

struct BookingRow {
    id: String,
    date: String,
    team_id: String,
    team_name: String,
    people_count: i64,
    location_id: String,
    notes: String,
    created_at: String,
}

impl BookingRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            team_id: row.get(2)?,
            team_name: row.get(3)?,
            people_count: row.get(4)?,
            location_id: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_booking(self) -> Result<Booking, StoreError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| StoreError::Corrupt(format!("booking {} date: {}", self.id, e)))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Corrupt(format!("booking {} created_at: {}", self.id, e)))?
            .with_timezone(&Utc);
        let people_count = u32::try_from(self.people_count).map_err(|_| {
            StoreError::Corrupt(format!(
                "booking {} people_count: {}",
                self.id, self.people_count
            ))
        })?;
        Ok(Booking {
            id: self.id,
            date,
            team_id: self.team_id,
            team_name: self.team_name,
            people_count,
            location_id: self.location_id,
            notes: self.notes,
            created_at,
        })
    }
}

/// Only the team-per-day unique index counts as a booking conflict.
fn map_write_error(err: rusqlite::Error, booking: &Booking) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::conflict_with(booking)
        }
        _ => StoreError::Sqlite(err),
    }
}

fn select_booking(conn: &Connection, id: &str) -> Result<Option<Booking>, StoreError> {
    let sql = format!("SELECT {} FROM bookings WHERE id = ?1", BOOKING_COLUMNS);
    let row = conn
        .query_row(&sql, params![id], BookingRow::read)
        .optional()?;
    row.map(BookingRow::into_booking).transpose()
}

#[async_trait]
impl BookingStore for SqliteStore {
    async fn find_bookings(
        &self,
        date: Option<NaiveDate>,
        location_id: Option<&str>,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut sql = format!("SELECT {} FROM bookings WHERE 1 = 1", BOOKING_COLUMNS);
        let mut args: Vec<String> = Vec::new();
        if let Some(date) = date {
            args.push(date.format("%Y-%m-%d").to_string());
            sql.push_str(&format!(" AND date = ?{}", args.len()));
        }
        if let Some(location_id) = location_id {
            args.push(location_id.to_string());
            sql.push_str(&format!(" AND location_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY date, created_at");

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), BookingRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(BookingRow::into_booking).collect()
        })
        .await
    }

    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| select_booking(conn, &id)).await
    }

    async fn get_location(&self, id: &str) -> Result<Option<Location>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let location = conn
                .query_row(
                    "SELECT id, name, capacity FROM locations WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(Location {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            capacity: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(location)
        })
        .await
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, capacity FROM locations ORDER BY id")?;
            let locations = stmt
                .query_map([], |row| {
                    Ok(Location {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        capacity: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(locations)
        })
        .await
    }

    async fn upsert_location(&self, location: Location) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO locations (id, name, capacity) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, capacity = excluded.capacity",
                params![location.id, location.name, location.capacity],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let booking = materialize(booking);
        self.with_conn(move |conn| {
            let sql = format!(
                "INSERT INTO bookings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                BOOKING_COLUMNS
            );
            conn.execute(
                &sql,
                params![
                    booking.id,
                    booking.date.format("%Y-%m-%d").to_string(),
                    booking.team_id,
                    booking.team_name,
                    booking.people_count,
                    booking.location_id,
                    booking.notes,
                    booking.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_write_error(e, &booking))?;
            Ok(booking)
        })
        .await
    }

    async fn update_booking(&self, booking: &Booking) -> Result<Option<Booking>, StoreError> {
        let booking = booking.clone();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE bookings
                     SET date = ?2, team_id = ?3, team_name = ?4, people_count = ?5,
                         location_id = ?6, notes = ?7
                     WHERE id = ?1",
                    params![
                        booking.id,
                        booking.date.format("%Y-%m-%d").to_string(),
                        booking.team_id,
                        booking.team_name,
                        booking.people_count,
                        booking.location_id,
                        booking.notes,
                    ],
                )
                .map_err(|e| map_write_error(e, &booking))?;
            if changed == 0 {
                return Ok(None);
            }
            select_booking(conn, &booking.id)
        })
        .await
    }

    async fn delete_booking(&self, id: &str) -> Result<Option<Booking>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let Some(existing) = select_booking(conn, &id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
            Ok(Some(existing))
        })
        .await
    }
}
