//! deskcal_booking
//!
//! Booking model, room key derivation, conflict/capacity validation and the
//! mutation service that persists bookings and announces changes per room.

pub mod error;
pub mod model;
pub mod notifier;
pub mod room_key;
pub mod service;
pub mod store;
pub mod validator;

pub use error::{BookingError, StoreError};
pub use model::{Booking, BookingPatch, Location, NewBooking};
pub use notifier::{BookingChange, ChangeKind, ChangeNotifier};
pub use room_key::{room_key_for_booking, room_key_for_presence, RoomKey};
pub use service::BookingService;
pub use store::{BookingStore, MemoryStore, SqliteStore};
pub use validator::{validate, Validation, OVERBOOKED_MARKER};
