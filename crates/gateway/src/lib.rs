// deskcal Gateway - live calendar collaboration over WebSocket
//
// This crate tracks who is viewing which location/month room, fans booking
// changes out to those rooms, and routes booking requests to the booking
// service.

pub mod dispatcher;
pub mod handlers;
pub mod hub;
pub mod identity;
pub mod presence;
pub mod protocol;
pub mod server;
pub mod session;

pub use dispatcher::{Dispatcher, Outbox, OUTBOX_CAPACITY};
pub use handlers::MethodHandlers;
pub use hub::PresenceHub;
pub use identity::{JoinUser, Viewer};
pub use presence::{PresenceEntry, PresenceTable};
pub use protocol::*;
pub use server::{GatewayConfig, GatewayServer};
pub use session::{ConnectionContext, ConnectionId};
