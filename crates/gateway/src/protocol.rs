// deskcal WebSocket Protocol
//
// Frame types exchanged with calendar clients.
//
// Protocol flow:
// 1. Client opens the socket, server sends a "hello" response with policy
// 2. Client sends "presence:join" requests as the user navigates rooms
// 3. Bookings are read and mutated with request/response methods
// 4. Server pushes "presence:update" and "data:changed" events per room

use crate::identity::Viewer;
use deskcal_booking::{BookingChange, BookingError, RoomKey};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Gateway frame - top-level message type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayFrame {
    #[serde(rename = "req")]
    Request(GatewayRequest),

    #[serde(rename = "res")]
    Response(GatewayResponse),

    #[serde(rename = "event")]
    Event(GatewayEvent),
}

/// Request frame from client to gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Unique request ID
    pub id: String,

    /// Method name (e.g., "presence:join", "bookings.create")
    pub method: String,

    /// Method parameters
    #[serde(default)]
    pub params: JsonValue,
}

impl GatewayRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: JsonValue) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Response frame from gateway to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Request ID being responded to
    pub id: String,

    /// Success flag
    pub ok: bool,

    /// Response payload (if ok)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,

    /// Error details (if not ok)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

impl GatewayResponse {
    pub fn ok(id: String, payload: JsonValue) -> Self {
        Self {
            id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(id: String, error: ProtocolError) -> Self {
        Self {
            id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

/// Protocol error type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP-equivalent status
    pub status: u16,

    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl ProtocolError {
    // Standard error codes
    pub const INVALID_REQUEST: &'static str = "INVALID_REQUEST";
    pub const DUPLICATE_TEAM_BOOKING: &'static str = "DUPLICATE_TEAM_BOOKING";
    pub const CAPACITY_EXCEEDED: &'static str = "CAPACITY_EXCEEDED";
    pub const NOT_FOUND: &'static str = "NOT_FOUND";
    pub const INTERNAL_ERROR: &'static str = "INTERNAL_ERROR";

    pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
            details: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message, 400)
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<BookingError> for ProtocolError {
    fn from(err: BookingError) -> Self {
        let status = err.status_code();
        match &err {
            BookingError::DuplicateTeamBooking { team_id } => {
                Self::new(Self::DUPLICATE_TEAM_BOOKING, err.to_string(), status)
                    .with_details(serde_json::json!({ "teamId": team_id }))
            }
            BookingError::CapacityExceeded { available } => {
                Self::new(Self::CAPACITY_EXCEEDED, err.to_string(), status)
                    .with_details(serde_json::json!({ "available": available }))
            }
            BookingError::BookingNotFound(_) | BookingError::LocationNotFound(_) => {
                Self::new(Self::NOT_FOUND, err.to_string(), status)
            }
            BookingError::InvalidInput(_) => {
                Self::new(Self::INVALID_REQUEST, err.to_string(), status)
            }
            // Store internals stay in the server log.
            BookingError::InvalidDateFormat(_) | BookingError::PersistenceFailure(_) => {
                Self::new(Self::INTERNAL_ERROR, "Internal error", status)
            }
        }
    }
}

/// Event frame from gateway to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum GatewayEvent {
    /// Full viewer list of a room
    #[serde(rename = "presence:update")]
    PresenceUpdate(PresenceUpdate),

    /// A committed booking mutation affecting a room
    #[serde(rename = "data:changed")]
    DataChanged(DataChanged),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub room_key: RoomKey,
    pub viewers: Vec<Viewer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChanged {
    pub room_key: RoomKey,
    #[serde(flatten)]
    pub change: BookingChange,
}

/// Hello payload sent right after the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    /// Protocol version info
    pub protocol: ProtocolVersion,

    /// Server-assigned connection id
    pub connection_id: String,

    /// Anonymous viewer id used when a join carries no identity
    pub anonymous_id: String,

    /// Gateway policy
    pub policy: GatewayPolicy,
}

/// Protocol version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Minimum supported version
    pub min: u32,

    /// Maximum supported version
    pub max: u32,
}

/// Gateway policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPolicy {
    /// Maximum payload size
    pub max_payload: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use deskcal_booking::{room_key_for_presence, Booking, ChangeKind};
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let text = r#"{"type":"req","data":{"id":"r1","method":"presence:join","params":{"roomKey":"presence:loc1:2024-01"}}}"#;
        let frame: GatewayFrame = serde_json::from_str(text).unwrap();
        match frame {
            GatewayFrame::Request(req) => {
                assert_eq!(req.method, "presence:join");
                assert_eq!(req.params["roomKey"], json!("presence:loc1:2024-01"));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_response_error() {
        let err = ProtocolError::invalid_request("Invalid params");
        let res = GatewayResponse::error("test-1".to_string(), err);

        let json = serde_json::to_string(&res).unwrap();
        assert!(json.contains("\"ok\":false"));
        assert!(json.contains("\"code\":\"INVALID_REQUEST\""));
        assert!(json.contains("\"status\":400"));
    }

    #[test]
    fn test_capacity_error_carries_available() {
        let err = ProtocolError::from(BookingError::CapacityExceeded { available: 6 });
        assert_eq!(err.code, ProtocolError::CAPACITY_EXCEEDED);
        assert_eq!(err.status, 400);
        assert_eq!(err.details, Some(json!({ "available": 6 })));
    }

    #[test]
    fn test_data_changed_wire_shape() {
        let booking = Booking {
            id: "b1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            team_id: "teamX".to_string(),
            team_name: "Team X".to_string(),
            people_count: 4,
            location_id: "loc1".to_string(),
            notes: String::new(),
            created_at: Utc::now(),
        };
        let frame = GatewayFrame::Event(GatewayEvent::DataChanged(DataChanged {
            room_key: room_key_for_presence("loc1", "2024-01"),
            change: BookingChange::new(ChangeKind::MovedOut, booking),
        }));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], json!("event"));
        assert_eq!(value["data"]["event"], json!("data:changed"));
        let payload = &value["data"]["payload"];
        assert_eq!(payload["roomKey"], json!("presence:loc1:2024-01"));
        assert_eq!(payload["type"], json!("booking:moved_out"));
        assert_eq!(payload["booking"]["id"], json!("b1"));
        assert!(payload.get("before").is_none());
    }
}
