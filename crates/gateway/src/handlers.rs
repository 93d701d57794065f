// Gateway Method Handlers
//
// Request methods: presence join/leave for the calling connection, the
// booking read path, and booking mutations through the booking service.

use crate::hub::PresenceHub;
use crate::identity::JoinUser;
use crate::protocol::{GatewayRequest, ProtocolError};
use crate::session::ConnectionId;
use deskcal_booking::{BookingPatch, BookingService, NewBooking, RoomKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub type HandlerResult = Result<JsonValue, ProtocolError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinParams {
    room_key: String,
    #[serde(default)]
    user: JoinUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    location_id: String,
    #[serde(default)]
    year_month: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    id: String,
    #[serde(flatten)]
    patch: BookingPatch,
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    id: String,
}

fn parse_params<T: DeserializeOwned>(request: &GatewayRequest) -> Result<T, ProtocolError> {
    serde_json::from_value(request.params.clone()).map_err(|e| {
        ProtocolError::invalid_request(format!("Invalid params for {}: {}", request.method, e))
    })
}

pub struct MethodHandlers {
    hub: Arc<PresenceHub>,
    bookings: Arc<BookingService>,
    started_at: std::time::Instant,
}

impl MethodHandlers {
    pub fn new(hub: Arc<PresenceHub>, bookings: Arc<BookingService>) -> Self {
        Self {
            hub,
            bookings,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn hub(&self) -> Arc<PresenceHub> {
        Arc::clone(&self.hub)
    }

    /// Route one request from `connection`.
    pub async fn dispatch(&self, connection: &ConnectionId, request: &GatewayRequest) -> HandlerResult {
        match request.method.as_str() {
            "health" => self.health().await,
            "presence:join" => self.presence_join(connection, request).await,
            "presence:leave" => self.presence_leave(connection).await,
            "locations.list" => self.locations_list().await,
            "bookings.list" => self.bookings_list(request).await,
            "bookings.create" => self.bookings_create(request).await,
            "bookings.update" => self.bookings_update(request).await,
            "bookings.delete" => self.bookings_delete(request).await,
            other => Err(ProtocolError::new(
                ProtocolError::NOT_FOUND,
                format!("Unknown method: {}", other),
                404,
            )),
        }
    }

    /// Handle health check
    pub async fn health(&self) -> HandlerResult {
        Ok(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptimeMs": self.started_at.elapsed().as_millis() as u64,
            "connections": self.hub.connections().await,
            "rooms": self.hub.room_count().await,
        }))
    }

    /// Presence problems are logged and leave state untouched; presence is
    /// best-effort and must not take the connection down.
    pub async fn presence_join(
        &self,
        connection: &ConnectionId,
        request: &GatewayRequest,
    ) -> HandlerResult {
        let params: JoinParams = parse_params(request).map_err(|e| {
            tracing::warn!("Ignoring malformed presence:join from {}: {}", connection, e.message);
            e
        })?;

        let Some((room_key, _, _)) = RoomKey::parse(&params.room_key) else {
            tracing::warn!(
                "Ignoring presence:join from {} with bad room key '{}'",
                connection,
                params.room_key
            );
            return Err(ProtocolError::invalid_request(format!(
                "Invalid room key '{}'",
                params.room_key
            )));
        };

        let anonymous_id = match self.hub.context(connection).await {
            Some(context) => context.anonymous_id,
            None => {
                tracing::warn!("presence:join from unregistered connection {}", connection);
                return Err(ProtocolError::invalid_request("Unknown connection"));
            }
        };
        let viewer = params.user.into_viewer(&anonymous_id).map_err(|reason| {
            tracing::warn!("Ignoring presence:join from {}: {}", connection, reason);
            ProtocolError::invalid_request(reason)
        })?;

        let viewers = self
            .hub
            .join(connection, room_key.clone(), viewer.clone())
            .await
            .unwrap_or_default();
        Ok(json!({
            "roomKey": room_key,
            "self": viewer,
            "viewers": viewers,
        }))
    }

    pub async fn presence_leave(&self, connection: &ConnectionId) -> HandlerResult {
        let left = self.hub.leave(connection).await;
        Ok(json!({ "left": left }))
    }

    pub async fn locations_list(&self) -> HandlerResult {
        let locations = self.bookings.list_locations().await?;
        Ok(json!({ "locations": locations }))
    }

    /// Authoritative bookings for a room (`yearMonth`) or a single day (`date`)
    pub async fn bookings_list(&self, request: &GatewayRequest) -> HandlerResult {
        let params: ListParams = parse_params(request)?;
        match (params.year_month, params.date) {
            (Some(year_month), None) => {
                let bookings = self
                    .bookings
                    .list_month(&params.location_id, &year_month)
                    .await?;
                Ok(json!({
                    "roomKey": deskcal_booking::room_key_for_presence(&params.location_id, &year_month),
                    "bookings": bookings,
                }))
            }
            (None, Some(date)) => {
                let room_key = deskcal_booking::room_key_for_booking(&date, &params.location_id)
                    .map_err(|e| ProtocolError::invalid_request(e.to_string()))?;
                // Shape was checked by the room key derivation above.
                let day = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| ProtocolError::invalid_request(e.to_string()))?;
                let bookings = self.bookings.list_day(day, &params.location_id).await?;
                Ok(json!({ "roomKey": room_key, "bookings": bookings }))
            }
            _ => Err(ProtocolError::invalid_request(
                "Exactly one of yearMonth or date is required",
            )),
        }
    }

    pub async fn bookings_create(&self, request: &GatewayRequest) -> HandlerResult {
        let input: NewBooking = parse_params(request)?;
        let booking = self.bookings.create(input).await?;
        Ok(json!({ "booking": booking }))
    }

    pub async fn bookings_update(&self, request: &GatewayRequest) -> HandlerResult {
        let params: UpdateParams = parse_params(request)?;
        let booking = self.bookings.update(&params.id, params.patch).await?;
        Ok(json!({ "booking": booking }))
    }

    pub async fn bookings_delete(&self, request: &GatewayRequest) -> HandlerResult {
        let params: DeleteParams = parse_params(request)?;
        let booking = self.bookings.delete(&params.id).await?;
        Ok(json!({ "booking": booking }))
    }
}
