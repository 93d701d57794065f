use crate::dispatcher::OUTBOX_CAPACITY;
use crate::handlers::MethodHandlers;
use crate::protocol::*;
use crate::session::ConnectionId;
use anyhow::{Context, Result};
use futures_util::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

/// Largest request frame accepted, in bytes
pub const MAX_PAYLOAD: usize = 1024 * 1024;

const MAX_REQUEST_ID_LENGTH: usize = 128;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub ws_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&deskcal_core::GatewayConfig::default())
    }
}

impl From<&deskcal_core::GatewayConfig> for GatewayConfig {
    fn from(config: &deskcal_core::GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            ws_path: config.ws_path.clone(),
        }
    }
}

fn validate_request(request: &GatewayRequest) -> Result<(), ProtocolError> {
    if request.id.trim().is_empty() {
        return Err(ProtocolError::invalid_request("Request id cannot be empty"));
    }
    if request.id.len() > MAX_REQUEST_ID_LENGTH {
        return Err(ProtocolError::invalid_request(format!(
            "Request id too long (max {})",
            MAX_REQUEST_ID_LENGTH
        )));
    }
    Ok(())
}

/// Gateway server
pub struct GatewayServer {
    config: GatewayConfig,
    handlers: Arc<MethodHandlers>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, handlers: Arc<MethodHandlers>) -> Self {
        Self { config, handlers }
    }

    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!(
            "Gateway server listening on ws://{}{}",
            addr,
            self.config.ws_path
        );
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until the task is dropped.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let ws_path = Arc::new(self.config.ws_path.clone());
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let handlers = self.handlers.clone();
                    let ws_path = ws_path.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, addr.to_string(), handlers, ws_path).await
                        {
                            tracing::error!("Connection error from {}: {:#}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }
        }
    }
}

/// Socket limits; oversized messages are refused before they are buffered.
fn ws_config() -> WebSocketConfig {
    WebSocketConfig::default().max_message_size(Some(MAX_PAYLOAD))
}

// Handle a WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: String,
    handlers: Arc<MethodHandlers>,
    ws_path: Arc<String>,
) -> Result<()> {
    let expected_path = ws_path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == expected_path.as_str() {
            return Ok(response);
        }
        let mut rejection = ErrorResponse::new(Some("Not found".to_string()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };

    let ws_stream =
        tokio_tungstenite::accept_hdr_async_with_config(stream, check_path, Some(ws_config()))
            .await
            .context("WebSocket handshake failed")?;

    let hub = handlers.hub();
    let (outbox, events) = mpsc::channel(OUTBOX_CAPACITY);
    let context = hub.connect(&addr, outbox).await;
    tracing::info!("WebSocket connection {} established from {}", context.id, addr);

    let result = run_connection(ws_stream, &context, &handlers, events).await;

    // Membership is released however the socket ended.
    hub.disconnect(&context.id).await;
    tracing::info!("Connection {} closed", context.id);
    result
}

async fn run_connection(
    ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    context: &crate::session::ConnectionContext,
    handlers: &MethodHandlers,
    mut events: mpsc::Receiver<GatewayEvent>,
) -> Result<()> {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split::<Message>();

    let hello = GatewayFrame::Response(GatewayResponse::ok(
        "hello".to_string(),
        serde_json::to_value(create_hello(context))?,
    ));
    ws_sender
        .send(Message::Text(serde_json::to_string(&hello)?.into()))
        .await?;

    loop {
        tokio::select! {
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(msg)) => {
                        if msg.is_text() {
                            let text = msg.to_text()?;
                            tracing::debug!("Received message from {}: {}", context.id, text);

                            let Some(response) = handle_text(text, &context.id, handlers).await else {
                                continue;
                            };
                            let response_msg = serde_json::to_string(&GatewayFrame::Response(response))?;
                            ws_sender.send(Message::Text(response_msg.into())).await?;
                        } else if msg.is_close() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error on {}: {}", context.id, e);
                        break;
                    }
                    None => break,
                }
            }

            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!("Outbox for {} closed", context.id);
                    break;
                };
                let event_msg = serde_json::to_string(&GatewayFrame::Event(event))?;
                ws_sender.send(Message::Text(event_msg.into())).await?;
            }
        }
    }

    Ok(())
}

/// Parse one text frame and answer it. Non-request frames get no reply.
async fn handle_text(
    text: &str,
    connection: &ConnectionId,
    handlers: &MethodHandlers,
) -> Option<GatewayResponse> {
    match serde_json::from_str::<GatewayFrame>(text) {
        Ok(GatewayFrame::Request(request)) => {
            Some(handle_request(&request, connection, handlers).await)
        }
        Ok(_) => {
            tracing::debug!("Ignoring non-request frame from {}", connection);
            None
        }
        Err(e) => {
            tracing::warn!("Malformed frame from {}: {}", connection, e);
            Some(GatewayResponse::error(
                String::new(),
                ProtocolError::invalid_request(format!("Malformed frame: {}", e)),
            ))
        }
    }
}

/// Handle incoming request
async fn handle_request(
    request: &GatewayRequest,
    connection: &ConnectionId,
    handlers: &MethodHandlers,
) -> GatewayResponse {
    if let Err(error) = validate_request(request) {
        return GatewayResponse::error(request.id.clone(), error);
    }

    match handlers.dispatch(connection, request).await {
        Ok(payload) => GatewayResponse::ok(request.id.clone(), payload),
        Err(error) => {
            if error.status >= 500 {
                tracing::error!("{} failed: {}", request.method, error.message);
            } else {
                tracing::debug!("{} rejected: {}", request.method, error.message);
            }
            GatewayResponse::error(request.id.clone(), error)
        }
    }
}

/// Create hello payload
fn create_hello(context: &crate::session::ConnectionContext) -> HelloPayload {
    HelloPayload {
        protocol: ProtocolVersion { min: 1, max: 1 },
        connection_id: context.id.to_string(),
        anonymous_id: context.anonymous_id.clone(),
        policy: GatewayPolicy {
            max_payload: MAX_PAYLOAD,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::PresenceHub;
    use deskcal_booking::{BookingService, MemoryStore};
    use serde_json::{json, Value};

    fn handlers() -> MethodHandlers {
        let hub = Arc::new(PresenceHub::new());
        let service = Arc::new(BookingService::new(
            Arc::new(MemoryStore::new()),
            hub.clone(),
        ));
        MethodHandlers::new(hub, service)
    }

    fn health_request(id: &str) -> GatewayRequest {
        GatewayRequest::new(id, "health", Value::Null)
    }

    #[test]
    fn test_config_from_core() {
        let core = deskcal_core::GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 9000,
            ws_path: "/live".to_string(),
        };
        let config = GatewayConfig::from(&core);
        assert_eq!(config.port, 9000);
        assert_eq!(config.ws_path, "/live");
    }

    #[test]
    fn test_socket_limit_matches_policy() {
        assert_eq!(ws_config().max_message_size, Some(MAX_PAYLOAD));
    }

    #[tokio::test]
    async fn test_handle_request_health() {
        let handlers = handlers();
        let response =
            handle_request(&health_request("req-1"), &ConnectionId::from("c"), &handlers).await;
        assert!(response.ok);
        assert_eq!(response.payload.unwrap()["status"], json!("ok"));
    }

    #[tokio::test]
    async fn test_handle_request_rejects_empty_id() {
        let handlers = handlers();
        let response =
            handle_request(&health_request("  "), &ConnectionId::from("c"), &handlers).await;
        assert!(!response.ok);
        assert_eq!(
            response.error.as_ref().map(|e| e.code.as_str()),
            Some(ProtocolError::INVALID_REQUEST)
        );
    }

    #[tokio::test]
    async fn test_handle_text_malformed_and_non_request() {
        let handlers = handlers();
        let conn = ConnectionId::from("c");

        let response = handle_text("{not json", &conn, &handlers).await.unwrap();
        assert!(!response.ok);

        let event = r#"{"type":"res","data":{"id":"x","ok":true}}"#;
        assert!(handle_text(event, &conn, &handlers).await.is_none());

        let request = r#"{"type":"req","data":{"id":"r1","method":"health"}}"#;
        let response = handle_text(request, &conn, &handlers).await.unwrap();
        assert!(response.ok);
        assert_eq!(response.id, "r1");
    }
}
