//! WebSocket endpoint

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use super::{
    events::{ClientEvent, ErrorPayload, ServerEvent},
    handlers,
    hub::Channel,
};
use crate::AppState;

/// Connection parameters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Bind the connection to this student and join their channel
    pub student_id: Option<Uuid>,
    /// `admin` joins the admin channel right away
    pub role: Option<String>,
}

/// Upgrade to the real-time channel
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: ConnectParams) {
    let hub = state.hub.clone();
    let (conn, outbound) = hub.register();

    if let Some(student_id) = params.student_id {
        hub.bind_student(conn, student_id);
    }
    if params.role.as_deref() == Some("admin") {
        hub.join(conn, Channel::Admins);
    }
    tracing::info!(connection = %conn, student_id = ?params.student_id, "Socket connected");

    let (mut sink, mut stream) = socket.split();

    let mut frames = UnboundedReceiverStream::new(outbound);
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.next().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // Commands run one at a time so replies keep the order of requests
    while let Some(received) = stream.next().await {
        match received {
            Ok(Message::Text(text)) => match ClientEvent::parse(&text) {
                Ok(event) => {
                    tracing::debug!(connection = %conn, event = event.name(), "Socket event");
                    handlers::dispatch(&state, conn, event).await;
                }
                Err(reason) => {
                    tracing::warn!(connection = %conn, %reason, "Rejected socket frame");
                    hub.emit_to(conn, &ServerEvent::Error(ErrorPayload::new(reason)));
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(connection = %conn, error = %e, "Socket error");
                break;
            }
        }
    }

    hub.unregister(conn);
    writer.abort();
    tracing::info!(connection = %conn, "Socket disconnected");
}
