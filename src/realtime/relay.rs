//! Cross-instance fan-out through Redis pub/sub
//!
//! Each instance publishes its channel and broadcast emissions and delivers
//! the emissions of the other instances to its own connections.

use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};

use super::hub::{RealtimeHub, RelayMessage};
use crate::error::{AppError, AppResult};

pub struct RelayHandles {
    pub publisher: JoinHandle<()>,
    pub subscriber: JoinHandle<()>,
}

/// Connect to Redis and start the publish and subscribe loops
pub async fn start(
    hub: RealtimeHub,
    outbound: UnboundedReceiver<RelayMessage>,
    url: &str,
    channel: &str,
) -> AppResult<RelayHandles> {
    let client = Client::open(url)
        .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

    let publisher_conn = client.get_connection_manager().await?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;

    tracing::info!(channel = %channel, instance = %hub.instance_id(), "Realtime relay connected");

    let publisher = tokio::spawn(publish_loop(publisher_conn, outbound, channel.to_string()));

    let subscriber = tokio::spawn(async move {
        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable relay payload");
                    continue;
                }
            };
            match serde_json::from_str::<RelayMessage>(&payload) {
                Ok(relayed) if relayed.origin == hub.instance_id() => {}
                Ok(relayed) => hub.deliver_local(&relayed.target, &relayed.frame, None),
                Err(e) => tracing::warn!(error = %e, "Malformed relay message"),
            }
        }
        tracing::warn!("Realtime relay subscription ended");
    });

    Ok(RelayHandles {
        publisher,
        subscriber,
    })
}

async fn publish_loop(
    mut conn: ConnectionManager,
    mut outbound: UnboundedReceiver<RelayMessage>,
    channel: String,
) {
    while let Some(message) = outbound.recv().await {
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode relay message");
                continue;
            }
        };
        if let Err(e) = conn.publish::<_, _, ()>(&channel, payload).await {
            tracing::warn!(error = %e, "Failed to publish relay message");
        }
    }
}
