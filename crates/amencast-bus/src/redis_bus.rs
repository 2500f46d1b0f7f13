//! Redis pub/sub transport.
//!
//! Publishing shares one multiplexed connection. Each subscription opens its
//! own pub/sub connection and a forwarding task that ends when the
//! [`Subscription`] is dropped.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{BusMessage, MessageBus, Subscription};
use crate::errors::BusError;
use crate::memory::compile_pattern;

/// Bus backed by a Redis server.
#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisBus {
    /// Connect to `url` and open the shared publishing connection.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        info!(url = %redact(url), "connected to redis");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(channel, &payload[..]).await?;
        tracing::trace!(channel, receivers, "published");
        Ok(())
    }

    async fn subscribe(&self, patterns: &[&str]) -> Result<Subscription, BusError> {
        // Validate locally so a bad pattern fails the same way on every transport.
        for p in patterns {
            let _ = compile_pattern(p)?;
        }

        let mut pubsub = self.client.get_async_pubsub().await?;
        for p in patterns {
            pubsub.psubscribe(*p).await?;
        }
        debug!(?patterns, "redis subscription added");

        let (tx, rx) = mpsc::unbounded_channel();
        let _handle = tokio::spawn(async move {
            let mut stream = Box::pin(pubsub.into_on_message());
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    msg = stream.next() => {
                        let Some(msg) = msg else {
                            warn!("redis subscription stream ended");
                            break;
                        };
                        let message = BusMessage {
                            channel: msg.get_channel_name().to_owned(),
                            payload: Bytes::copy_from_slice(msg.get_payload_bytes()),
                        };
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(Subscription::new(rx))
    }
}

/// Strip credentials from a connection URL for logging.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_owned(),
    }
}
