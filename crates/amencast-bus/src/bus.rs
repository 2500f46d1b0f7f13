//! The bus contract shared by every transport.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use amencast_core::WireMessage;
use amencast_core::channels::Channel;

use crate::errors::BusError;

/// A message delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete channel the message was published on.
    pub channel: String,
    /// Raw payload.
    pub payload: Bytes,
}

impl BusMessage {
    /// Parse the channel name into a typed [`Channel`].
    pub fn typed_channel(&self) -> Option<Channel> {
        Channel::parse(&self.channel)
    }

    /// Decode the payload as a wire message.
    pub fn decode<T: WireMessage>(&self) -> Result<T, amencast_core::MessageError> {
        T::decode(&self.payload)
    }
}

/// A live subscription.
///
/// Messages from every subscribed pattern arrive on one ordered stream.
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl Subscription {
    /// Wrap a receiver fed by a transport.
    pub fn new(rx: mpsc::UnboundedReceiver<BusMessage>) -> Self {
        Self { rx }
    }

    /// Next message, or `None` once the transport has closed.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for tests and draining.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.rx.try_recv().ok()
    }
}

/// Pattern-subscribable publish/subscribe transport.
///
/// Publishing is fire-and-forget and at-most-once. A subscriber sees the
/// messages of one channel in publish order.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `channel`.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BusError>;

    /// Subscribe to every channel matching any of `patterns` (`*` globs).
    async fn subscribe(&self, patterns: &[&str]) -> Result<Subscription, BusError>;
}

/// Encode `message` and publish it on `channel`.
pub async fn publish_message<M: WireMessage>(
    bus: &dyn MessageBus,
    channel: &Channel,
    message: &M,
) -> Result<(), BusError> {
    let payload = message.encode()?;
    bus.publish(&channel.name(), payload).await
}
