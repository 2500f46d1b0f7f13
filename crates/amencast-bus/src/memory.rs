//! In-process bus.
//!
//! Each subscriber owns an unbounded queue. Publishing walks the subscriber
//! list under one lock, so every subscriber observes a single global publish
//! order across all of its patterns.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use globset::{Glob, GlobMatcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::bus::{BusMessage, MessageBus, Subscription};
use crate::errors::BusError;

struct Subscriber {
    matchers: Vec<GlobMatcher>,
    tx: mpsc::UnboundedSender<BusMessage>,
}

impl Subscriber {
    fn matches(&self, channel: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(channel))
    }
}

/// Compile a `*` channel pattern.
pub(crate) fn compile_pattern(pattern: &str) -> Result<GlobMatcher, BusError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| BusError::InvalidPattern {
            pattern: pattern.to_owned(),
            message: e.to_string(),
        })
}

/// Bus for single-process deployments and tests.
#[derive(Clone, Default)]
pub struct MemoryBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock();
        subs.retain(|s| !s.tx.is_closed());
        subs.len()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BusError> {
        let mut subs = self.subscribers.lock();
        subs.retain(|s| !s.tx.is_closed());
        let mut recipients = 0usize;
        for sub in subs.iter().filter(|s| s.matches(channel)) {
            let delivered = sub
                .tx
                .send(BusMessage {
                    channel: channel.to_owned(),
                    payload: payload.clone(),
                })
                .is_ok();
            if delivered {
                recipients += 1;
            }
        }
        trace!(channel, recipients, bytes = payload.len(), "published");
        Ok(())
    }

    async fn subscribe(&self, patterns: &[&str]) -> Result<Subscription, BusError> {
        let matchers = patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber { matchers, tx });
        debug!(?patterns, "memory bus subscription added");
        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use amencast_core::channels::{Channel, patterns};
    use amencast_core::{ControlMessage, StreamId};
    use assert_matches::assert_matches;

    use super::*;
    use crate::bus::publish_message;

    #[tokio::test]
    async fn pattern_routes_by_prefix() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe(&[patterns::TEXT_TRANSCRIBED]).await.unwrap();

        bus.publish("text:transcribed:s1", Bytes::from_static(b"a")).await.unwrap();
        bus.publish("text:translated:s1", Bytes::from_static(b"b")).await.unwrap();
        bus.publish("text:transcribed:s2", Bytes::from_static(b"c")).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().channel, "text:transcribed:s1");
        assert_eq!(sub.recv().await.unwrap().channel, "text:transcribed:s2");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn stream_id_with_colons_still_matches() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe(&[patterns::AUDIO_RAW]).await.unwrap();
        bus.publish("audio:raw:org:42", Bytes::new()).await.unwrap();

        let msg = sub.recv().await.unwrap();
        assert_eq!(
            msg.typed_channel(),
            Some(Channel::AudioRaw(StreamId::from("org:42")))
        );
    }

    #[tokio::test]
    async fn exact_control_channel() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe(&[patterns::STREAM_CONTROL]).await.unwrap();
        publish_message(&bus, &Channel::Control, &ControlMessage::stop(StreamId::from("s1")))
            .await
            .unwrap();
        bus.publish("stream:control:extra", Bytes::new()).await.unwrap();

        let msg: ControlMessage = sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(msg.stream_id.as_str(), "s1");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn cross_pattern_order_is_publish_order() {
        let bus = MemoryBus::new();
        let mut sub = bus
            .subscribe(&[patterns::STREAM_CONTROL, patterns::TEXT_TRANSCRIBED])
            .await
            .unwrap();

        bus.publish("text:transcribed:s1", Bytes::from_static(b"1")).await.unwrap();
        bus.publish("stream:control", Bytes::from_static(b"2")).await.unwrap();
        bus.publish("text:transcribed:s1", Bytes::from_static(b"3")).await.unwrap();

        let order: Vec<Bytes> = (0..3).map(|_| sub.try_recv().unwrap().payload).collect();
        assert_eq!(order, vec![Bytes::from_static(b"1"), Bytes::from_static(b"2"), Bytes::from_static(b"3")]);
    }

    #[tokio::test]
    async fn fan_out_to_every_subscriber() {
        let bus = MemoryBus::new();
        let mut a = bus.subscribe(&[patterns::STREAM_STATUS]).await.unwrap();
        let mut b = bus.subscribe(&["stream:status:s1"]).await.unwrap();
        bus.publish("stream:status:s1", Bytes::from_static(b"x")).await.unwrap();

        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_some());
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let bus = MemoryBus::new();
        let sub = bus.subscribe(&["*"]).await.unwrap();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        bus.publish("anything", Bytes::new()).await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn invalid_pattern_rejected() {
        let bus = MemoryBus::new();
        assert_matches!(
            bus.subscribe(&["audio:[raw"]).await,
            Err(BusError::InvalidPattern { .. })
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = MemoryBus::new();
        assert!(bus.publish("audio:raw:s1", Bytes::new()).await.is_ok());
    }
}
