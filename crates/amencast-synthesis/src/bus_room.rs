//! Room backed by the message bus.
//!
//! Each frame is published as raw little-endian PCM on
//! `audio:synthesized:{id}`, one message per frame.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use amencast_bus::MessageBus;
use amencast_core::channels::Channel;
use amencast_core::{AudioFrame, StreamId};

use crate::errors::RoomError;
use crate::room::{PublishedTrack, RoomConnector};

/// [`RoomConnector`] that republishes frames onto the bus.
#[derive(Clone)]
pub struct BusAudioRoom {
    bus: Arc<dyn MessageBus>,
}

impl BusAudioRoom {
    /// Publish through `bus`.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl RoomConnector for BusAudioRoom {
    async fn join(&self, stream_id: &StreamId) -> Result<Box<dyn PublishedTrack>, RoomError> {
        debug!(stream_id = %stream_id, "bus audio track opened");
        Ok(Box::new(BusTrack {
            bus: Arc::clone(&self.bus),
            stream_id: stream_id.clone(),
            channel: Channel::AudioSynthesized(stream_id.clone()).name(),
            frames: 0,
        }))
    }
}

struct BusTrack {
    bus: Arc<dyn MessageBus>,
    stream_id: StreamId,
    channel: String,
    frames: u64,
}

#[async_trait]
impl PublishedTrack for BusTrack {
    async fn capture_frame(&mut self, frame: &AudioFrame) -> Result<(), RoomError> {
        self.bus.publish(&self.channel, frame.to_le_bytes()).await?;
        self.frames += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RoomError> {
        debug!(stream_id = %self.stream_id, frames = self.frames, "bus audio track closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amencast_bus::MemoryBus;
    use amencast_core::audio::le_bytes_to_samples;

    #[tokio::test]
    async fn frames_land_on_the_stream_channel() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe(&["audio:synthesized:*"]).await.unwrap();
        let room = BusAudioRoom::new(Arc::new(bus));

        let mut track = room.join(&StreamId::from("s1")).await.unwrap();
        track
            .capture_frame(&AudioFrame::mono(vec![1, -2, 3]))
            .await
            .unwrap();
        track.close().await.unwrap();

        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.channel, "audio:synthesized:s1");
        assert_eq!(le_bytes_to_samples(&msg.payload).unwrap(), vec![1, -2, 3]);
    }
}
