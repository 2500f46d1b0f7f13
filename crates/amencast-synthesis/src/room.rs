//! The media-room seam.
//!
//! A stream joins its room lazily on the first sentence, publishes a single
//! 16 kHz mono track and feeds it frames in order until teardown.

use async_trait::async_trait;

use amencast_core::{AudioFrame, StreamId};

use crate::errors::RoomError;

/// Joins a stream's media room and publishes its audio track.
#[async_trait]
pub trait RoomConnector: Send + Sync {
    /// Join the room for `stream_id` and publish one audio track.
    async fn join(&self, stream_id: &StreamId) -> Result<Box<dyn PublishedTrack>, RoomError>;
}

/// A published track accepting frame-sized PCM.
#[async_trait]
pub trait PublishedTrack: Send {
    /// Submit one frame. An error means the room is lost.
    async fn capture_frame(&mut self, frame: &AudioFrame) -> Result<(), RoomError>;

    /// Unpublish the track and leave the room.
    async fn close(&mut self) -> Result<(), RoomError>;
}
