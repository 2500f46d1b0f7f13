//! LiveKit media room.
//!
//! Joins the room named after the stream as `{identity_prefix}{streamId}`,
//! publishes one microphone-source track and captures frames into a native
//! audio source.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use livekit::options::TrackPublishOptions;
use livekit::track::{LocalAudioTrack, LocalTrack, TrackSource};
use livekit::webrtc::audio_frame::AudioFrame as RtcAudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::{Room, RoomEvent, RoomOptions};
use livekit_api::access_token::{AccessToken, VideoGrants};
use tracing::{debug, info, warn};

use amencast_core::{AudioFrame, CHANNELS, SAMPLE_RATE, StreamId};
use amencast_settings::RoomSettings;

use crate::errors::RoomError;
use crate::room::{PublishedTrack, RoomConnector};

/// Native source queue depth in milliseconds.
const SOURCE_QUEUE_MS: u32 = 1000;

/// [`RoomConnector`] for a LiveKit server.
#[derive(Clone, Debug)]
pub struct LiveKitRoom {
    url: String,
    api_key: String,
    api_secret: String,
    track_name: String,
    identity_prefix: String,
    participant_name: String,
}

impl LiveKitRoom {
    /// Build from settings. Fails without both API credentials.
    pub fn from_settings(settings: &RoomSettings) -> Result<Self, RoomError> {
        let (Some(api_key), Some(api_secret)) =
            (settings.api_key.clone(), settings.api_secret.clone())
        else {
            return Err(RoomError::Token("LiveKit API key and secret are required".into()));
        };
        Ok(Self {
            url: settings.url.clone(),
            api_key,
            api_secret,
            track_name: settings.track_name.clone(),
            identity_prefix: settings.identity_prefix.clone(),
            participant_name: settings.participant_name.clone(),
        })
    }

    fn token(&self, stream_id: &StreamId) -> Result<String, RoomError> {
        AccessToken::with_api_key(&self.api_key, &self.api_secret)
            .with_identity(&format!("{}{stream_id}", self.identity_prefix))
            .with_name(&self.participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: stream_id.to_string(),
                can_publish: true,
                ..Default::default()
            })
            .to_jwt()
            .map_err(|e| RoomError::Token(e.to_string()))
    }
}

#[async_trait]
impl RoomConnector for LiveKitRoom {
    async fn join(&self, stream_id: &StreamId) -> Result<Box<dyn PublishedTrack>, RoomError> {
        let token = self.token(stream_id)?;
        let (room, mut events) = Room::connect(&self.url, &token, RoomOptions::default())
            .await
            .map_err(|e| RoomError::Connect(e.to_string()))?;

        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            SAMPLE_RATE,
            CHANNELS,
            SOURCE_QUEUE_MS,
        );
        let track = LocalAudioTrack::create_audio_track(
            &self.track_name,
            RtcAudioSource::Native(source.clone()),
        );
        let publication = room
            .local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: TrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| RoomError::Publish(e.to_string()))?;

        let disconnected = Arc::new(AtomicBool::new(false));
        let watcher = {
            let disconnected = Arc::clone(&disconnected);
            let stream_id = stream_id.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        RoomEvent::Disconnected { reason } => {
                            warn!(stream_id = %stream_id, ?reason, "room disconnected");
                            disconnected.store(true, Ordering::Release);
                        }
                        RoomEvent::ParticipantConnected(p) => {
                            debug!(stream_id = %stream_id, participant = ?p.identity(), "listener joined");
                        }
                        RoomEvent::ParticipantDisconnected(p) => {
                            debug!(stream_id = %stream_id, participant = ?p.identity(), "listener left");
                        }
                        _ => {}
                    }
                }
            })
        };

        info!(stream_id = %stream_id, track = %self.track_name, "track published");
        Ok(Box::new(LiveKitTrack {
            stream_id: stream_id.clone(),
            room: Some(room),
            source,
            publication_sid: publication.sid(),
            disconnected,
            watcher,
        }))
    }
}

struct LiveKitTrack {
    stream_id: StreamId,
    room: Option<Room>,
    source: NativeAudioSource,
    publication_sid: livekit::id::TrackSid,
    disconnected: Arc<AtomicBool>,
    watcher: tokio::task::JoinHandle<()>,
}

#[async_trait]
impl PublishedTrack for LiveKitTrack {
    async fn capture_frame(&mut self, frame: &AudioFrame) -> Result<(), RoomError> {
        if self.room.is_none() || self.disconnected.load(Ordering::Acquire) {
            return Err(RoomError::Capture("room disconnected".into()));
        }
        #[allow(clippy::cast_possible_truncation)]
        let samples_per_channel = frame.samples_per_channel() as u32;
        let rtc = RtcAudioFrame {
            data: Cow::Borrowed(&frame.samples),
            sample_rate: frame.sample_rate,
            num_channels: frame.channels,
            samples_per_channel,
        };
        self.source
            .capture_frame(&rtc)
            .await
            .map_err(|e| RoomError::Capture(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), RoomError> {
        let Some(room) = self.room.take() else {
            return Ok(());
        };
        let unpublished = room
            .local_participant()
            .unpublish_track(&self.publication_sid)
            .await
            .map_err(|e| RoomError::Publish(e.to_string()));
        let closed = room
            .close()
            .await
            .map_err(|e| RoomError::Connect(e.to_string()));
        self.watcher.abort();
        info!(stream_id = %self.stream_id, "track unpublished, room left");
        unpublished.and(closed)
    }
}

impl Drop for LiveKitTrack {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
