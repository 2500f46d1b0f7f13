//! # amencast-synthesis
//!
//! Translated text to audible frames in a media room.
//!
//! - [`synthesizer`]: the [`SpeechSynthesizer`] seam and audio encodings
//! - [`elevenlabs`]: the ElevenLabs streaming provider
//! - [`voices`]: per-language voice selection
//! - [`decode`]: compressed or raw audio to 16 kHz mono PCM
//! - [`reframe`]: PCM to 20 ms frames
//! - [`room`]: the [`RoomConnector`] / [`PublishedTrack`] seam
//! - [`bus_room`]: frames republished on the bus
//! - `livekit_room`: LiveKit rooms (feature `livekit`)
//! - [`speaker`]: [`SynthesisSession`], one stream's track lifecycle

#![deny(unsafe_code)]

pub mod bus_room;
pub mod decode;
pub mod elevenlabs;
pub mod errors;
#[cfg(feature = "livekit")]
pub mod livekit_room;
pub mod reframe;
pub mod room;
pub mod speaker;
pub mod synthesizer;
pub mod voices;

pub use bus_room::BusAudioRoom;
pub use decode::decode_to_pcm;
pub use elevenlabs::ElevenLabs;
pub use errors::{RoomError, SynthesisError};
#[cfg(feature = "livekit")]
pub use livekit_room::LiveKitRoom;
pub use reframe::{reframe, reframe_with};
pub use room::{PublishedTrack, RoomConnector};
pub use speaker::{Spoken, SynthesisSession};
pub use synthesizer::{AudioEncoding, SpeechSynthesizer, SynthesizedAudio};
pub use voices::VoiceMap;
