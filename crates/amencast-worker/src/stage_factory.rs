//! Builds the bus, providers and stages a worker runs.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use amencast_bus::{MemoryBus, MessageBus, RedisBus};
use amencast_pipeline::{Stage, SynthesisStage, TranscriptionStage, TranslationStage};
use amencast_settings::{AmencastSettings, BusKind, BusSettings, RoomKind, StageKind};
use amencast_synthesis::{BusAudioRoom, ElevenLabs, RoomConnector, VoiceMap};
use amencast_transcription::{AssemblyAi, SessionConfig};
use amencast_translation::OpenAiTranslator;

/// Connect the configured bus transport.
pub async fn build_bus(settings: &BusSettings) -> Result<Arc<dyn MessageBus>> {
    match settings.kind {
        BusKind::Memory => {
            info!("using in-process bus");
            Ok(Arc::new(MemoryBus::new()))
        }
        BusKind::Redis => {
            let bus = RedisBus::connect(&settings.redis_url)
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", settings.redis_url))?;
            info!(url = %settings.redis_url, "using Redis bus");
            Ok(Arc::new(bus))
        }
    }
}

/// Build the media room the synthesis stage publishes into.
pub fn build_room(
    settings: &AmencastSettings,
    bus: &Arc<dyn MessageBus>,
) -> Result<Arc<dyn RoomConnector>> {
    match settings.room.kind {
        RoomKind::Bus => Ok(Arc::new(BusAudioRoom::new(Arc::clone(bus)))),
        #[cfg(feature = "livekit")]
        RoomKind::Livekit => {
            let room = amencast_synthesis::LiveKitRoom::from_settings(&settings.room)
                .context("Invalid LiveKit settings")?;
            Ok(Arc::new(room))
        }
        #[cfg(not(feature = "livekit"))]
        RoomKind::Livekit => {
            anyhow::bail!("room.kind is \"livekit\" but this worker was built without the `livekit` feature")
        }
    }
}

/// Build one stage per requested kind, in the order given.
pub fn build_stages(
    settings: &AmencastSettings,
    kinds: &[StageKind],
    bus: &Arc<dyn MessageBus>,
) -> Result<Vec<Arc<dyn Stage>>> {
    if settings.bus.kind == BusKind::Memory && kinds.len() < StageKind::ALL.len() {
        warn!(
            ?kinds,
            "in-process bus with a subset of stages; streams cannot complete"
        );
    }

    let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let stage: Arc<dyn Stage> = match kind {
            StageKind::Transcription => {
                let stt = AssemblyAi::from_settings(&settings.transcription)
                    .context("Invalid transcription settings")?;
                Arc::new(TranscriptionStage::new(
                    Arc::clone(bus),
                    Arc::new(stt),
                    SessionConfig::from_settings(&settings.transcription),
                ))
            }
            StageKind::Translation => {
                let translator = OpenAiTranslator::from_settings(&settings.translation)
                    .context("Invalid translation settings")?;
                info!(model = translator.model(), "translation provider ready");
                Arc::new(TranslationStage::new(
                    Arc::clone(bus),
                    Arc::new(translator),
                    settings.translation.context_window,
                ))
            }
            StageKind::Synthesis => {
                let synthesizer = ElevenLabs::from_settings(&settings.synthesis)
                    .context("Invalid synthesis settings")?;
                Arc::new(SynthesisStage::new(
                    Arc::clone(bus),
                    Arc::new(synthesizer),
                    build_room(settings, bus)?,
                    VoiceMap::from_settings(&settings.synthesis),
                ))
            }
        };
        stages.push(stage);
    }
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentialed() -> AmencastSettings {
        let mut settings = AmencastSettings::default();
        settings.bus.kind = BusKind::Memory;
        settings.transcription.api_key = Some("aai".into());
        settings.translation.api_key = Some("sk".into());
        settings.synthesis.api_key = Some("el".into());
        settings
    }

    #[tokio::test]
    async fn memory_bus_builds_without_network() {
        let bus = build_bus(&credentialed().bus).await;
        assert!(bus.is_ok());
    }

    #[tokio::test]
    async fn builds_every_stage_in_order() {
        let settings = credentialed();
        let bus = build_bus(&settings.bus).await.unwrap();
        let stages = build_stages(&settings, &StageKind::ALL, &bus).unwrap();
        let names: Vec<_> = stages.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["transcription", "translation", "synthesis"]);
        assert!(stages.iter().all(|s| s.active_streams() == 0));
    }

    #[tokio::test]
    async fn missing_key_fails_the_stage() {
        let mut settings = credentialed();
        settings.translation.api_key = None;
        let bus = build_bus(&settings.bus).await.unwrap();
        assert!(build_stages(&settings, &[StageKind::Translation], &bus).is_err());
        assert!(build_stages(&settings, &[StageKind::Synthesis], &bus).is_ok());
    }

    #[cfg(not(feature = "livekit"))]
    #[tokio::test]
    async fn livekit_room_requires_the_feature() {
        let mut settings = credentialed();
        settings.room.kind = RoomKind::Livekit;
        let bus = build_bus(&settings.bus).await.unwrap();
        let err = build_room(&settings, &bus).err().unwrap();
        assert!(err.to_string().contains("livekit"));
    }
}
