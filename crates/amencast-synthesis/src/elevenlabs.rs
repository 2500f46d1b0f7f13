//! ElevenLabs streaming text-to-speech.
//!
//! `POST {base}/v1/text-to-speech/{voice}/stream?output_format=..` with the
//! `xi-api-key` header. The streamed body is collected whole; sentences are
//! short enough that per-chunk decoding buys nothing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;

use amencast_settings::SynthesisSettings;

use crate::errors::SynthesisError;
use crate::synthesizer::{AudioEncoding, SpeechSynthesizer, SynthesizedAudio};

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs speech provider.
#[derive(Clone, Debug)]
pub struct ElevenLabs {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    output_format: String,
    encoding: AudioEncoding,
    voice_settings: VoiceSettings,
}

impl ElevenLabs {
    /// Build from settings. Fails without an API key or with an output
    /// format the decoder cannot handle.
    pub fn from_settings(settings: &SynthesisSettings) -> Result<Self, SynthesisError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(SynthesisError::MissingApiKey)?;
        let encoding = AudioEncoding::from_output_format(&settings.output_format)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id: settings.model_id.clone(),
            output_format: settings.output_format.clone(),
            encoding,
            voice_settings: VoiceSettings {
                stability: settings.stability,
                similarity_boost: settings.similarity_boost,
            },
        })
    }

    fn accept(&self) -> &'static str {
        match self.encoding {
            AudioEncoding::Pcm { .. } => "audio/pcm",
            AudioEncoding::Compressed { .. } => "audio/mpeg",
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabs {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let url = format!("{}/v1/text-to-speech/{voice_id}/stream", self.base_url);
        let body = SpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: self.voice_settings,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("output_format", self.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .header(ACCEPT, self.accept())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data = response.bytes().await?;
        debug!(voice_id, bytes = data.len(), "speech synthesized");
        Ok(SynthesizedAudio {
            data,
            encoding: self.encoding.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, format: &str) -> SynthesisSettings {
        SynthesisSettings {
            api_key: Some("xi-test".into()),
            base_url: server.uri(),
            output_format: format.into(),
            ..SynthesisSettings::default()
        }
    }

    #[tokio::test]
    async fn posts_text_and_returns_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1/stream"))
            .and(query_param("output_format", "pcm_16000"))
            .and(header("xi-api-key", "xi-test"))
            .and(body_partial_json(serde_json::json!({
                "text": "Hola",
                "model_id": "eleven_multilingual_v2",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 0, 2, 0]))
            .expect(1)
            .mount(&server)
            .await;

        let tts = ElevenLabs::from_settings(&settings(&server, "pcm_16000")).unwrap();
        let audio = tts.synthesize("Hola", "voice-1").await.unwrap();
        assert_eq!(&audio.data[..], &[1, 0, 2, 0]);
        assert_eq!(audio.encoding, AudioEncoding::Pcm { sample_rate: 16_000 });

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        let stability = body["voice_settings"]["stability"].as_f64().unwrap();
        assert!((stability - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn api_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let tts = ElevenLabs::from_settings(&settings(&server, "mp3_44100_128")).unwrap();
        let err = tts.synthesize("Hola", "voice-1").await.unwrap_err();
        assert_matches!(err, SynthesisError::Api { status: 429, .. });
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = ElevenLabs::from_settings(&SynthesisSettings::default()).unwrap_err();
        assert_matches!(err, SynthesisError::MissingApiKey);
    }

    #[test]
    fn unsupported_format_is_rejected_up_front() {
        let s = SynthesisSettings {
            api_key: Some("k".into()),
            output_format: "ulaw_8000".into(),
            ..SynthesisSettings::default()
        };
        assert_matches!(
            ElevenLabs::from_settings(&s),
            Err(SynthesisError::UnsupportedFormat(_))
        );
    }
}
