//! AssemblyAI streaming (v3) over `tokio-tungstenite`.
//!
//! Audio goes up as binary PCM frames. Finalized text arrives as `Turn`
//! messages with `end_of_turn` and `turn_is_formatted` both set. A graceful
//! close sends `{"type":"Terminate"}` and keeps reading until the server
//! closes, so trailing turns are not lost.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use amencast_core::StreamId;
use amencast_settings::TranscriptionSettings;

use crate::errors::TranscriptionError;
use crate::upstream::{SpeechToText, UpstreamCommand, UpstreamEvent, UpstreamPeer, UpstreamSession};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the socket drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported for a close frame without a status.
const NO_STATUS: u16 = 1005;

const TERMINATE: &str = r#"{"type":"Terminate"}"#;

/// Messages the v3 streaming endpoint sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Begin {
        #[serde(default)]
        id: Option<String>,
    },
    Turn {
        #[serde(default)]
        transcript: String,
        #[serde(default)]
        end_of_turn: bool,
        #[serde(default)]
        turn_is_formatted: bool,
    },
    Termination {
        #[serde(default)]
        audio_duration_seconds: Option<f64>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Map one text frame to a driver event, if it carries one.
fn parse_server_text(stream_id: &StreamId, text: &str) -> Option<UpstreamEvent> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Begin { id }) => {
            debug!(stream_id = %stream_id, session = ?id, "assemblyai session began");
            None
        }
        Ok(ServerMessage::Turn {
            transcript,
            end_of_turn,
            turn_is_formatted,
        }) => (end_of_turn && turn_is_formatted).then_some(UpstreamEvent::Transcript(transcript)),
        Ok(ServerMessage::Termination {
            audio_duration_seconds,
        }) => {
            info!(stream_id = %stream_id, ?audio_duration_seconds, "assemblyai session terminated");
            None
        }
        Ok(ServerMessage::Other) => None,
        Err(_) => serde_json::from_str::<ErrorBody>(text)
            .ok()
            .map(|e| UpstreamEvent::Error(e.error)),
    }
}

fn close_code(frame: Option<&CloseFrame>) -> (u16, String) {
    frame.map_or((NO_STATUS, String::new()), |f| {
        (u16::from(f.code), f.reason.to_string())
    })
}

/// AssemblyAI streaming connector.
#[derive(Clone, Debug)]
pub struct AssemblyAi {
    api_key: String,
    url: String,
    connect_timeout: Duration,
}

impl AssemblyAi {
    /// Build a connector from settings.
    ///
    /// # Errors
    ///
    /// Fails when no API key is configured.
    pub fn from_settings(settings: &TranscriptionSettings) -> Result<Self, TranscriptionError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TranscriptionError::InvalidRequest("missing API key".into()))?;
        Ok(Self {
            api_key,
            url: format!(
                "{}?sample_rate={}&encoding=pcm_s16le&format_turns=true",
                settings.base_url, settings.sample_rate
            ),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
        })
    }

    /// The full endpoint URL including query parameters.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SpeechToText for AssemblyAi {
    async fn connect(&self, stream_id: &StreamId) -> Result<UpstreamSession, TranscriptionError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TranscriptionError::InvalidRequest(e.to_string()))?;
        let auth = HeaderValue::from_str(&self.api_key)
            .map_err(|e| TranscriptionError::InvalidRequest(e.to_string()))?;
        let _ = request.headers_mut().insert("Authorization", auth);

        let timeout_ms = u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX);
        let (ws, _) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| TranscriptionError::Timeout { timeout_ms })?
            .map_err(|e| TranscriptionError::Connect(e.to_string()))?;

        debug!(stream_id = %stream_id, "assemblyai websocket open");
        let (session, peer) = UpstreamSession::pair();
        let _handle = tokio::spawn(pump(stream_id.clone(), ws, peer));
        Ok(session)
    }
}

/// Shuttle commands and frames until either side closes.
async fn pump(stream_id: StreamId, ws: WsStream, mut peer: UpstreamPeer) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut closing = false;

    let (code, reason) = loop {
        tokio::select! {
            cmd = peer.commands.recv() => {
                match cmd {
                    // Nothing more goes up once Terminate has been sent.
                    Some(UpstreamCommand::Audio(_) | UpstreamCommand::Close) if closing => {}
                    Some(UpstreamCommand::Audio(pcm)) => {
                        if let Err(e) = ws_tx.send(Message::Binary(pcm)).await {
                            break (ABNORMAL_CLOSURE, e.to_string());
                        }
                    }
                    Some(UpstreamCommand::Close) => {
                        closing = true;
                        if let Err(e) = ws_tx.send(Message::Text(TERMINATE.into())).await {
                            break (ABNORMAL_CLOSURE, e.to_string());
                        }
                    }
                    Some(UpstreamCommand::Abort) | None => {
                        let _ = ws_tx.close().await;
                        debug!(stream_id = %stream_id, "assemblyai session aborted");
                        return;
                    }
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_server_text(&stream_id, &text) {
                            let _ = peer.events.send(event);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => break close_code(frame.as_ref()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(stream_id = %stream_id, error = %e, "assemblyai socket error");
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                    None => break (ABNORMAL_CLOSURE, "stream ended".to_owned()),
                }
            }
        }
    };

    debug!(stream_id = %stream_id, code, reason = %reason, "assemblyai websocket closed");
    let _ = peer.events.send(UpstreamEvent::Closed { code, reason });
}
