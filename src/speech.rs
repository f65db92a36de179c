//! Cartesia streaming TTS over WebSocket.
//!
//! connect → send one transcript → pull audio chunks until `done` → disconnect.

use async_trait::async_trait;
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::error::SpeechError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFormat {
    pub container: String,
    pub encoding: String,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSelection {
    pub mode: String,
    pub id: String,
}

/// One synthesis request, serialized as Cartesia's websocket payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub context_id: String,
    pub model_id: String,
    pub transcript: String,
    pub voice: VoiceSelection,
    pub output_format: OutputFormat,
}

impl SpeechRequest {
    pub fn new(config: &SpeechConfig, transcript: &str) -> Self {
        Self {
            context_id: uuid::Uuid::new_v4().to_string(),
            model_id: config.model_id.clone(),
            transcript: transcript.to_string(),
            voice: VoiceSelection {
                mode: "id".into(),
                id: config.voice_id.clone(),
            },
            output_format: OutputFormat {
                container: config.container.clone(),
                encoding: config.encoding.clone(),
                sample_rate: config.sample_rate,
            },
        }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SpeechConnection>, SpeechError>;
}

/// An open synthesis session. `next_chunk` is the readable audio source.
#[async_trait]
pub trait SpeechConnection: Send {
    async fn send(&mut self, request: &SpeechRequest) -> Result<(), SpeechError>;

    /// Next audio chunk, `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, SpeechError>>;

    async fn disconnect(&mut self);
}

pub struct CartesiaClient {
    url: String,
    api_key: String,
    version: String,
}

impl CartesiaClient {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            version: config.version.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CartesiaClient {
    async fn connect(&self) -> Result<Box<dyn SpeechConnection>, SpeechError> {
        if self.api_key.is_empty() {
            return Err(SpeechError::NotConfigured("CARTESIA_API_KEY is not set"));
        }

        let url = format!(
            "{}?api_key={}&cartesia_version={}",
            self.url, self.api_key, self.version
        );
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        info!("Connected to speech service at {}", self.url);

        Ok(Box::new(CartesiaConnection {
            socket,
            context_id: None,
            done: false,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ServerFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    context_id: Option<String>,
}

enum Frame {
    Audio(Vec<u8>),
    Done,
    Failed(SpeechError),
    Skip,
}

fn decode_frame(text: &str) -> Frame {
    let frame: ServerFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => return Frame::Failed(SpeechError::Protocol(format!("unreadable frame: {e}"))),
    };

    match frame.kind.as_str() {
        "chunk" => {
            let data = frame.data.unwrap_or_default();
            match base64::engine::general_purpose::STANDARD.decode(data.as_bytes()) {
                Ok(bytes) => Frame::Audio(bytes),
                Err(e) => Frame::Failed(SpeechError::Decode(e.to_string())),
            }
        }
        "done" => Frame::Done,
        "error" => Frame::Failed(SpeechError::Remote(
            frame.error.unwrap_or_else(|| "unknown error".into()),
        )),
        other => {
            debug!("Ignoring speech frame '{other}' (context {:?})", frame.context_id);
            Frame::Skip
        }
    }
}

struct CartesiaConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    context_id: Option<String>,
    done: bool,
}

#[async_trait]
impl SpeechConnection for CartesiaConnection {
    async fn send(&mut self, request: &SpeechRequest) -> Result<(), SpeechError> {
        let payload = serde_json::to_string(request)
            .map_err(|e| SpeechError::Protocol(e.to_string()))?;
        self.socket.send(WsMessage::Text(payload.into())).await?;
        self.context_id = Some(request.context_id.clone());
        self.done = false;
        debug!("Sent transcript ({} chars)", request.transcript.len());
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, SpeechError>> {
        if self.done {
            return None;
        }

        loop {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    return Some(Err(SpeechError::Closed));
                }
            };

            match message {
                WsMessage::Text(text) => match decode_frame(text.as_str()) {
                    Frame::Audio(bytes) => return Some(Ok(bytes)),
                    Frame::Done => {
                        self.done = true;
                        return None;
                    }
                    Frame::Failed(e) => {
                        if !e.is_chunk_local() {
                            self.done = true;
                        }
                        return Some(Err(e));
                    }
                    Frame::Skip => continue,
                },
                WsMessage::Binary(bytes) => return Some(Ok(bytes.to_vec())),
                WsMessage::Close(_) => {
                    self.done = true;
                    return None;
                }
                _ => continue,
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!("Speech socket close: {e}");
        }
        if let Some(context_id) = self.context_id.take() {
            debug!("Closed speech context {context_id}");
        }
    }
}
