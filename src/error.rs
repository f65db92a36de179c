//! Error types for each external boundary.

/// Errors from the narration proxy client.
#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("narration request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("narration proxy returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Errors from the speech synthesis session.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesis is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("speech websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("speech protocol error: {0}")]
    Protocol(String),

    #[error("speech service error: {0}")]
    Remote(String),

    /// One audio chunk could not be decoded; the session is still usable.
    #[error("audio chunk decode error: {0}")]
    Decode(String),

    #[error("speech connection closed")]
    Closed,

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl SpeechError {
    /// Whether the error only affects a single chunk.
    pub fn is_chunk_local(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Errors from the local audio output device.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to open audio output: {0}")]
    Device(String),
}

/// Errors from the conversation orchestration API.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("orchestration request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("orchestration API returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("no assistants available")]
    NoAssistants,

    #[error("event stream error: {0}")]
    Stream(String),

    #[error("run failed upstream: {0}")]
    Run(String),
}

/// Errors raised while handling a proxy request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("chat completion request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("chat completion API returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("chat completion returned no content")]
    EmptyCompletion,
}
