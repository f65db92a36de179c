//! Shared fakes: an axum stand-in for the narration proxy and LangGraph
//! server, plus scripted speech and audio components.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use narrator_chat::config::{NarrationConfig, OrchestrationConfig, SpeechConfig};
use narrator_chat::error::{AudioError, SpeechError};
use narrator_chat::narration::NarrationClient;
use narrator_chat::orchestration::LangGraphClient;
use narrator_chat::pipeline::{ChatSession, Services};
use narrator_chat::playback::{AudioOutput, SampleSink};
use narrator_chat::speech::{SpeechConnection, SpeechRequest, SpeechSynthesizer};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const INDEX_ID: &str = "idx-test";

pub async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Render SSE frames the way the LangGraph server writes them.
pub fn sse(events: &[(&str, Value)]) -> String {
    events
        .iter()
        .map(|(name, data)| format!("event: {name}\ndata: {data}\n\n"))
        .collect()
}

pub fn routing_item(worker: &str) -> Value {
    json!({
        "type": "AIMessageChunk",
        "content": "",
        "additional_kwargs": {
            "function_call": {
                "name": "route",
                "arguments": format!("{{\"next_worker\": \"{worker}\"}}")
            }
        },
        "response_metadata": {}
    })
}

pub fn finished_item(text: &str) -> Value {
    json!({
        "type": "ai",
        "content": text,
        "response_metadata": {"finish_reason": "stop"}
    })
}

#[derive(Clone)]
pub struct Upstream {
    narration: Arc<Mutex<(StatusCode, Value)>>,
    stream_body: Arc<Mutex<String>>,
    stall: Arc<Mutex<bool>>,
    pub narration_requests: Arc<Mutex<Vec<Value>>>,
    pub run_requests: Arc<Mutex<Vec<Value>>>,
}

impl Upstream {
    pub fn new() -> Self {
        Self {
            narration: Arc::new(Mutex::new((
                StatusCode::OK,
                json!({"narration": "A cat video..."}),
            ))),
            stream_body: Arc::new(Mutex::new(sse(&[("end", Value::Null)]))),
            stall: Arc::default(),
            narration_requests: Arc::default(),
            run_requests: Arc::default(),
        }
    }

    pub fn narration_reply(self, status: StatusCode, body: Value) -> Self {
        *self.narration.lock().unwrap() = (status, body);
        self
    }

    pub fn stream(self, events: &[(&str, Value)]) -> Self {
        *self.stream_body.lock().unwrap() = sse(events);
        self
    }

    /// Keep the run stream open after the scripted events instead of closing it.
    pub fn stall_after_stream(self) -> Self {
        *self.stall.lock().unwrap() = true;
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/generate-narration", post(narrate))
            .route("/assistants/search", post(search_assistants))
            .route("/threads", post(create_thread))
            .route("/threads/{thread_id}/runs", get(list_runs))
            .route("/threads/{thread_id}/runs/stream", post(stream_run))
            .with_state(self.clone())
    }

    pub async fn start(&self) -> String {
        spawn_server(self.router()).await
    }
}

async fn narrate(State(up): State<Upstream>, Json(body): Json<Value>) -> impl IntoResponse {
    up.narration_requests.lock().unwrap().push(body);
    let (status, reply) = up.narration.lock().unwrap().clone();
    (status, Json(reply))
}

async fn search_assistants() -> Json<Value> {
    Json(json!([
        {"assistant_id": "asst-1", "graph_id": "supervisor"},
        {"assistant_id": "asst-2", "graph_id": "other"}
    ]))
}

async fn create_thread() -> Json<Value> {
    Json(json!({"thread_id": "thread-1"}))
}

async fn list_runs(Path(_thread_id): Path<String>) -> Json<Value> {
    Json(json!([]))
}

async fn stream_run(
    State(up): State<Upstream>,
    Path(thread_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    up.run_requests
        .lock()
        .unwrap()
        .push(json!({"thread_id": thread_id, "body": body}));
    let payload = up.stream_body.lock().unwrap().clone();
    let content_type = [(header::CONTENT_TYPE, "text/event-stream")];

    if *up.stall.lock().unwrap() {
        let body = stream::once(async move { Ok::<_, Infallible>(payload) }).chain(stream::pending());
        (content_type, Body::from_stream(body)).into_response()
    } else {
        (content_type, payload).into_response()
    }
}

// --- Speech and audio fakes ---

#[derive(Default)]
pub struct SpeechLog {
    pub connects: usize,
    pub requests: Vec<SpeechRequest>,
    pub disconnects: usize,
}

/// Speech service whose connect either fails or replays scripted chunks.
pub struct ScriptedSpeech {
    pub log: Arc<Mutex<SpeechLog>>,
    chunks: Option<Vec<Result<Vec<u8>, String>>>,
}

impl ScriptedSpeech {
    pub fn refusing() -> Self {
        Self {
            log: Arc::default(),
            chunks: None,
        }
    }

    /// `Err` entries become chunk-local decode errors.
    pub fn with_chunks(chunks: Vec<Result<Vec<u8>, String>>) -> Self {
        Self {
            log: Arc::default(),
            chunks: Some(chunks),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSpeech {
    async fn connect(&self) -> Result<Box<dyn SpeechConnection>, SpeechError> {
        self.log.lock().unwrap().connects += 1;
        let Some(chunks) = &self.chunks else {
            return Err(SpeechError::Protocol("connection refused".into()));
        };
        Ok(Box::new(ScriptedConnection {
            log: self.log.clone(),
            pending: chunks.iter().cloned().collect(),
        }))
    }
}

pub struct ScriptedConnection {
    log: Arc<Mutex<SpeechLog>>,
    pending: VecDeque<Result<Vec<u8>, String>>,
}

impl ScriptedConnection {
    pub fn new(chunks: Vec<Result<Vec<u8>, String>>) -> Self {
        Self {
            log: Arc::default(),
            pending: chunks.into(),
        }
    }
}

#[async_trait]
impl SpeechConnection for ScriptedConnection {
    async fn send(&mut self, request: &SpeechRequest) -> Result<(), SpeechError> {
        self.log.lock().unwrap().requests.push(request.clone());
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, SpeechError>> {
        self.pending
            .pop_front()
            .map(|chunk| chunk.map_err(SpeechError::Decode))
    }

    async fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Queued(Vec<f32>),
    Started,
    Drained,
}

#[derive(Default, Clone)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<SinkEvent>>>,
}

#[async_trait]
impl SampleSink for RecordingSink {
    fn queue(&mut self, samples: Vec<f32>) {
        self.events.lock().unwrap().push(SinkEvent::Queued(samples));
    }

    fn start(&mut self) {
        self.events.lock().unwrap().push(SinkEvent::Started);
    }

    async fn drain(&mut self, cancel: &CancellationToken) -> bool {
        self.events.lock().unwrap().push(SinkEvent::Drained);
        cancel.is_cancelled()
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    pub opened: Mutex<usize>,
    pub sink: RecordingSink,
}

impl AudioOutput for RecordingAudio {
    fn open_sink(&self, _channels: u16, _sample_rate: u32) -> Result<Box<dyn SampleSink>, AudioError> {
        *self.opened.lock().unwrap() += 1;
        Ok(Box::new(self.sink.clone()))
    }
}

pub fn pcm(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn session(
    base_url: &str,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    audio: Option<Arc<dyn AudioOutput>>,
) -> ChatSession {
    session_split(base_url, base_url, speech, audio)
}

pub fn session_split(
    narration_base: &str,
    orchestration_base: &str,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    audio: Option<Arc<dyn AudioOutput>>,
) -> ChatSession {
    let narration = NarrationConfig {
        url: format!("{narration_base}/generate-narration"),
        timeout_secs: 5,
    };
    let orchestration = OrchestrationConfig {
        api_url: orchestration_base.to_string(),
        index_id: INDEX_ID.to_string(),
        ..OrchestrationConfig::default()
    };
    let speech_config = SpeechConfig {
        sample_rate: 4,
        buffer_ms: 1000,
        ..SpeechConfig::default()
    };

    let services = Services {
        narration: Arc::new(NarrationClient::new(&narration)),
        speech,
        audio,
        orchestrator: Arc::new(LangGraphClient::new(&orchestration)),
    };
    ChatSession::new(services, speech_config, orchestration)
}
