//! Narration proxy: a single-endpoint HTTP server in front of a
//! chat-completion API.
//!
//! `POST /generate-narration {content}` → `{narration}` or `500 {error}`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::narration::{NarrationRequest, NarrationResponse};

const PROMPT_TEMPLATE: &str =
    r#"Narrate how you would use the input "{content}" to create a video. Only use one sentence."#;

pub fn narration_prompt(content: &str) -> String {
    PROMPT_TEMPLATE.replace("{content}", content)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Upstream chat-completion backend.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ProxyError>;
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<ChatMessageOut>,
}

#[derive(Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiCompleter {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiCompleter {
    pub fn new(config: &ProxyConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        }
    }
}

#[async_trait]
impl ChatCompleter for OpenAiCompleter {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ProxyError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let data: CompletionResponse = resp.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ProxyError::EmptyCompletion)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = NarrationResponse {
            narration: None,
            error: Some(self.to_string()),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct ProxyState {
    pub completer: Arc<dyn ChatCompleter>,
    pub system_prompt: String,
}

/// Build the axum router.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/generate-narration", post(handle_generate_narration))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the proxy until the listener fails.
pub async fn serve(state: ProxyState, port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on port {port}");
    axum::serve(listener, router(state)).await
}

async fn handle_generate_narration(
    State(state): State<ProxyState>,
    Json(req): Json<NarrationRequest>,
) -> Result<Json<NarrationResponse>, ProxyError> {
    let preview: String = req.content.chars().take(80).collect();
    info!("POST /generate-narration: \"{}\"", preview.replace('\n', " "));

    let messages = vec![
        ChatMessage::new("system", state.system_prompt.clone()),
        ChatMessage::new("user", narration_prompt(&req.content)),
    ];

    let narration = state.completer.complete(messages).await.map_err(|e| {
        warn!("Narration generation failed: {e}");
        e
    })?;

    Ok(Json(NarrationResponse {
        narration: Some(narration),
        error: None,
    }))
}
