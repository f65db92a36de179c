//! LangGraph server API client: assistants, threads, runs and the
//! message-level event stream.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::OrchestrationConfig;
use crate::error::OrchestrationError;
use crate::events::StreamEvent;

#[derive(Debug, Clone, Deserialize)]
pub struct Assistant {
    pub assistant_id: String,
    #[serde(default)]
    pub graph_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub thread_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInput {
    pub chat_history: Vec<ChatTurn>,
}

impl RunInput {
    /// A single user turn, prefixed with the collection identifier.
    pub fn user_message(index_id: &str, text: &str) -> Self {
        let content = if index_id.is_empty() {
            text.to_string()
        } else {
            format!("{index_id} {text}")
        };
        Self {
            chat_history: vec![ChatTurn {
                kind: "user".into(),
                content,
            }],
        }
    }
}

pub type EventStream = BoxStream<'static, Result<StreamEvent, OrchestrationError>>;

#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn search_assistants(&self) -> Result<Vec<Assistant>, OrchestrationError>;
    async fn create_thread(&self) -> Result<Thread, OrchestrationError>;
    async fn list_runs(&self, thread_id: &str) -> Result<Vec<RunInfo>, OrchestrationError>;
    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        input: RunInput,
    ) -> Result<EventStream, OrchestrationError>;
}

pub struct LangGraphClient {
    api_url: String,
    stream_mode: String,
    client: Client,
}

impl LangGraphClient {
    pub fn new(config: &OrchestrationConfig) -> Self {
        // No overall timeout: runs stream for as long as the graph executes.
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            stream_mode: config.stream_mode.clone(),
            client,
        }
    }

    async fn send(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, OrchestrationError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(OrchestrationError::Status {
                status: resp.status().as_u16(),
                path: path.to_string(),
            });
        }
        Ok(resp)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, OrchestrationError> {
        let url = format!("{}{path}", self.api_url);
        let resp = self.send(path, self.client.post(&url).json(&body)).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Orchestrator for LangGraphClient {
    async fn search_assistants(&self) -> Result<Vec<Assistant>, OrchestrationError> {
        self.post_json("/assistants/search", json!({})).await
    }

    async fn create_thread(&self) -> Result<Thread, OrchestrationError> {
        self.post_json("/threads", json!({})).await
    }

    async fn list_runs(&self, thread_id: &str) -> Result<Vec<RunInfo>, OrchestrationError> {
        let path = format!("/threads/{thread_id}/runs");
        let url = format!("{}{path}", self.api_url);
        let resp = self.send(&path, self.client.get(&url)).await?;
        Ok(resp.json().await?)
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        input: RunInput,
    ) -> Result<EventStream, OrchestrationError> {
        let path = format!("/threads/{thread_id}/runs/stream");
        let url = format!("{}{path}", self.api_url);
        let body = json!({
            "assistant_id": assistant_id,
            "input": input,
            "stream_mode": self.stream_mode,
        });

        let resp = self
            .send(
                &path,
                self.client
                    .post(&url)
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(&body),
            )
            .await?;
        debug!("Streaming run on thread {thread_id}");

        let events = resp
            .bytes_stream()
            .eventsource()
            .filter_map(|item| async move {
                match item {
                    Ok(event) => StreamEvent::parse(&event.event, &event.data).map(Ok),
                    Err(e) => Some(Err(OrchestrationError::Stream(e.to_string()))),
                }
            });
        Ok(events.boxed())
    }
}
