//! Typed view of the LangGraph `stream_mode: "messages"` event stream.
//!
//! Raw SSE events are parsed here into [`StreamEvent`] so the reducer never
//! touches untyped JSON. Shapes we do not understand are logged and dropped.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// One event from a run's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Metadata(Value),
    PartialMessages(Vec<MessageItem>),
    Error(String),
    End,
}

impl StreamEvent {
    /// Parse a raw SSE event. Returns `None` for events the reducer ignores.
    pub fn parse(event: &str, data: &str) -> Option<Self> {
        match event {
            "metadata" => {
                let value = serde_json::from_str(data).unwrap_or(Value::String(data.to_string()));
                Some(Self::Metadata(value))
            }
            "messages/partial" => match serde_json::from_str::<Value>(data) {
                Ok(Value::Array(items)) => Some(Self::PartialMessages(
                    items.into_iter().filter_map(MessageItem::from_value).collect(),
                )),
                Ok(other) => {
                    warn!("messages/partial payload is not an array: {other}");
                    None
                }
                Err(e) => {
                    warn!("Malformed messages/partial payload: {e}");
                    None
                }
            },
            "error" => {
                let message = serde_json::from_str::<Value>(data)
                    .ok()
                    .and_then(|v| {
                        v.get("message")
                            .or_else(|| v.get("error"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| data.to_string());
                Some(Self::Error(message))
            }
            "end" => Some(Self::End),
            other => {
                debug!("Skipping stream event '{other}'");
                None
            }
        }
    }
}

/// A message as it appears inside a `messages/partial` batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageItem {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub additional_kwargs: AdditionalKwargs,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AdditionalKwargs {
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: Option<String>,
    /// Usually a JSON-encoded string, possibly a truncated fragment mid-stream.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct RouteArguments {
    #[serde(default)]
    next_worker: Option<String>,
}

impl MessageItem {
    fn from_value(value: Value) -> Option<Self> {
        match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed message item: {e}");
                None
            }
        }
    }

    /// Messages echoed back from the human side of the conversation.
    pub fn is_from_user(&self) -> bool {
        self.role.as_deref() == Some("user") || self.kind.as_deref() == Some("human")
    }

    pub fn is_finished(&self) -> bool {
        self.response_metadata.finish_reason.as_deref() == Some("stop")
    }

    pub fn text(&self) -> String {
        match &self.content {
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Blocks(blocks)) => blocks
                .iter()
                .filter_map(|b| b.text.as_deref())
                .collect::<Vec<_>>()
                .concat(),
            None => String::new(),
        }
    }

    /// Worker named by the supervisor's routing call, if this item carries one.
    pub fn next_worker(&self) -> Option<String> {
        let arguments = &self.additional_kwargs.function_call.as_ref()?.arguments;
        match arguments {
            Value::String(raw) => extract_next_worker(raw),
            Value::Object(map) => map
                .get("next_worker")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Pull `next_worker` out of a function-call argument string.
///
/// Complete JSON is read through the typed schema; the regex only covers
/// fragments that do not parse yet.
pub fn extract_next_worker(arguments: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<RouteArguments>(arguments) {
        return parsed.next_worker.filter(|name| !name.is_empty());
    }

    static NEXT_WORKER: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = NEXT_WORKER
        .get_or_init(|| Regex::new(r#""next_worker"\s*:\s*"([^"]+)""#).ok())
        .as_ref()?;
    pattern
        .captures(arguments)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
