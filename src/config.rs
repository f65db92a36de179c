//! Configuration management for narrator-chat.
//!
//! Loads config from YAML files in standard locations, then applies
//! environment overrides for API keys, ports and service URLs.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Full URL of the narration proxy endpoint.
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000/generate-narration".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub api_key: String,
    pub url: String,
    pub version: String,
    pub model_id: String,
    pub voice_id: String,
    pub container: String,
    pub encoding: String,
    pub sample_rate: u32,
    /// Audio buffered before playback starts, in milliseconds.
    pub buffer_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            url: "wss://api.cartesia.ai/tts/websocket".into(),
            version: "2024-06-10".into(),
            model_id: "sonic-english".into(),
            voice_id: "a0e99841-438c-4a64-b679-ae501e7d6091".into(),
            container: "raw".into(),
            encoding: "pcm_f32le".into(),
            sample_rate: 44100,
            buffer_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub api_url: String,
    /// Collection identifier prefixed onto every user message sent upstream.
    pub index_id: String,
    pub stream_mode: String,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8123".into(),
            index_id: "65eff59e6dc02a0c6004a058".into(),
            stream_mode: "messages".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub port: u16,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-3.5-turbo".into(),
            system_prompt: "You are a video creator.".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub narration: NarrationConfig,
    pub speech: SpeechConfig,
    pub orchestration: OrchestrationConfig,
    pub proxy: ProxyConfig,
}

impl Config {
    /// Load configuration from a YAML file and the process environment.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/narrator-chat/config.yaml
    /// 3. /etc/narrator-chat/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::load_file(path);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/narrator-chat/config.yaml")),
                Some(PathBuf::from("/etc/narrator-chat/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY").or_else(|| non_empty("REACT_APP_OPENAI_API_KEY")) {
            self.proxy.api_key = key;
        }
        if let Some(key) = non_empty("CARTESIA_API_KEY") {
            self.speech.api_key = key;
        }
        if let Some(port) = non_empty("PORT") {
            match port.trim().parse() {
                Ok(port) => self.proxy.port = port,
                Err(e) => tracing::warn!("Ignoring invalid PORT {port:?}: {e}"),
            }
        }
        if let Some(url) = non_empty("LANGGRAPH_API_URL") {
            self.orchestration.api_url = url;
        }
        if let Some(url) = non_empty("NARRATION_URL") {
            self.narration.url = url;
        }
    }
}
