//! narrator-chat: narrated multi-agent chat.
//!
//! A user line is narrated by an LLM (through the narration proxy), spoken
//! through Cartesia TTS, then sent to a LangGraph multi-agent run whose
//! streamed messages are folded into the chat log.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod narration;
pub mod orchestration;
pub mod pipeline;
pub mod playback;
pub mod proxy;
pub mod reducer;
pub mod shell;
pub mod speech;

use tracing_subscriber::EnvFilter;

/// Initialize logging to stderr (suppress noisy HTTP/websocket internals).
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info,tokio_tungstenite=info,tungstenite=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn,tokio_tungstenite=warn,tungstenite=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
