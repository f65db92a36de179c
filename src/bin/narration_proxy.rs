//! narration-proxy: HTTP front for chat-completion narration.
//!
//! `POST /generate-narration {content}` → `{narration}`. Listens on
//! `PORT` (default 5000).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use narrator_chat::config::Config;
use narrator_chat::proxy::{self, OpenAiCompleter, ProxyState};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "narration-proxy", about = "Narration generation proxy")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    narrator_chat::init_logging(args.verbose);

    let config = Config::load(args.config.as_deref());
    if config.proxy.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; upstream requests will be rejected");
    }
    info!("Using model {} at {}", config.proxy.model, config.proxy.base_url);

    let state = ProxyState {
        completer: Arc::new(OpenAiCompleter::new(&config.proxy)),
        system_prompt: config.proxy.system_prompt.clone(),
    };
    let port = args.port.unwrap_or(config.proxy.port);
    proxy::serve(state, port).await?;

    Ok(())
}
