//! narrator-chat: terminal chat shell.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use narrator_chat::config::Config;
use narrator_chat::narration::NarrationClient;
use narrator_chat::orchestration::LangGraphClient;
use narrator_chat::pipeline::{ChatSession, Services};
use narrator_chat::playback::{AudioOutput, RodioOutput};
use narrator_chat::shell::Shell;
use narrator_chat::speech::{CartesiaClient, SpeechSynthesizer};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "narrator-chat", about = "Narrated multi-agent chat shell")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip speech synthesis and audio playback
    #[arg(long)]
    no_audio: bool,

    /// Send a single message and exit
    #[arg(long, value_name = "TEXT")]
    once: Option<String>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    narrator_chat::init_logging(args.verbose);

    info!("narrator-chat starting");

    let config = Config::load(args.config.as_deref());
    info!(
        "Narration: {}, orchestration: {}",
        config.narration.url, config.orchestration.api_url
    );

    let speech_enabled = config.speech.enabled && !args.no_audio;
    let speech: Option<Arc<dyn SpeechSynthesizer>> =
        speech_enabled.then(|| Arc::new(CartesiaClient::new(&config.speech)) as Arc<dyn SpeechSynthesizer>);

    let audio: Option<Arc<dyn AudioOutput>> = if speech_enabled {
        match RodioOutput::open() {
            Ok(output) => Some(Arc::new(output)),
            Err(e) => {
                warn!("{e}");
                info!("Audio disabled, continuing without playback");
                None
            }
        }
    } else {
        None
    };

    let services = Services {
        narration: Arc::new(NarrationClient::new(&config.narration)),
        speech,
        audio,
        orchestrator: Arc::new(LangGraphClient::new(&config.orchestration)),
    };
    let session = ChatSession::new(services, config.speech.clone(), config.orchestration.clone());
    let shell = Shell::new(session);

    match args.once {
        Some(text) => shell.run_once(&text).await,
        None => shell.run().await?,
    }

    Ok(())
}
