//! One submission, end to end: narration → speech → orchestration run.
//!
//! Each step is awaited before the next. Failures are caught at the step
//! boundary and turned into a log line or a diagnostic message; the
//! processing guard is always released.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{OrchestrationConfig, SpeechConfig};
use crate::error::{OrchestrationError, SpeechError};
use crate::events::StreamEvent;
use crate::model::{ChatState, Message};
use crate::narration::NarrationSource;
use crate::orchestration::{Orchestrator, RunInput};
use crate::playback::{AudioOutput, PlaybackReport, StreamPlayer};
use crate::reducer::{reduce, Action};
use crate::speech::{SpeechConnection, SpeechRequest, SpeechSynthesizer};

/// Remote collaborators. `speech` and `audio` are optional so the shell can
/// run silently.
#[derive(Clone)]
pub struct Services {
    pub narration: Arc<dyn NarrationSource>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub audio: Option<Arc<dyn AudioOutput>>,
    pub orchestrator: Arc<dyn Orchestrator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed,
    /// Empty input or another submission still holds the guard.
    Rejected,
}

pub struct ChatSession {
    services: Services,
    speech_config: SpeechConfig,
    orchestration_config: OrchestrationConfig,
    state: ChatState,
    updates: Option<mpsc::UnboundedSender<Message>>,
}

impl ChatSession {
    pub fn new(
        services: Services,
        speech_config: SpeechConfig,
        orchestration_config: OrchestrationConfig,
    ) -> Self {
        Self {
            services,
            speech_config,
            orchestration_config,
            state: ChatState::default(),
            updates: None,
        }
    }

    /// Forward every appended message to `tx` as it lands in the log.
    pub fn with_updates(mut self, tx: mpsc::UnboundedSender<Message>) -> Self {
        self.updates = Some(tx);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn is_processing(&self) -> bool {
        self.state.processing
    }

    fn dispatch(&mut self, action: Action) {
        let before = self.state.messages.len();
        self.state = reduce(std::mem::take(&mut self.state), action);
        if let Some(tx) = &self.updates {
            for message in &self.state.messages[before..] {
                // Receiver gone means nobody is rendering; the log still holds it.
                let _ = tx.send(message.clone());
            }
        }
    }

    /// Run the full pipeline for one line of user input.
    pub async fn submit(&mut self, input: &str, cancel: CancellationToken) -> SubmitOutcome {
        if input.trim().is_empty() || self.state.processing {
            return SubmitOutcome::Rejected;
        }

        let t_total = Instant::now();
        self.dispatch(Action::Submit {
            input: input.to_string(),
        });

        let narration = self.narrate(input).await;

        if let Some(text) = narration {
            if !cancel.is_cancelled() {
                self.speak(&text, &cancel).await;
            }
        }

        if !cancel.is_cancelled() {
            if let Err(e) = self.run_chat(input, &cancel).await {
                warn!("Error in chat run: {e}");
            }
        }

        self.dispatch(Action::Finish);
        info!("Submission finished in {:.0}ms", t_total.elapsed().as_secs_f64() * 1000.0);
        SubmitOutcome::Completed
    }

    async fn narrate(&mut self, input: &str) -> Option<String> {
        match self.services.narration.narrate(input).await {
            Ok(text) => {
                self.dispatch(Action::NarrationReady(text.clone()));
                Some(text)
            }
            Err(e) => {
                warn!("Error generating narration: {e}");
                self.dispatch(Action::NarrationFailed);
                None
            }
        }
    }

    async fn speak(&mut self, text: &str, cancel: &CancellationToken) {
        let Some(speech) = self.services.speech.clone() else {
            debug!("Speech disabled, skipping audio");
            return;
        };

        match self.synthesize(speech.as_ref(), text, cancel).await {
            Ok(report) => debug!("Playback report: {report:?}"),
            Err(e) => {
                warn!("Error with speech synthesis: {e}");
                self.dispatch(Action::SpeechFailed);
            }
        }
    }

    async fn synthesize(
        &self,
        speech: &dyn SpeechSynthesizer,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PlaybackReport, SpeechError> {
        let mut connection = speech.connect().await?;
        let result = self.stream_speech(connection.as_mut(), text, cancel).await;
        connection.disconnect().await;
        result
    }

    async fn stream_speech(
        &self,
        connection: &mut dyn SpeechConnection,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PlaybackReport, SpeechError> {
        let request = SpeechRequest::new(&self.speech_config, text);
        connection.send(&request).await?;

        let Some(audio) = &self.services.audio else {
            debug!("No audio output, discarding synthesized speech");
            return Ok(PlaybackReport::default());
        };
        let mut sink = audio.open_sink(1, self.speech_config.sample_rate)?;

        info!("Playing stream...");
        let player = StreamPlayer::new(
            self.speech_config.sample_rate,
            Duration::from_millis(self.speech_config.buffer_ms),
        );
        let report = player.play(connection, sink.as_mut(), cancel).await?;
        info!("Done playing.");
        Ok(report)
    }

    async fn run_chat(&mut self, input: &str, cancel: &CancellationToken) -> Result<(), OrchestrationError> {
        let orchestrator = self.services.orchestrator.clone();

        let assistants = orchestrator.search_assistants().await?;
        let assistant = assistants.first().ok_or(OrchestrationError::NoAssistants)?;
        debug!("Using assistant {} of {}", assistant.assistant_id, assistants.len());

        let thread = orchestrator.create_thread().await?;
        let runs = orchestrator.list_runs(&thread.thread_id).await?;
        debug!("Thread {} has {} runs", thread.thread_id, runs.len());

        let run_input = RunInput::user_message(&self.orchestration_config.index_id, input);
        let mut events = orchestrator
            .stream_run(&thread.thread_id, &assistant.assistant_id, run_input)
            .await?;
        self.dispatch(Action::RunStarted);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Run on thread {} cancelled", thread.thread_id);
                    return Ok(());
                }
                next = events.next() => next,
            };

            match next {
                None | Some(Ok(StreamEvent::End)) => break,
                Some(Ok(StreamEvent::Error(message))) => return Err(OrchestrationError::Run(message)),
                Some(Ok(event)) => self.dispatch(Action::Stream(event)),
                Some(Err(e)) => return Err(e),
            }
        }

        info!("Run on thread {} complete", thread.thread_id);
        Ok(())
    }
}
