//! Pure state transitions for the chat log.
//!
//! Every user action and every stream event is folded through [`reduce`],
//! which takes the current [`ChatState`] by value and returns the next one.

use tracing::debug;

use crate::events::{MessageItem, StreamEvent};
use crate::model::{ChatState, Message, RunContext};

pub const NARRATION_ERROR_TEXT: &str = "Error generating OpenAI narration.";
pub const SPEECH_ERROR_TEXT: &str = "Error with Cartesia WebSocket.";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// User submitted a line; opens a run and takes the processing guard.
    Submit { input: String },
    NarrationReady(String),
    NarrationFailed,
    SpeechFailed,
    /// The orchestration stream is about to be consumed.
    RunStarted,
    Stream(StreamEvent),
    /// Releases the processing guard, whatever the outcome.
    Finish,
}

pub fn reduce(mut state: ChatState, action: Action) -> ChatState {
    match action {
        Action::Submit { input } => {
            state.messages.push(Message::user(input.clone()));
            state.processing = true;
            state.run = Some(RunContext {
                question: input,
                attributed_agent: String::new(),
            });
        }
        Action::NarrationReady(text) => state.messages.push(Message::narrator(text)),
        Action::NarrationFailed => state.messages.push(Message::narrator(NARRATION_ERROR_TEXT)),
        Action::SpeechFailed => state.messages.push(Message::narrator(SPEECH_ERROR_TEXT)),
        Action::RunStarted => {
            if let Some(run) = state.run.as_mut() {
                run.attributed_agent.clear();
            }
        }
        Action::Stream(event) => state = apply_event(state, event),
        Action::Finish => {
            state.processing = false;
            state.run = None;
        }
    }
    state
}

fn apply_event(mut state: ChatState, event: StreamEvent) -> ChatState {
    let Some(mut run) = state.run.take() else {
        debug!("Dropping stream event outside of a run");
        return state;
    };

    match event {
        StreamEvent::Metadata(metadata) => debug!("Run metadata: {metadata}"),
        StreamEvent::PartialMessages(items) => {
            for item in items {
                apply_item(&mut state, &mut run, item);
            }
        }
        // Terminal events are handled by the stream consumer.
        StreamEvent::Error(_) | StreamEvent::End => {}
    }

    state.run = Some(run);
    state
}

fn apply_item(state: &mut ChatState, run: &mut RunContext, item: MessageItem) {
    if item.is_from_user() {
        debug!("Human: {}", item.text());
        return;
    }

    if let Some(worker) = item.next_worker() {
        run.attributed_agent = worker;
    }

    if !item.is_finished() {
        return;
    }

    let text = item.text();
    if state.has_agent_message(&text, &run.attributed_agent) {
        debug!("Suppressing duplicate message from '{}'", run.attributed_agent);
        return;
    }

    debug!("{}: {}", run.attributed_agent, text);
    state
        .messages
        .push(Message::agent(text, run.attributed_agent.clone(), run.question.clone()));
}
