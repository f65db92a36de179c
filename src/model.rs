//! Chat log data model.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Narrator,
    Agent,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "you"),
            Self::Narrator => write!(f, "narrator"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// One entry in the chat log. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    /// Worker credited with the message; empty when unknown.
    pub attributed_agent: String,
    /// The user input that started the run this message belongs to.
    pub related_question: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            attributed_agent: String::new(),
            related_question: String::new(),
        }
    }

    pub fn narrator(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Narrator,
            text: text.into(),
            attributed_agent: String::new(),
            related_question: String::new(),
        }
    }

    pub fn agent(text: impl Into<String>, agent: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
            attributed_agent: agent.into(),
            related_question: question.into(),
        }
    }

    /// Label shown above the message body.
    pub fn label(&self) -> String {
        if self.attributed_agent.is_empty() {
            self.sender.to_string()
        } else {
            self.attributed_agent.clone()
        }
    }
}

/// Per-run reducer state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    pub question: String,
    pub attributed_agent: String,
}

/// Everything the shell renders, threaded through [`crate::reducer::reduce`].
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub processing: bool,
    pub run: Option<RunContext>,
}

impl ChatState {
    /// Whether an agent message with this text and attribution is already logged.
    pub fn has_agent_message(&self, text: &str, attributed_agent: &str) -> bool {
        self.messages.iter().any(|m| {
            m.sender == Sender::Agent && m.text == text && m.attributed_agent == attributed_agent
        })
    }
}
