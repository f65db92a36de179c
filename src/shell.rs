//! Terminal chat shell: one input line, a scrolling message list.
//!
//! Messages are rendered as the reducer appends them. Lines typed while a
//! submission is in flight are reported and dropped. Ctrl-C cancels the
//! in-flight submission, or quits when nothing is running.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::model::{Message, Sender};
use crate::pipeline::{ChatSession, SubmitOutcome};

/// Text shown for one log entry, or `None` for entries the user already sees.
pub fn render(message: &Message) -> Option<String> {
    if message.sender == Sender::User {
        return None;
    }
    let body = message.text.trim_end();
    if message.attributed_agent.is_empty() || body.is_empty() {
        Some(format!("[{}] {body}", message.sender))
    } else {
        Some(format!("[{}]\n{body}", message.label()))
    }
}

/// Print rendered messages until the session drops its sender.
pub fn spawn_renderer(mut rx: mpsc::UnboundedReceiver<Message>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Some(text) = render(&message) {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{text}\n");
                let _ = out.flush();
            }
        }
    })
}

pub struct Shell {
    session: ChatSession,
    renderer: JoinHandle<()>,
}

impl Shell {
    pub fn new(session: ChatSession) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: session.with_updates(tx),
            renderer: spawn_renderer(rx),
        }
    }

    /// Submit a single line and wait for every message to render.
    pub async fn run_once(self, input: &str) {
        let Self { mut session, renderer } = self;
        let cancel = CancellationToken::new();
        let watcher = cancel_on_ctrl_c(cancel.clone());
        if session.submit(input, cancel).await == SubmitOutcome::Rejected {
            eprintln!("Nothing to send.");
        }
        watcher.abort();
        drop(session);
        let _ = renderer.await;
    }

    /// Interactive loop until stdin closes or Ctrl-C arrives at the prompt.
    pub async fn run(self) -> std::io::Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).is_err() {
                    break;
                }
            }
        });

        let result = self.run_with(BufReader::new(tokio::io::stdin()), rx).await;
        forwarder.abort();
        result
    }

    /// Drive the loop from `reader`. An interrupt cancels the in-flight
    /// submission, or ends the loop when idle.
    pub async fn run_with<R>(
        self,
        reader: R,
        mut interrupts: mpsc::UnboundedReceiver<()>,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let Self { mut session, renderer } = self;
        let mut lines = reader.lines();

        println!("Enter your message (Ctrl-C cancels a running request, Ctrl-C or Ctrl-D at the prompt quits).");
        loop {
            let line = tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => line,
                    None => break,
                },
                _ = interrupts.recv() => {
                    info!("Interrupted at prompt, exiting");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let cancel = CancellationToken::new();
            let submit = session.submit(&line, cancel.clone());
            tokio::pin!(submit);
            let mut stdin_open = true;
            eprintln!("Processing...");

            loop {
                tokio::select! {
                    outcome = &mut submit => {
                        debug!("Submission outcome: {outcome:?}");
                        break;
                    }
                    Some(()) = interrupts.recv() => {
                        info!("Cancelling in-flight request");
                        cancel.cancel();
                    }
                    typed = lines.next_line(), if stdin_open => match typed? {
                        Some(extra) if !extra.trim().is_empty() => {
                            eprintln!("Still processing, ignored: {extra}");
                        }
                        Some(_) => {}
                        None => stdin_open = false,
                    },
                }
            }

            if !stdin_open {
                break;
            }
        }

        drop(session);
        let _ = renderer.await;
        Ok(())
    }
}

fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancelling request");
            cancel.cancel();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lines_are_not_echoed() {
        assert_eq!(render(&Message::user("cats")), None);
    }

    #[test]
    fn narrator_and_unattributed_agent_use_sender_label() {
        assert_eq!(
            render(&Message::narrator("A cat video...")).as_deref(),
            Some("[narrator] A cat video...")
        );
        assert_eq!(
            render(&Message::agent("Hi", "", "cats")).as_deref(),
            Some("[agent] Hi")
        );
    }

    #[test]
    fn attributed_agent_gets_a_heading() {
        assert_eq!(
            render(&Message::agent("Hello\n", "writer", "cats")).as_deref(),
            Some("[writer]\nHello")
        );
    }
}
