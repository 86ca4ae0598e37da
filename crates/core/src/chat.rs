//! Chat Exchange Controller
//!
//! Owns the session transcript and the single outstanding request to the text
//! service. The exchange is split in two halves so a runtime can await the
//! service call without holding the controller: [`ChatController::submit`]
//! records the user turn and hands back the request, and
//! [`ChatController::resolve`] applies whatever the service returned.

use crate::{
    Command,
    llm_client::{TextGenerator, TextReply},
    transcript::{Message, Transcript},
};
use anyhow::Result;
use tracing::{error, info, warn};

/// The outbound call a runtime should make for a submitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub prompt: String,
    pub tool_context: String,
}

#[derive(Debug, Clone)]
pub struct ChatController {
    transcript: Transcript,
    thinking: bool,
    tool_context: String,
}

impl ChatController {
    pub fn new(tool_context: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::new(),
            thinking: false,
            tool_context: tool_context.into(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    /// Appends a tutor-authored message that did not come from the text
    /// service, such as the readiness greeting.
    pub fn announce(&mut self, text: impl Into<String>) {
        self.transcript.push(Message::system(text, Vec::new()));
    }

    /// Records a user turn and returns the request to issue.
    ///
    /// Returns `None`, leaving the transcript untouched, for blank input or
    /// while a previous request is still outstanding.
    pub fn submit(&mut self, text: &str) -> Option<ExchangeRequest> {
        if text.trim().is_empty() {
            return None;
        }
        if self.thinking {
            warn!("Message submitted while a reply is outstanding. Ignoring.");
            return None;
        }

        self.transcript.push(Message::user(text));
        self.thinking = true;
        info!(chars = text.len(), "User message submitted");
        Some(ExchangeRequest {
            prompt: text.to_string(),
            tool_context: self.tool_context.clone(),
        })
    }

    /// Applies the outcome of the outstanding request.
    ///
    /// A reply is appended and, when it has text, spoken. A failure only
    /// clears the thinking flag; the user's message stays in the transcript.
    pub fn resolve(&mut self, outcome: Result<TextReply>) -> Vec<Command> {
        if !self.thinking {
            warn!("Reply arrived with no request outstanding. Discarding.");
            return Vec::new();
        }
        self.thinking = false;

        match outcome {
            Ok(reply) => {
                info!(
                    chars = reply.text.len(),
                    sources = reply.sources.len(),
                    "Tutor reply received"
                );
                let speak = (!reply.text.is_empty()).then(|| reply.text.clone());
                self.transcript
                    .push(Message::system(reply.text, reply.sources));
                speak.map(Command::SpeakText).into_iter().collect()
            }
            Err(e) => {
                error!(error = ?e, "Text generation failed");
                Vec::new()
            }
        }
    }

    /// Runs a full exchange inline: submit, call the service, resolve.
    pub async fn send_user_message(
        &mut self,
        generator: &dyn TextGenerator,
        text: &str,
    ) -> Vec<Command> {
        let Some(request) = self.submit(text) else {
            return Vec::new();
        };
        let outcome = generator
            .generate(&request.prompt, &request.tool_context)
            .await;
        self.resolve(outcome)
    }

    /// Drops the transcript and any outstanding request.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.thinking = false;
    }
}
