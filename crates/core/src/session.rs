//! Tutoring Session State
//!
//! [`TutoringSession`] is the single owner of everything a session shows:
//! the selected tool, lifecycle phase, progression, transcript and indicator
//! flags. A runtime mutates it only through the operations below and renders
//! it from the immutable [`SessionSnapshot`].
//!
//! Every asynchronous call a runtime makes on behalf of the session is tagged
//! with the session epoch. Exit and restart bump the epoch, so results that
//! arrive for a torn-down session can be recognized and dropped.

use crate::{
    Command,
    chat::{ChatController, ExchangeRequest},
    curriculum::{self, QUIZ, STEPS},
    llm_client::TextReply,
    progression::{ProgressionMachine, ProgressionState, Stage},
    surface::{SurfaceView, render_surface},
    tool::ToolConfig,
    transcript::Message,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Provisioning,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    #[default]
    Cloud,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    /// One-based step number as shown to the learner.
    pub number: usize,
    pub title: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizView {
    pub title: &'static str,
    pub prompt: String,
    pub choices: [&'static str; 3],
}

/// Everything a client needs to draw the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub tool: ToolConfig,
    pub phase: SessionPhase,
    pub stage: Stage,
    pub progression: ProgressionState,
    pub step: Option<StepView>,
    pub quiz: Option<QuizView>,
    pub transcript: Vec<Message>,
    pub thinking: bool,
    pub speaking: bool,
    pub connection_mode: ConnectionMode,
    /// The mock surface; absent while the sandbox is still provisioning.
    pub surface: Option<SurfaceView>,
}

pub struct TutoringSession {
    tool: ToolConfig,
    phase: SessionPhase,
    epoch: u64,
    progression: ProgressionMachine,
    chat: ChatController,
    connection_mode: ConnectionMode,
    speaking: bool,
}

impl TutoringSession {
    /// Creates a session in the provisioning phase.
    pub fn new(tool: ToolConfig) -> Self {
        Self {
            chat: ChatController::new(tool.name),
            tool,
            phase: SessionPhase::Provisioning,
            epoch: 0,
            progression: ProgressionMachine::new(),
            connection_mode: ConnectionMode::default(),
            speaking: false,
        }
    }

    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a result tagged with `epoch` still belongs to this session.
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch && self.phase != SessionPhase::Ended
    }

    pub fn progression(&self) -> &ProgressionState {
        self.progression.state()
    }

    pub fn transcript(&self) -> &[Message] {
        self.chat.transcript().messages()
    }

    /// Ends provisioning: greets the learner and focuses the first step.
    pub fn activate(&mut self) -> Vec<Command> {
        if self.phase != SessionPhase::Provisioning {
            debug!(phase = ?self.phase, "Activate requested outside provisioning. Ignoring.");
            return Vec::new();
        }
        self.phase = SessionPhase::Active;
        self.progression.focus_first_step();

        let greeting = curriculum::greeting(self.tool.name);
        self.chat.announce(greeting.clone());
        info!(tool = %self.tool.id, epoch = self.epoch, "Session active");
        vec![Command::SpeakText(greeting)]
    }

    /// Records a user message. See [`ChatController::submit`].
    pub fn submit_message(&mut self, text: &str) -> Option<ExchangeRequest> {
        if self.phase != SessionPhase::Active {
            debug!("Message received while session is not active. Ignoring.");
            return None;
        }
        self.chat.submit(text)
    }

    /// Applies a text-service outcome issued under `epoch`.
    pub fn resolve_exchange(&mut self, epoch: u64, outcome: Result<TextReply>) -> Vec<Command> {
        if !self.is_current(epoch) {
            debug!(epoch, current = self.epoch, "Discarding reply for a torn-down session");
            return Vec::new();
        }
        self.chat.resolve(outcome)
    }

    pub fn advance(&mut self) -> Vec<Command> {
        if self.phase != SessionPhase::Active {
            return Vec::new();
        }
        self.progression.advance()
    }

    /// Answers the quiz with the choice at `choice` (zero-based).
    pub fn answer_quiz(&mut self, choice: usize) -> Vec<Command> {
        if self.phase != SessionPhase::Active {
            return Vec::new();
        }
        self.progression.submit_quiz_answer(QUIZ.is_correct(choice))
    }

    pub fn set_connection_mode(&mut self, mode: ConnectionMode) {
        self.connection_mode = mode;
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn set_speaking(&mut self, speaking: bool) {
        self.speaking = speaking;
    }

    /// Starts over with `tool`: clears all state and provisions again.
    pub fn restart(&mut self, tool: ToolConfig) {
        let epoch = self.epoch + 1;
        *self = Self::new(tool);
        self.epoch = epoch;
        info!(tool = %self.tool.id, epoch, "Session restarted");
    }

    /// Tears down all session state unconditionally.
    pub fn exit(&mut self) {
        self.epoch += 1;
        self.phase = SessionPhase::Ended;
        self.progression = ProgressionMachine::new();
        self.chat.reset();
        self.speaking = false;
        info!(tool = %self.tool.id, "Session exited");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let progression = self.progression.state().clone();
        let active = self.phase == SessionPhase::Active;
        let stage = self.progression.stage();

        let step = STEPS
            .get(progression.active_step_index)
            .filter(|_| active)
            .map(|step| StepView {
                number: progression.active_step_index + 1,
                title: step.title,
            });
        let quiz = (active && stage == Stage::QuizGate).then(|| QuizView {
            title: QUIZ.title,
            prompt: QUIZ.prompt_for(self.tool.name),
            choices: QUIZ.choices,
        });
        let surface = active
            .then(|| render_surface(self.tool.id, progression.highlight_target.as_deref()));

        SessionSnapshot {
            tool: self.tool.clone(),
            phase: self.phase,
            stage,
            step,
            quiz,
            transcript: self.transcript().to_vec(),
            thinking: self.chat.is_thinking(),
            speaking: self.speaking,
            connection_mode: self.connection_mode,
            surface,
            progression,
        }
    }
}
