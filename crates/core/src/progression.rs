//! Onboarding Progression State Machine
//!
//! Walks the learner through the fixed steps in [`crate::curriculum`]. The
//! machine is pure: every transition mutates [`ProgressionState`] and returns
//! the [`Command`]s the runtime should execute (spoken announcements, session
//! completion). Nothing here touches audio or the network, so a failed
//! announcement can never undo a transition.

use crate::{
    Command,
    curriculum::{
        COMPLETION_ANNOUNCEMENT, GATED_STEP, QUIZ_FAILED_ANNOUNCEMENT, QUIZ_GATE_ANNOUNCEMENT,
        QUIZ_PASSED_ANNOUNCEMENT, STEPS,
    },
};
use serde::Serialize;
use tracing::{debug, info};

pub const MASTERY_STEP_INCREMENT: u8 = 33;
pub const MASTERY_QUIZ_BONUS: u8 = 15;
pub const MASTERY_MAX: u8 = 100;

/// Named position in the onboarding sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Step0,
    Step1,
    QuizGate,
    Step2,
    Done,
}

/// Observable progression fields.
///
/// `mastery_percent` never decreases within a session. `quiz_pending` and
/// `quiz_passed` are never set at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressionState {
    pub active_step_index: usize,
    pub highlight_target: Option<String>,
    pub mastery_percent: u8,
    pub quiz_pending: bool,
    pub quiz_passed: bool,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            active_step_index: 0,
            highlight_target: None,
            mastery_percent: 0,
            quiz_pending: false,
            quiz_passed: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgressionMachine {
    state: ProgressionState,
}

impl ProgressionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        if self.state.quiz_pending {
            return Stage::QuizGate;
        }
        match self.state.active_step_index {
            0 => Stage::Step0,
            1 => Stage::Step1,
            2 => Stage::Step2,
            _ => Stage::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage() == Stage::Done
    }

    /// Points the highlight at the first step's region without moving.
    pub fn focus_first_step(&mut self) {
        self.state.highlight_target = Some(STEPS[0].highlight.to_string());
    }

    /// Moves to the next step, or into the quiz gate when leaving the gated
    /// step before the quiz has been passed.
    pub fn advance(&mut self) -> Vec<Command> {
        match self.stage() {
            Stage::Done => {
                debug!("Advance requested after the final step. Ignoring.");
                Vec::new()
            }
            Stage::QuizGate => {
                debug!("Advance requested while the quiz is pending. Ignoring.");
                Vec::new()
            }
            _ if self.state.active_step_index == GATED_STEP && !self.state.quiz_passed => {
                info!(step = self.state.active_step_index, "Entering quiz gate");
                self.state.quiz_pending = true;
                vec![Command::SpeakText(QUIZ_GATE_ANNOUNCEMENT.to_string())]
            }
            _ => self.step_forward(),
        }
    }

    /// Applies an answer to the pending quiz. A correct answer awards the bonus
    /// and performs the deferred advance; a wrong one changes nothing.
    pub fn submit_quiz_answer(&mut self, correct: bool) -> Vec<Command> {
        if !self.state.quiz_pending {
            debug!("Quiz answer received with no quiz pending. Ignoring.");
            return Vec::new();
        }
        if !correct {
            info!("Quiz answered incorrectly");
            return vec![Command::SpeakText(QUIZ_FAILED_ANNOUNCEMENT.to_string())];
        }

        info!("Quiz passed");
        self.state.quiz_pending = false;
        self.state.quiz_passed = true;
        self.add_mastery(MASTERY_QUIZ_BONUS);

        let mut commands = vec![Command::SpeakText(QUIZ_PASSED_ANNOUNCEMENT.to_string())];
        commands.extend(self.advance());
        commands
    }

    fn step_forward(&mut self) -> Vec<Command> {
        let next = self.state.active_step_index + 1;
        self.state.active_step_index = next;
        self.add_mastery(MASTERY_STEP_INCREMENT);
        info!(step = next, mastery = self.state.mastery_percent, "Progressed");

        match STEPS.get(next) {
            Some(step) => {
                self.state.highlight_target = Some(step.highlight.to_string());
                vec![Command::SpeakText(step.announcement.to_string())]
            }
            None => vec![
                Command::SpeakText(COMPLETION_ANNOUNCEMENT.to_string()),
                Command::SessionComplete(COMPLETION_ANNOUNCEMENT.to_string()),
            ],
        }
    }

    fn add_mastery(&mut self, amount: u8) {
        self.state.mastery_percent = self
            .state
            .mastery_percent
            .saturating_add(amount)
            .min(MASTERY_MAX);
    }
}
