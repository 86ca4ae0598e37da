//! Guided Curriculum Script
//!
//! The onboarding sequence is fixed: three guided steps with a validation quiz
//! between the second and third. This module holds the step definitions and
//! every line the tutor speaks while walking through them.

/// One stage of the guided onboarding sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub title: &'static str,
    /// UI region of the mock surface emphasized while this step is active.
    pub highlight: &'static str,
    /// Spoken when the learner arrives at this step.
    pub announcement: &'static str,
}

pub const STEPS: [Step; 3] = [
    Step {
        title: "Provisioning Component Logic",
        highlight: "toolbar",
        announcement: "Focus on the toolbar to initiate your mastery protocol.",
    },
    Step {
        title: "Integrated Resource Mapping",
        highlight: "layers",
        announcement: "Optimal. Structural nodes are now mapped in the virtual instance.",
    },
    Step {
        title: "Final Neural Finalization",
        highlight: "canvas",
        announcement: "Accessing deep visual layers. The canvas is yours for advanced manipulation.",
    },
];

/// Index of the step whose forward transition is gated by the quiz.
pub const GATED_STEP: usize = 1;

/// The validation question asked at the quiz gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quiz {
    pub title: &'static str,
    pub choices: [&'static str; 3],
    pub correct_choice: usize,
}

impl Quiz {
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_choice
    }

    pub fn prompt_for(&self, tool_name: &str) -> String {
        format!("Titia requires structural confirmation for this {tool_name} sequence.")
    }
}

pub const QUIZ: Quiz = Quiz {
    title: "Protocol Validation",
    choices: [
        "Modular Inheritance Logic",
        "Contextual Sandbox Mapping",
        "Cloud Shader Protocols",
    ],
    correct_choice: 0,
};

pub const QUIZ_GATE_ANNOUNCEMENT: &str = "Concept Validation required. Verify the underlying architecture before proceeding with advanced manipulation.";
pub const QUIZ_PASSED_ANNOUNCEMENT: &str =
    "Validation successful. Mastery affinity increased. Accessing deep visual layers.";
pub const QUIZ_FAILED_ANNOUNCEMENT: &str =
    "Validation failure. Rerouting logic streams for clearer comprehension.";
pub const COMPLETION_ANNOUNCEMENT: &str =
    "Mastery protocol complete. Every guided sequence in this sandbox has been validated.";

/// The readiness message that opens every session.
pub fn greeting(tool_name: &str) -> String {
    format!(
        "Neural Sandbox Provisioned for {tool_name}. Cloud instance is live and responsive. \
         I have mapped the primary interaction manifold. {}",
        STEPS[0].announcement
    )
}
