pub mod audio;
pub mod chat;
pub mod curriculum;
pub mod gemini;
pub mod llm_client;
pub mod offline;
pub mod playback;
pub mod progression;
pub mod session;
pub mod speech;
pub mod surface;
pub mod telemetry;
pub mod tool;
pub mod transcript;

/// Represents commands that the core logic issues to an external runtime.
///
/// State transitions never perform side effects themselves. They return these
/// commands and the runtime executes them, so a failed side effect cannot
/// roll a transition back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Command the runtime to speak the given text to the user.
    SpeakText(String),
    /// Command indicating the session is complete, with a final message.
    SessionComplete(String),
}
