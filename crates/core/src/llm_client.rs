use crate::transcript::Source;
use anyhow::Result;
use async_trait::async_trait;

/// A tutor reply from the text service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextReply {
    pub text: String,
    /// Grounding citations, in the order the service returned them.
    pub sources: Vec<Source>,
}

/// A generic client for the hosted text-generation service.
///
/// Failures are opaque: callers log them and move on, so implementations do
/// not need a structured error taxonomy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Answers `prompt` as the tutor for the tool named by `tool_context`.
    async fn generate(&self, prompt: &str, tool_context: &str) -> Result<TextReply>;
}
