//! Offline Providers
//!
//! Deterministic stand-ins for the hosted services, used when the service runs
//! without a credential and in development. They exercise the same code paths
//! as the real clients without network access or API costs.

use crate::{
    audio::{TTS_PCM16_SAMPLE_RATE, encode_pcm16_base64},
    llm_client::{TextGenerator, TextReply},
    speech::SpeechSynthesizer,
};
use anyhow::Result;
use async_trait::async_trait;

/// A `TextGenerator` that echoes the learner's question back with guidance.
pub struct OfflineTutor;

#[async_trait]
impl TextGenerator for OfflineTutor {
    async fn generate(&self, prompt: &str, tool_context: &str) -> Result<TextReply> {
        Ok(TextReply {
            text: format!(
                "Research uplink is offline for this {tool_context} session. \
                 You asked: \"{}\". Keep working through the highlighted region \
                 and advance when you are ready.",
                prompt.trim()
            ),
            sources: Vec::new(),
        })
    }
}

/// A `SpeechSynthesizer` that returns silence sized to the text, so playback
/// timing behaves like real speech.
pub struct SilentSynthesizer {
    pub seconds_per_word: f64,
}

impl Default for SilentSynthesizer {
    fn default() -> Self {
        Self {
            seconds_per_word: 0.35,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Option<String>> {
        let words = text.split_whitespace().count();
        if words == 0 {
            return Ok(None);
        }
        let frames = (words as f64 * self.seconds_per_word * TTS_PCM16_SAMPLE_RATE as f64) as usize;
        Ok(Some(encode_pcm16_base64(&vec![0.0; frames.max(1)])))
    }
}
