use anyhow::Result;
use async_trait::async_trait;

/// A client for the hosted speech-synthesis service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes `text` and returns base64-encoded raw PCM16 (mono, 24 kHz,
    /// little-endian), or `None` when the service produced no audio.
    async fn synthesize(&self, text: &str) -> Result<Option<String>>;
}
