//! A [`PlaybackDevice`] that forwards scheduled speech to the browser.
//!
//! The browser owns the real audio output. The server keeps the connection
//! clock (seconds since `origin`) and stamps every clip with its slot on that
//! clock; the client maps it onto its own audio context.

use super::protocol::ServerMessage;
use crate::audio_utils::resample_for_playback;
use anyhow::{Result, anyhow};
use titia_core::{
    audio::encode_pcm16_base64,
    playback::{PlaybackDevice, ScheduledUtterance},
};
use tokio::{sync::mpsc, time::Instant};

pub struct ChannelPlaybackDevice {
    origin: Instant,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    playback_rate: u32,
}

impl ChannelPlaybackDevice {
    pub fn new(
        origin: Instant,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        playback_rate: u32,
    ) -> Self {
        Self {
            origin,
            outbound,
            playback_rate,
        }
    }
}

impl PlaybackDevice for ChannelPlaybackDevice {
    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn play(&self, utterance: &ScheduledUtterance) -> Result<()> {
        let samples = resample_for_playback(&utterance.buffer, self.playback_rate)?;
        let message = ServerMessage::Audio {
            utterance: utterance.id,
            data: encode_pcm16_base64(&samples),
            sample_rate: self.playback_rate,
            start_at: utterance.start_at,
            duration: utterance.buffer.duration(),
        };
        self.outbound
            .send(message)
            .map_err(|_| anyhow!("client connection closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use titia_core::audio::AudioBuffer;

    fn utterance(samples: usize) -> ScheduledUtterance {
        ScheduledUtterance {
            id: 7,
            buffer: AudioBuffer::new(vec![0.25; samples], 24_000, 1),
            start_at: 2.0,
        }
    }

    #[tokio::test]
    async fn test_play_emits_audio_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let device = ChannelPlaybackDevice::new(Instant::now(), tx, 24_000);

        device.play(&utterance(12_000)).unwrap();
        match rx.recv().await.unwrap() {
            ServerMessage::Audio {
                utterance,
                data,
                sample_rate,
                start_at,
                duration,
            } => {
                assert_eq!(utterance, 7);
                assert_eq!(sample_rate, 24_000);
                assert_eq!(start_at, 2.0);
                approx::assert_relative_eq!(duration, 0.5);
                assert!(!data.is_empty());
            }
            other => panic!("expected audio frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_play_fails_once_client_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let device = ChannelPlaybackDevice::new(Instant::now(), tx, 24_000);
        assert!(device.play(&utterance(10)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_runtime_time() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let device = ChannelPlaybackDevice::new(Instant::now(), tx, 24_000);
        tokio::time::advance(std::time::Duration::from_millis(1500)).await;
        approx::assert_relative_eq!(device.current_time(), 1.5, epsilon = 1e-6);
    }
}
