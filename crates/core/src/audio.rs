use base64::Engine;

/// Sample rate of the PCM16 payloads returned by the speech service.
pub const TTS_PCM16_SAMPLE_RATE: u32 = 24_000;
pub const TTS_CHANNELS: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioDecodeError {
    #[error("Invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Audio payload is empty")]
    Empty,
    #[error("Audio payload has {0} bytes, which is not a whole number of 16-bit frames")]
    PartialFrame(usize),
}

/// Decoded, playable audio. Samples are interleaved and normalized to
/// `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decodes a base64 string of little-endian PCM16 into an [`AudioBuffer`].
pub fn decode_pcm16_base64(
    payload: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioBuffer, AudioDecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    if bytes.is_empty() {
        return Err(AudioDecodeError::Empty);
    }
    let frame_bytes = 2 * channels.max(1) as usize;
    if bytes.len() % frame_bytes != 0 {
        return Err(AudioDecodeError::PartialFrame(bytes.len()));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect();
    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

/// Encodes f32 samples as base64 little-endian PCM16, clamping out-of-range
/// values.
pub fn encode_pcm16_base64(samples: &[f32]) -> String {
    let bytes: Vec<u8> = samples
        .iter()
        .flat_map(|&sample| {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
