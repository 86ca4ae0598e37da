use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use titia_core::audio::AudioBuffer;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,                     // No cutoff frequency, pass all frequencies
        PolynomialDegree::Cubic, // Cubic interpolation for quality
        chunk_size,
        1, // 1 channel (mono)
    )?;
    Ok(resampler)
}

/// Converts a mono buffer to the client playback rate.
///
/// Returns the samples untouched when the rates already match.
pub fn resample_for_playback(buffer: &AudioBuffer, playback_rate: u32) -> anyhow::Result<Vec<f32>> {
    if buffer.sample_rate() == playback_rate || buffer.is_empty() {
        return Ok(buffer.samples().to_vec());
    }

    let mut resampler = create_resampler(
        buffer.sample_rate() as f64,
        playback_rate as f64,
        RESAMPLER_CHUNK_SIZE,
    )?;
    let mut resampled = Vec::with_capacity(
        (buffer.samples().len() as f64 * playback_rate as f64 / buffer.sample_rate() as f64)
            as usize,
    );
    let chunk_size = resampler.input_frames_next();
    for chunk in buffer.samples().chunks(chunk_size) {
        let out = if chunk.len() == chunk_size {
            resampler.process(&[chunk], None)?
        } else {
            resampler.process_partial(Some(&[chunk]), None)?
        };
        resampled.extend_from_slice(&out[0]);
    }
    Ok(resampled)
}
