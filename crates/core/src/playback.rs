//! Speech Playback Sequencer
//!
//! Turns tutor text into audio on a single playback timeline. Synthesis for
//! each utterance starts as soon as it is enqueued, but a single worker task
//! consumes the results strictly in enqueue order and reserves back-to-back
//! slots on the device clock, so clips never overlap and never reorder.
//!
//! The slot cursor and utterance ids live in a [`PlaybackTimeline`]. A runtime
//! that replaces its sequencer (to drop speech that has not been scheduled
//! yet) hands the same timeline to the replacement, so clips already handed
//! to the device are never overlapped and ids are never reused.

use crate::{
    audio::{AudioBuffer, TTS_CHANNELS, TTS_PCM16_SAMPLE_RATE, decode_pcm16_base64},
    speech::SpeechSynthesizer,
};
use anyhow::{Context, Result};
use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, warn};

/// The cursor for the next free slot on the playback timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackSchedule {
    next_available_start: f64,
}

impl PlaybackSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `duration` seconds starting no earlier than `now` and no
    /// earlier than the end of the previous reservation. Returns the start.
    pub fn reserve(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.next_available_start.max(now);
        self.next_available_start = start + duration.max(0.0);
        start
    }
}

/// Playback state that outlives any single [`SpeechSequencer`]: the slot
/// cursor and the utterance id counter for one device clock.
#[derive(Debug, Default)]
pub struct PlaybackTimeline {
    schedule: Mutex<PlaybackSchedule>,
    issued_ids: AtomicU64,
}

impl PlaybackTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids start at 1.
    fn next_id(&self) -> u64 {
        self.issued_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn reserve(&self, now: f64, duration: f64) -> f64 {
        self.schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reserve(now, duration)
    }
}

/// An utterance with a fixed slot on the device clock.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledUtterance {
    pub id: u64,
    pub buffer: AudioBuffer,
    pub start_at: f64,
}

impl ScheduledUtterance {
    pub fn ends_at(&self) -> f64 {
        self.start_at + self.buffer.duration()
    }
}

/// The single audio output the sequencer owns.
///
/// `current_time` must advance in step with tokio's clock; the sequencer uses
/// it both to place utterances and to time their completion.
pub trait PlaybackDevice: Send + Sync {
    /// Seconds elapsed on the device clock.
    fn current_time(&self) -> f64;
    /// Hands a scheduled utterance to the device. Must not block.
    fn play(&self, utterance: &ScheduledUtterance) -> Result<()>;
}

struct PendingUtterance {
    id: u64,
    synthesis: JoinHandle<Result<Option<String>>>,
}

/// Serializes tutor speech onto one [`PlaybackDevice`].
///
/// The speaking indicator is published as the number of utterances between
/// enqueue and playback completion; speech is audible while it is non-zero.
pub struct SpeechSequencer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    queue: mpsc::UnboundedSender<PendingUtterance>,
    outstanding: Arc<watch::Sender<usize>>,
    timeline: Arc<PlaybackTimeline>,
    worker: JoinHandle<()>,
}

impl SpeechSequencer {
    /// Starts the playback worker on a fresh timeline. Must be called inside
    /// a tokio runtime.
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, device: Arc<dyn PlaybackDevice>) -> Self {
        Self::with_timeline(synthesizer, device, Arc::new(PlaybackTimeline::new()))
    }

    /// Starts the playback worker, continuing `timeline` where earlier
    /// sequencers on the same device left it.
    pub fn with_timeline(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        device: Arc<dyn PlaybackDevice>,
        timeline: Arc<PlaybackTimeline>,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        let outstanding = Arc::new(outstanding);
        let worker = tokio::spawn(run_worker(
            rx,
            device,
            timeline.clone(),
            outstanding.clone(),
        ));
        Self {
            synthesizer,
            queue,
            outstanding,
            timeline,
            worker,
        }
    }

    /// Requests speech for `text` and appends it to the playback schedule.
    ///
    /// Returns immediately with the utterance id. Failures are logged and only
    /// affect this utterance.
    pub fn enqueue(&self, text: impl Into<String>) -> u64 {
        let text = text.into();
        let id = self.timeline.next_id();
        self.outstanding.send_modify(|n| *n += 1);
        debug!(utterance = id, chars = text.len(), "Utterance enqueued");

        let synthesizer = self.synthesizer.clone();
        let synthesis = tokio::spawn(async move { synthesizer.synthesize(&text).await });
        if self.queue.send(PendingUtterance { id, synthesis }).is_err() {
            warn!(utterance = id, "Playback worker is gone. Dropping utterance.");
            finish(&self.outstanding);
        }
        id
    }

    pub fn is_speaking(&self) -> bool {
        *self.outstanding.borrow() > 0
    }

    /// Watches the number of utterances that have not finished playing.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.outstanding.subscribe()
    }
}

impl Drop for SpeechSequencer {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn finish(outstanding: &watch::Sender<usize>) {
    outstanding.send_modify(|n| *n = n.saturating_sub(1));
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<PendingUtterance>,
    device: Arc<dyn PlaybackDevice>,
    timeline: Arc<PlaybackTimeline>,
    outstanding: Arc<watch::Sender<usize>>,
) {
    while let Some(PendingUtterance { id, synthesis }) = rx.recv().await {
        let buffer = match decode_synthesis(synthesis.await) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(utterance = id, error = ?e, "Speech unavailable. Skipping utterance.");
                finish(&outstanding);
                continue;
            }
        };

        let now = device.current_time();
        let start_at = timeline.reserve(now, buffer.duration());
        let utterance = ScheduledUtterance {
            id,
            buffer,
            start_at,
        };
        if let Err(e) = device.play(&utterance) {
            error!(utterance = id, error = ?e, "Playback device rejected utterance");
            finish(&outstanding);
            continue;
        }
        info!(
            utterance = id,
            start_at,
            duration = utterance.buffer.duration(),
            "Utterance scheduled"
        );

        let remaining = (utterance.ends_at() - now).max(0.0);
        let outstanding = outstanding.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            debug!(utterance = id, "Utterance finished playing");
            finish(&outstanding);
        });
    }
}

fn decode_synthesis(joined: Result<Result<Option<String>>, JoinError>) -> Result<AudioBuffer> {
    let payload = joined
        .context("Speech synthesis task failed")??
        .context("Speech service returned no audio")?;
    let buffer = decode_pcm16_base64(&payload, TTS_PCM16_SAMPLE_RATE, TTS_CHANNELS)?;
    Ok(buffer)
}
