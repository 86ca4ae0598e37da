//! The per-connection session runtime.
//!
//! [`run_shell`] owns one [`TutoringSession`] and is the only place its
//! commands turn into side effects. It multiplexes client messages, the
//! provisioning timer, text-service replies, the speaking indicator and the
//! HUD ticker on a single task, so the session itself needs no locking.

use super::{
    device::ChannelPlaybackDevice,
    protocol::{ClientMessage, ServerMessage},
};
use crate::{config::Config, state::AppState};
use anyhow::{Result, anyhow};
use std::{sync::Arc, time::Duration};
use titia_core::{
    Command,
    llm_client::TextReply,
    playback::{PlaybackTimeline, SpeechSequencer},
    session::{SessionPhase, TutoringSession},
    telemetry::{HudTelemetry, TELEMETRY_INTERVAL},
    tool::{ToolConfig, ToolKind},
};
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, MissedTickBehavior},
};
use tracing::{Instrument, debug, info, warn};

/// Timing knobs for a session runtime.
#[derive(Debug, Clone, Copy)]
pub struct ShellSettings {
    pub provisioning_delay: Duration,
    pub playback_sample_rate: u32,
    pub telemetry_interval: Duration,
}

impl From<&Config> for ShellSettings {
    fn from(config: &Config) -> Self {
        Self {
            provisioning_delay: config.provisioning_delay,
            playback_sample_rate: config.playback_sample_rate,
            telemetry_interval: TELEMETRY_INTERVAL,
        }
    }
}

/// A text-service result, tagged with the epoch it was requested under.
struct ExchangeOutcome {
    epoch: u64,
    result: Result<TextReply>,
}

struct Shell {
    state: Arc<AppState>,
    settings: ShellSettings,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    exchanges: mpsc::UnboundedSender<ExchangeOutcome>,
    session: TutoringSession,
    sequencer: SpeechSequencer,
    provisioned_at: Option<Instant>,
    /// Zero of the audio clock; survives restarts so clients keep one timeline.
    clock_origin: Instant,
    /// Slot cursor and utterance ids for the whole connection.
    timeline: Arc<PlaybackTimeline>,
}

impl Shell {
    fn new(
        state: Arc<AppState>,
        settings: ShellSettings,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        exchanges: mpsc::UnboundedSender<ExchangeOutcome>,
        tool: ToolKind,
    ) -> Self {
        let clock_origin = Instant::now();
        let timeline = Arc::new(PlaybackTimeline::new());
        let sequencer = new_sequencer(&state, &settings, &outbound, clock_origin, &timeline);
        Self {
            session: TutoringSession::new(ToolConfig::for_kind(tool)),
            provisioned_at: Some(Instant::now() + settings.provisioning_delay),
            state,
            settings,
            outbound,
            exchanges,
            sequencer,
            clock_origin,
            timeline,
        }
    }

    fn send(&self, message: ServerMessage) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| anyhow!("client connection closed"))
    }

    fn publish(&self) -> Result<()> {
        self.send(ServerMessage::Snapshot {
            state: self.session.snapshot(),
        })
    }

    fn execute(&self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::SpeakText(text) => {
                    self.sequencer.enqueue(text);
                }
                Command::SessionComplete(message) => {
                    info!(
                        tool = %self.session.tool().id,
                        announcement = %message,
                        "Curriculum complete"
                    );
                }
            }
        }
    }

    /// Replaces the speech pipeline. Utterances not yet sent to the client
    /// are dropped; clips already sent finish playing, and later speech is
    /// scheduled after them on the shared timeline.
    fn reset_speech(&mut self) -> watch::Receiver<usize> {
        self.sequencer = new_sequencer(
            &self.state,
            &self.settings,
            &self.outbound,
            self.clock_origin,
            &self.timeline,
        );
        self.session.set_speaking(false);
        self.sequencer.subscribe()
    }

    fn activate(&mut self) -> Result<()> {
        self.provisioned_at = None;
        let commands = self.session.activate();
        self.execute(commands);
        self.publish()
    }

    fn restart(&mut self, tool: ToolKind) -> Result<watch::Receiver<usize>> {
        self.session.restart(ToolConfig::for_kind(tool));
        self.provisioned_at = Some(Instant::now() + self.settings.provisioning_delay);
        let speaking = self.reset_speech();
        self.publish()?;
        Ok(speaking)
    }

    fn exit(&mut self) -> Result<watch::Receiver<usize>> {
        self.session.exit();
        self.provisioned_at = None;
        let speaking = self.reset_speech();
        self.publish()?;
        self.send(ServerMessage::Ended)?;
        Ok(speaking)
    }

    fn submit_message(&mut self, text: &str) -> Result<()> {
        let Some(request) = self.session.submit_message(text) else {
            debug!("Message not accepted. No request issued.");
            return Ok(());
        };
        self.publish()?;

        let generator = self.state.text_generator.clone();
        let exchanges = self.exchanges.clone();
        let epoch = self.session.epoch();
        tokio::spawn(
            async move {
                let result = generator
                    .generate(&request.prompt, &request.tool_context)
                    .await;
                // The shell may already be gone; nothing to deliver to.
                let _ = exchanges.send(ExchangeOutcome { epoch, result });
            }
            .in_current_span(),
        );
        Ok(())
    }

    fn resolve_exchange(&mut self, outcome: ExchangeOutcome) -> Result<()> {
        if !self.session.is_current(outcome.epoch) {
            debug!(epoch = outcome.epoch, "Dropping reply for a previous session");
            return Ok(());
        }
        let commands = self.session.resolve_exchange(outcome.epoch, outcome.result);
        self.execute(commands);
        self.publish()
    }

    /// Applies one client message. Returns the new speaking indicator when
    /// the speech pipeline was replaced.
    fn handle_client(
        &mut self,
        message: ClientMessage,
    ) -> Result<Option<watch::Receiver<usize>>> {
        match message {
            ClientMessage::Start { tool } => return self.restart(tool).map(Some),
            ClientMessage::Exit => return self.exit().map(Some),
            ClientMessage::UserMessage { text } => self.submit_message(&text)?,
            ClientMessage::NextStep => {
                let commands = self.session.advance();
                self.execute(commands);
                self.publish()?;
            }
            ClientMessage::QuizAnswer { choice } => {
                let commands = self.session.answer_quiz(choice);
                self.execute(commands);
                self.publish()?;
            }
            ClientMessage::SetConnectionMode { mode } => {
                info!(?mode, "Connection mode changed");
                self.session.set_connection_mode(mode);
                self.publish()?;
            }
        }
        Ok(None)
    }
}

fn new_sequencer(
    state: &AppState,
    settings: &ShellSettings,
    outbound: &mpsc::UnboundedSender<ServerMessage>,
    clock_origin: Instant,
    timeline: &Arc<PlaybackTimeline>,
) -> SpeechSequencer {
    let device = ChannelPlaybackDevice::new(
        clock_origin,
        outbound.clone(),
        settings.playback_sample_rate,
    );
    SpeechSequencer::with_timeline(
        state.speech_synthesizer.clone(),
        Arc::new(device),
        timeline.clone(),
    )
}

/// Runs one client's session until the inbound channel closes.
///
/// The first message must be `start`; anything earlier is answered with an
/// error frame. A later `start` restarts the session with the new tool.
pub async fn run_shell(
    state: Arc<AppState>,
    settings: ShellSettings,
    mut inbound: mpsc::Receiver<ClientMessage>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
) -> Result<()> {
    let tool = loop {
        match inbound.recv().await {
            Some(ClientMessage::Start { tool }) => break tool,
            Some(other) => {
                warn!(received = ?other, "Message received before start");
                outbound
                    .send(ServerMessage::Error {
                        message: "session not started: send `start` first".to_string(),
                    })
                    .map_err(|_| anyhow!("client connection closed"))?;
            }
            None => {
                info!("Client left before starting a session");
                return Ok(());
            }
        }
    };

    let (exchange_tx, mut exchange_rx) = mpsc::unbounded_channel();
    let mut shell = Shell::new(state, settings, outbound, exchange_tx, tool);
    let mut speaking_rx = shell.sequencer.subscribe();
    let mut telemetry = HudTelemetry::default();
    let mut ticker = tokio::time::interval(settings.telemetry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(%tool, "Session provisioning");
    shell.publish()?;

    loop {
        let provisioning = shell.provisioned_at;
        tokio::select! {
            _ = tokio::time::sleep_until(provisioning.unwrap_or_else(Instant::now)), if provisioning.is_some() => {
                shell.activate()?;
            }
            received = inbound.recv() => {
                let Some(client_message) = received else {
                    info!("Client channel closed. Stopping session.");
                    break;
                };
                debug!(?client_message, "Client message");
                if let Some(receiver) = shell.handle_client(client_message)? {
                    speaking_rx = receiver;
                }
            }
            Some(outcome) = exchange_rx.recv() => {
                shell.resolve_exchange(outcome)?;
            }
            Ok(()) = speaking_rx.changed() => {
                let speaking = *speaking_rx.borrow_and_update() > 0;
                if speaking != shell.session.is_speaking() {
                    shell.session.set_speaking(speaking);
                    shell.publish()?;
                }
            }
            _ = ticker.tick() => {
                if shell.session.phase() == SessionPhase::Active {
                    telemetry.step(&mut rand::rng());
                    shell.send(ServerMessage::Telemetry(telemetry))?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use titia_core::{
        llm_client::TextGenerator,
        offline::SilentSynthesizer,
        progression::Stage,
        session::SessionSnapshot,
        transcript::{MessageRole, Source},
    };
    use tokio::task::JoinHandle;

    /// Matches `Config::for_tests`.
    const PROVISIONING: Duration = Duration::from_millis(2500);

    /// Answers every prompt with the same grounded reply after `delay`.
    struct ScriptedTutor {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for ScriptedTutor {
        async fn generate(&self, _prompt: &str, _tool_context: &str) -> Result<TextReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(TextReply {
                text: "Auto layout stacks children along one axis.".into(),
                sources: vec![Source {
                    uri: "https://help.figma.com/auto-layout".into(),
                    title: "Auto layout".into(),
                }],
            })
        }
    }

    struct Harness {
        tutor: Arc<ScriptedTutor>,
        inbound: mpsc::Sender<ClientMessage>,
        outbound: mpsc::UnboundedReceiver<ServerMessage>,
        task: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn spawn(reply_delay: Duration) -> Self {
            let tutor = Arc::new(ScriptedTutor {
                delay: reply_delay,
                calls: AtomicUsize::new(0),
            });
            let config = Config::for_tests();
            let state = Arc::new(AppState {
                text_generator: tutor.clone(),
                speech_synthesizer: Arc::new(SilentSynthesizer::default()),
                config: Arc::new(config.clone()),
            });
            let (inbound, inbound_rx) = mpsc::channel(8);
            let (outbound_tx, outbound) = mpsc::unbounded_channel();
            let task = tokio::spawn(run_shell(
                state,
                ShellSettings::from(&config),
                inbound_rx,
                outbound_tx,
            ));
            Self {
                tutor,
                inbound,
                outbound,
                task,
            }
        }

        async fn send(&self, message: ClientMessage) {
            self.inbound.send(message).await.unwrap();
        }

        /// Lets the runtime run for `millis` and returns everything it sent.
        async fn run_for(&mut self, millis: u64) -> Vec<ServerMessage> {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            let mut messages = Vec::new();
            while let Ok(message) = self.outbound.try_recv() {
                messages.push(message);
            }
            messages
        }

        async fn started(tool: ToolKind, reply_delay: Duration) -> Self {
            let mut harness = Self::spawn(reply_delay);
            harness.send(ClientMessage::Start { tool }).await;
            harness.run_for(PROVISIONING.as_millis() as u64 + 10).await;
            harness
        }

        fn calls(&self) -> usize {
            self.tutor.calls.load(Ordering::SeqCst)
        }
    }

    fn snapshots(messages: &[ServerMessage]) -> Vec<&SessionSnapshot> {
        messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Snapshot { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    fn last_snapshot(messages: &[ServerMessage]) -> &SessionSnapshot {
        snapshots(messages)
            .pop()
            .expect("expected at least one snapshot")
    }

    /// `(utterance, start_at, duration)` for every audio frame, in send order.
    fn audio_frames(messages: &[ServerMessage]) -> Vec<(u64, f64, f64)> {
        messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Audio {
                    utterance,
                    start_at,
                    duration,
                    ..
                } => Some((*utterance, *start_at, *duration)),
                _ => None,
            })
            .collect()
    }

    fn assert_back_to_back(frames: &[(u64, f64, f64)]) {
        for pair in frames.windows(2) {
            assert!(pair[1].0 > pair[0].0, "ids must increase: {frames:?}");
            assert!(
                pair[1].1 >= pair[0].1 + pair[0].2 - 1e-9,
                "clips overlap: {frames:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_before_start_are_rejected() {
        let mut harness = Harness::spawn(Duration::ZERO);
        harness.send(ClientMessage::NextStep).await;
        let messages = harness.run_for(10).await;
        assert!(matches!(messages.as_slice(), [ServerMessage::Error { .. }]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provisioning_then_single_greeting() {
        let mut harness = Harness::spawn(Duration::ZERO);
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Figma,
            })
            .await;

        let messages = harness.run_for(100).await;
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.phase, SessionPhase::Provisioning);
        assert!(snapshot.surface.is_none());
        assert!(snapshot.transcript.is_empty());

        let messages = harness.run_for(PROVISIONING.as_millis() as u64).await;
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.transcript.len(), 1);
        assert_eq!(snapshot.transcript[0].role, MessageRole::System);
        assert_eq!(
            snapshot.progression.highlight_target.as_deref(),
            Some("toolbar")
        );
        assert!(
            messages
                .iter()
                .any(|m| matches!(m, ServerMessage::Audio { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_appends_grounded_reply() {
        let mut harness = Harness::started(ToolKind::Figma, Duration::from_millis(200)).await;

        harness
            .send(ClientMessage::UserMessage {
                text: "hello".into(),
            })
            .await;
        let messages = harness.run_for(10).await;
        let snapshot = last_snapshot(&messages);
        assert!(snapshot.thinking);
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[1].role, MessageRole::User);

        let messages = harness.run_for(300).await;
        let snapshot = snapshots(&messages)
            .into_iter()
            .find(|s| s.transcript.len() == 3)
            .expect("reply snapshot");
        assert!(!snapshot.thinking);
        assert_eq!(snapshot.transcript[2].role, MessageRole::System);
        assert_eq!(snapshot.transcript[2].sources.len(), 1);
        assert_eq!(harness.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_message_issues_no_request() {
        let mut harness = Harness::started(ToolKind::Blender, Duration::ZERO).await;
        harness
            .send(ClientMessage::UserMessage { text: "   ".into() })
            .await;
        let messages = harness.run_for(50).await;
        assert!(snapshots(&messages).iter().all(|s| s.transcript.len() == 1));
        assert_eq!(harness.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiz_gate_and_completion() {
        let mut harness = Harness::started(ToolKind::CProg, Duration::ZERO).await;

        harness.send(ClientMessage::NextStep).await;
        harness.send(ClientMessage::NextStep).await;
        let messages = harness.run_for(10).await;
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.stage, Stage::QuizGate);
        assert!(snapshot.quiz.is_some());
        assert_eq!(snapshot.progression.mastery_percent, 33);

        harness.send(ClientMessage::QuizAnswer { choice: 2 }).await;
        let messages = harness.run_for(10).await;
        assert_eq!(last_snapshot(&messages).stage, Stage::QuizGate);

        harness.send(ClientMessage::QuizAnswer { choice: 0 }).await;
        let messages = harness.run_for(10).await;
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.stage, Stage::Step2);
        assert_eq!(snapshot.progression.mastery_percent, 81);
        assert!(snapshot.quiz.is_none());

        harness.send(ClientMessage::NextStep).await;
        let messages = harness.run_for(10).await;
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.stage, Stage::Done);
        assert_eq!(snapshot.progression.mastery_percent, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_drops_late_reply() {
        let mut harness = Harness::started(ToolKind::Figma, Duration::from_millis(500)).await;

        harness
            .send(ClientMessage::UserMessage {
                text: "hello".into(),
            })
            .await;
        harness.send(ClientMessage::Exit).await;
        let messages = harness.run_for(1000).await;

        assert!(messages.iter().any(|m| matches!(m, ServerMessage::Ended)));
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.phase, SessionPhase::Ended);
        assert!(snapshot.transcript.is_empty());
        assert!(!snapshot.thinking);
        assert_eq!(harness.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_switches_tool() {
        let mut harness = Harness::started(ToolKind::Figma, Duration::ZERO).await;
        harness.send(ClientMessage::NextStep).await;
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Crypto,
            })
            .await;
        let messages = harness.run_for(10).await;
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.tool.id, ToolKind::Crypto);
        assert_eq!(snapshot.phase, SessionPhase::Provisioning);
        assert_eq!(snapshot.progression.mastery_percent, 0);

        let messages = harness.run_for(PROVISIONING.as_millis() as u64).await;
        assert_eq!(last_snapshot(&messages).phase, SessionPhase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_frames_never_overlap() {
        let mut harness = Harness::spawn(Duration::ZERO);
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Figma,
            })
            .await;
        let mut messages = harness.run_for(PROVISIONING.as_millis() as u64 + 10).await;
        harness.send(ClientMessage::NextStep).await;
        harness.send(ClientMessage::NextStep).await;
        messages.extend(harness.run_for(10).await);

        let frames = audio_frames(&messages);
        assert_eq!(frames.len(), 3);
        assert_back_to_back(&frames);
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_stays_sequential_across_restart_and_exit() {
        let provisioning = PROVISIONING.as_millis() as u64 + 10;
        let mut harness = Harness::spawn(Duration::ZERO);
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Figma,
            })
            .await;
        let mut messages = harness.run_for(provisioning).await;

        // Restart while the first greeting is still playing.
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Blender,
            })
            .await;
        messages.extend(harness.run_for(provisioning).await);

        harness.send(ClientMessage::Exit).await;
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Crypto,
            })
            .await;
        messages.extend(harness.run_for(provisioning).await);

        let frames = audio_frames(&messages);
        assert_eq!(frames.len(), 3);
        // The first greeting outlasts the provisioning delay, so the second
        // one has to wait for it rather than start at the restart time.
        assert!(frames[0].2 > PROVISIONING.as_secs_f64());
        assert_back_to_back(&frames);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speaking_indicator_rises_and_clears() {
        let mut harness = Harness::spawn(Duration::ZERO);
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Figma,
            })
            .await;
        let messages = harness.run_for(PROVISIONING.as_millis() as u64 + 10).await;
        assert!(snapshots(&messages).iter().any(|s| s.speaking));

        // The greeting is a few dozen words of simulated speech.
        let messages = harness.run_for(60_000).await;
        assert!(!last_snapshot(&messages).speaking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_only_while_active() {
        let mut harness = Harness::spawn(Duration::ZERO);
        harness
            .send(ClientMessage::Start {
                tool: ToolKind::Figma,
            })
            .await;
        let messages = harness.run_for(2000).await;
        assert!(
            !messages
                .iter()
                .any(|m| matches!(m, ServerMessage::Telemetry(_)))
        );

        let messages = harness.run_for(4000).await;
        assert!(
            messages
                .iter()
                .any(|m| matches!(m, ServerMessage::Telemetry(_)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_stops_when_client_leaves() {
        let harness = Harness::started(ToolKind::Figma, Duration::ZERO).await;
        drop(harness.inbound);
        assert!(harness.task.await.unwrap().is_ok());
    }
}
