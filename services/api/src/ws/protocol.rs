//! Defines the WebSocket message protocol between the browser client and the API server.

use serde::{Deserialize, Serialize};
use titia_core::{
    session::{ConnectionMode, SessionSnapshot},
    telemetry::HudTelemetry,
    tool::ToolKind,
};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts (or restarts) a session for a tool. This must be the first message.
    Start { tool: ToolKind },
    /// A free-text message from the learner to the tutor.
    UserMessage { text: String },
    /// The guided "next" action.
    NextStep,
    /// Answers the quiz with a zero-based choice index.
    QuizAnswer { choice: usize },
    SetConnectionMode { mode: ConnectionMode },
    /// Tears the session down.
    Exit,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The complete session state after a change.
    Snapshot { state: SessionSnapshot },
    /// One utterance of tutor speech (base64 PCM16, mono), to start at
    /// `start_at` seconds on the session audio clock.
    Audio {
        utterance: u64,
        data: String,
        sample_rate: u32,
        start_at: f64,
        duration: f64,
    },
    /// Simulated infrastructure readings for the HUD.
    Telemetry(HudTelemetry),
    /// Reports a protocol error to the client.
    Error { message: String },
    /// Confirms the session has been torn down.
    Ended,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_parsing() {
        let start: ClientMessage =
            serde_json::from_value(json!({ "type": "start", "tool": "C_PROG" })).unwrap();
        assert_eq!(start, ClientMessage::Start { tool: ToolKind::CProg });

        let next: ClientMessage = serde_json::from_value(json!({ "type": "next_step" })).unwrap();
        assert_eq!(next, ClientMessage::NextStep);

        let answer: ClientMessage =
            serde_json::from_value(json!({ "type": "quiz_answer", "choice": 2 })).unwrap();
        assert_eq!(answer, ClientMessage::QuizAnswer { choice: 2 });

        let mode: ClientMessage =
            serde_json::from_value(json!({ "type": "set_connection_mode", "mode": "hybrid" }))
                .unwrap();
        assert_eq!(
            mode,
            ClientMessage::SetConnectionMode {
                mode: ConnectionMode::Hybrid
            }
        );

        assert!(serde_json::from_value::<ClientMessage>(json!({ "type": "dance" })).is_err());
    }

    #[test]
    fn test_server_message_tags() {
        let telemetry = serde_json::to_value(ServerMessage::Telemetry(HudTelemetry::default())).unwrap();
        assert_eq!(telemetry["type"], "telemetry");
        assert_eq!(telemetry["latency_ms"], 12.0);

        let ended = serde_json::to_value(ServerMessage::Ended).unwrap();
        assert_eq!(ended, json!({ "type": "ended" }));

        let audio = serde_json::to_value(ServerMessage::Audio {
            utterance: 3,
            data: "AAA=".into(),
            sample_rate: 24_000,
            start_at: 1.5,
            duration: 0.25,
        })
        .unwrap();
        assert_eq!(audio["type"], "audio");
        assert_eq!(audio["start_at"], 1.5);
    }
}
