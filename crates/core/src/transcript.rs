//! Chat transcript types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// A citation attached to a tutor reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

const UNTITLED_SOURCE: &str = "Source";

impl Source {
    /// Builds a citation, labelling it "Source" when the title is missing
    /// or blank.
    pub fn new(uri: impl Into<String>, title: Option<String>) -> Self {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED_SOURCE.to_string());
        Self {
            uri: uri.into(),
            title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            timestamp: Utc::now(),
            sources: Vec::new(),
        }
    }

    pub fn system(text: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            role: MessageRole::System,
            text: text.into(),
            timestamp: Utc::now(),
            sources,
        }
    }
}

/// Append-only list of messages for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops every message. Only a session restart or exit does this.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_display() {
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::System.to_string(), "system");
    }

    #[test]
    fn test_source_title_falls_back() {
        let untitled = Source::new("https://example.com", Some("  ".into()));
        assert_eq!(untitled.title, "Source");
        assert_eq!(Source::new("https://example.com", None).title, "Source");

        let titled = Source::new("https://example.com", Some("Example".into()));
        assert_eq!(titled.title, "Example");
        assert_eq!(titled.uri, "https://example.com");
    }

    #[test]
    fn test_message_serialization_omits_empty_sources() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "hi");
        assert!(json.get("sources").is_none());

        let reply = Message::system(
            "see docs",
            vec![Source {
                uri: "https://docs.example.com".into(),
                title: "Docs".into(),
            }],
        );
        let json = serde_json::to_value(reply).unwrap();
        assert_eq!(json["sources"][0]["uri"], "https://docs.example.com");
    }

    #[test]
    fn test_transcript_append_and_clear() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());
        transcript.push(Message::user("one"));
        transcript.push(Message::system("two", vec![]));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().map(|m| m.role), Some(MessageRole::System));

        transcript.clear();
        assert!(transcript.is_empty());
    }
}
