//! Gemini REST client for tutor text and speech.
//!
//! Both services go through `models/{model}:generateContent`. Text requests
//! enable the Google Search tool so replies come back with grounding
//! citations; speech requests ask for the `AUDIO` modality and return raw
//! PCM16 as base64 inline data.

use crate::{
    llm_client::{TextGenerator, TextReply},
    speech::SpeechSynthesizer,
    transcript::Source,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, error};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";
pub const TUTOR_TURN_PROMPT_KEY: &str = "tutor_turn";

// --- Local Gemini REST Types (for encapsulation) ---
mod gemini_types {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateContentRequest {
        pub contents: Vec<Content>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub system_instruction: Option<Content>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub tools: Vec<Tool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub generation_config: Option<GenerationConfig>,
    }
    #[derive(Serialize)]
    pub(super) struct Content {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub role: Option<String>,
        pub parts: Vec<Part>,
    }
    #[derive(Serialize)]
    pub(super) struct Part {
        pub text: String,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Tool {
        pub google_search: GoogleSearch,
    }
    #[derive(Serialize)]
    pub(super) struct GoogleSearch {}
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig {
        pub response_modalities: Vec<ResponseModality>,
        pub speech_config: SpeechConfig,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub(super) enum ResponseModality {
        Audio,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct SpeechConfig {
        pub voice_config: VoiceConfig,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct VoiceConfig {
        pub prebuilt_voice_config: PrebuiltVoiceConfig,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct PrebuiltVoiceConfig {
        pub voice_name: String,
    }

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<Candidate>,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Candidate {
        pub content: Option<CandidateContent>,
        pub grounding_metadata: Option<GroundingMetadata>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct CandidateContent {
        #[serde(default)]
        pub parts: Vec<ResponsePart>,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ResponsePart {
        pub text: Option<String>,
        pub inline_data: Option<InlineData>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct InlineData {
        pub data: String,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GroundingMetadata {
        #[serde(default)]
        pub grounding_chunks: Vec<GroundingChunk>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct GroundingChunk {
        pub web: Option<WebSource>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct WebSource {
        pub uri: Option<String>,
        pub title: Option<String>,
    }
}

use gemini_types::*;

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub chat_model: String,
    pub speech_model: String,
    pub voice: String,
}

/// An implementation of `TextGenerator` and `SpeechSynthesizer` backed by the
/// Gemini API.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
    system_prompt: String,
    turn_template: String,
}

impl GeminiClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `config` - API key, base URL and model identifiers.
    /// * `prompts` - A map of template strings, which must include the keys
    ///   `"system_prompt"` and `"tutor_turn"`.
    pub fn new(config: GeminiConfig, prompts: &HashMap<String, String>) -> Result<Self> {
        let system_prompt = prompts
            .get(SYSTEM_PROMPT_KEY)
            .context("Missing prompt template: 'system_prompt'")?
            .clone();
        let turn_template = prompts
            .get(TUTOR_TURN_PROMPT_KEY)
            .context("Missing prompt template: 'tutor_turn'")?
            .clone();
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            system_prompt,
            turn_template,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Request to model '{model}' failed"))?
            .error_for_status()
            .with_context(|| format!("Model '{model}' returned an error status"))?;
        response
            .json()
            .await
            .context("Failed to parse generateContent response")
    }
}

/// Fills the `{tool}` and `{prompt}` placeholders of the turn template.
pub fn render_turn_prompt(template: &str, tool_context: &str, prompt: &str) -> String {
    template
        .replace("{tool}", tool_context)
        .replace("{prompt}", prompt)
}

fn extract_reply(response: GenerateContentResponse) -> Result<TextReply> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("No candidate in generateContent response")?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let sources = candidate
        .grounding_metadata
        .map(|meta| {
            meta.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| Some(Source::new(web.uri?, web.title)))
                .collect()
        })
        .unwrap_or_default();

    Ok(TextReply { text, sources })
}

fn extract_audio(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .find_map(|part| part.inline_data)
        .map(|blob| blob.data)
        .filter(|data| !data.is_empty())
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, tool_context: &str) -> Result<TextReply> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: render_turn_prompt(&self.turn_template, tool_context, prompt),
                }],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: self.system_prompt.clone(),
                }],
            }),
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
            generation_config: None,
        };

        let response = self
            .generate_content(&self.config.chat_model, &request)
            .await?;
        let reply = extract_reply(response)?;
        debug!(sources = ?reply.sources, "Grounding sources");
        Ok(reply)
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str) -> Result<Option<String>> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.config.voice.clone(),
                        },
                    },
                },
            }),
            ..Default::default()
        };

        let response = self
            .generate_content(&self.config.speech_model, &request)
            .await?;
        let audio = extract_audio(response);
        if audio.is_none() {
            error!("Speech response carried no audio data");
        }
        Ok(audio)
    }
}
