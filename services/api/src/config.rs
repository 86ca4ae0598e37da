use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use titia_core::gemini::DEFAULT_API_BASE;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for tutor text and speech.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Offline,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub chat_model: String,
    pub speech_model: String,
    pub speech_voice: String,
    pub provisioning_delay: Duration,
    pub playback_sample_rate: u32,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = std::env::var("TUTOR_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "offline" => Provider::Offline,
            other => {
                return Err(ConfigError::InvalidValue(
                    "TUTOR_PROVIDER".to_string(),
                    format!("'{}' is not one of 'gemini' or 'offline'", other),
                ));
            }
        };

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let gemini_api_base =
            std::env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gemini-3-pro-preview".to_string());
        let speech_model = std::env::var("SPEECH_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash-preview-tts".to_string());
        let speech_voice = std::env::var("SPEECH_VOICE").unwrap_or_else(|_| "Kore".to_string());

        let provisioning_delay =
            Duration::from_millis(parse_var::<u64>("PROVISIONING_DELAY_MS", 2500)?);
        let playback_sample_rate = parse_var::<u32>("PLAYBACK_SAMPLE_RATE", 24_000)?;
        if playback_sample_rate == 0 {
            return Err(ConfigError::InvalidValue(
                "PLAYBACK_SAMPLE_RATE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        if provider == Provider::Gemini && gemini_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            provider,
            gemini_api_key,
            gemini_api_base,
            chat_model,
            speech_model,
            speech_voice,
            provisioning_delay,
            playback_sample_rate,
            log_level,
            prompts_path,
        })
    }
}

#[cfg(test)]
impl Config {
    /// An offline configuration with default timings, for runtime tests.
    pub(crate) fn for_tests() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            provider: Provider::Offline,
            gemini_api_key: None,
            gemini_api_base: DEFAULT_API_BASE.to_string(),
            chat_model: "gemini-3-pro-preview".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            speech_voice: "Kore".to_string(),
            provisioning_delay: Duration::from_millis(2500),
            playback_sample_rate: 24_000,
            log_level: Level::INFO,
            prompts_path: PathBuf::from("./prompts"),
        }
    }
}
