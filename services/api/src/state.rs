//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like configuration and service clients.

use crate::config::Config;
use std::sync::Arc;
use titia_core::{llm_client::TextGenerator, speech::SpeechSynthesizer};

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub text_generator: Arc<dyn TextGenerator>,
    pub speech_synthesizer: Arc<dyn SpeechSynthesizer>,
    pub config: Arc<Config>,
}
