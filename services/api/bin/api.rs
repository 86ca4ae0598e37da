//! Main Entrypoint for the Titia API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading prompt templates and building the tutor providers.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use titia_api::{
    config::{Config, Provider},
    router::create_router,
    state::AppState,
};
use titia_core::{
    gemini::{GeminiClient, GeminiConfig},
    llm_client::TextGenerator,
    offline::{OfflineTutor, SilentSynthesizer},
    speech::SpeechSynthesizer,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = ?e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Tutor Providers ---
    let (text_generator, speech_synthesizer): (
        Arc<dyn TextGenerator>,
        Arc<dyn SpeechSynthesizer>,
    ) = match &config.provider {
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let prompts = load_prompts(&config.prompts_path)?;
            let api_key = config
                .gemini_api_key
                .clone()
                .context("GEMINI_API_KEY is required for the gemini provider")?;
            let client = Arc::new(GeminiClient::new(
                GeminiConfig {
                    api_key,
                    api_base: config.gemini_api_base.clone(),
                    chat_model: config.chat_model.clone(),
                    speech_model: config.speech_model.clone(),
                    voice: config.speech_voice.clone(),
                },
                &prompts,
            )?);
            (client.clone(), client)
        }
        Provider::Offline => {
            info!("Using offline provider. Replies and speech are simulated.");
            (
                Arc::new(OfflineTutor),
                Arc::new(SilentSynthesizer::default()),
            )
        }
    };

    let app_state = Arc::new(AppState {
        text_generator,
        speech_synthesizer,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        chat_model = %config.chat_model,
        speech_model = %config.speech_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
