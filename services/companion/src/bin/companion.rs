//! services/companion/src/bin/companion.rs

use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::Router;
use companion_lib::{
    adapters::{
        gemini_client, tts::parse_voice, GeminiAssistantAdapter, GeminiImageAdapter,
        GeminiSpeechAdapter, SqliteStore,
    },
    config::Config,
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use study_companion_core::{library::Catalog, Companion, Gateways};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting companion...");

    // --- 2. Open the Local Store & Run Migrations ---
    info!("Opening local store at {}", config.database_url);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(SqliteStore::new(pool));
    store.run_migrations().await?;
    info!("Local store ready.");

    // --- 3. Initialize Gateway Adapters ---
    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; assistant features will report a missing credential");
    }
    let client = gemini_client(config.api_key.as_deref(), &config.api_base);
    let voice = parse_voice(&config.tts_voice).ok_or_else(|| {
        ApiError::Internal(format!("Invalid TTS voice specified in config: '{}'", config.tts_voice))
    })?;
    let gateways = Gateways {
        assistant: Arc::new(GeminiAssistantAdapter::new(
            client.clone(),
            config.chat_model.clone(),
            config.deep_chat_model.clone(),
        )),
        speech: Arc::new(GeminiSpeechAdapter::new(client.clone(), config.tts_model.clone(), voice)),
        images: Arc::new(GeminiImageAdapter::new(client, config.image_model.clone())),
    };

    // --- 4. Restore the Companion & Build the Shared AppState ---
    let companion = Companion::start(store, gateways, Catalog::builtin(), config.deep_reasoning).await;
    let app_state = Arc::new(AppState {
        companion: Arc::new(companion),
    });

    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid ALLOWED_ORIGIN '{}': {}", config.allowed_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(api_router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
