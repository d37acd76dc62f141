//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        audio_store::FsAudioStore, chat_llm::OpenAiChatAdapter, db::DbAdapter,
        sst::OpenAiSstAdapter, subscription::DbSubscriptionAdapter, tts::OpenAiTtsAdapter,
    },
    config::Config,
    error::ApiError,
    lesson::LessonDeps,
    web::{
        create_lesson_handler, feedback_handler, get_lesson_handler, get_module_handler,
        get_turns_handler, link_lesson_handler, list_lessons_handler, rest::ApiDoc,
        state::AppState, submit_turn_handler, unlink_lesson_handler,
    },
};
use async_openai::{
    config::OpenAIConfig,
    types::audio::{SpeechModel, Voice},
    Client,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let chat_adapter = Arc::new(OpenAiChatAdapter::new(
        openai_client.clone(),
        config.chat_model.clone(),
    ));
    let sst_adapter = Arc::new(OpenAiSstAdapter::new(
        openai_client.clone(),
        config.sst_model.clone(),
    ));

    let tts_voice = match config.tts_voice.to_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => {
            return Err(ApiError::Internal(format!(
                "Invalid TTS voice specified in config: '{}'",
                config.tts_voice
            )))
        }
    };
    let tts_adapter = Arc::new(OpenAiTtsAdapter::new(
        openai_client.clone(),
        SpeechModel::Tts1Hd,
        tts_voice,
    ));

    let subscription_adapter = Arc::new(DbSubscriptionAdapter::new(db_pool.clone()));
    let audio_store = Arc::new(FsAudioStore::new(
        config.upload_dir.clone(),
        config.public_base_url.clone(),
    )?);

    // --- 4. Build the Shared AppState ---
    let lesson_deps = LessonDeps {
        db: db_adapter,
        chat: chat_adapter,
        sst: sst_adapter,
        tts: tts_adapter,
        subscriptions: subscription_adapter,
        audio_store,
    };
    let app_state = Arc::new(AppState {
        config: config.clone(),
        lesson: lesson_deps,
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/lessons/{lesson_type}", post(create_lesson_handler))
        .route("/lessons", get(list_lessons_handler))
        .route("/lessons/{lesson_id}", get(get_lesson_handler))
        .route(
            "/lessons/{lesson_id}/modules/{skill}",
            get(get_module_handler),
        )
        .route(
            "/lessons/{lesson_id}/feedback/{skill}",
            post(feedback_handler),
        )
        .route("/lessons/{lesson_id}/link", post(link_lesson_handler))
        .route("/lessons/{lesson_id}/unlink", post(unlink_lesson_handler))
        .route(
            "/speaking/{module_id}/turns",
            post(submit_turn_handler).get(get_turns_handler),
        )
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state.clone());

    // Merge the API router with the audio file server and the Swagger UI.
    let app = Router::new()
        .merge(api_router)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
