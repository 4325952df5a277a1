use std::sync::Arc;

use quote_flow::{ConversationRunner, InMemorySessionStorage, SessionStorage, TurnController};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vehicle_quote_service::{AppState, LlmSlotExtractor, Settings, build_router, cors_layer};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "vehicle_quote_service=debug,quote_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    info!(
        ttl_seconds = settings.session_ttl.num_seconds(),
        "Using in-memory session storage"
    );
    let session_storage: Arc<dyn SessionStorage> =
        Arc::new(InMemorySessionStorage::with_ttl(settings.session_ttl));

    let extractor = Arc::new(LlmSlotExtractor::new(
        &settings.openrouter_api_key,
        &settings.llm_model,
    ));
    let runner = ConversationRunner::new(TurnController::new(extractor), session_storage);

    let app = build_router(AppState { runner })
        .layer(cors_layer(settings.allowed_origins.as_deref()));

    let addr = settings.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
