use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use renderty::config::Config;
use renderty::models::*;
use renderty::routes;
use renderty::services::queue::{create_render_queue, RenderOptions, TelegramNotifier};
use renderty::services::renderer::RemotionCliEngine;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Renderty API",
        version = "1.0.0",
        description = "API per il rendering asincrono di video quiz e l'invio su Telegram",
        license(name = "MIT"),
    ),
    paths(
        renderty::routes::health::health_check,
        renderty::routes::renders::create_render,
        renderty::routes::renders::list_renders,
        renderty::routes::renders::get_render_status,
        renderty::routes::renders::cancel_render,
        renderty::routes::renders::download_render,
        renderty::routes::renders::render_progress_stream,
    ),
    components(schemas(
        HealthResponse,
        JobCreatedResponse,
        JobStatusResponse,
        JobSummary,
        JobsListResponse,
        MessageResponse,
        ErrorResponse,
        CreateRenderRequest,
        QuizData,
        Question,
        ChatId,
        JobStatus,
        RenderError,
        RenderErrorKind,
        ProgressUpdate,
    )),
    tags(
        (name = "Renders", description = "Gestione job di rendering asincroni"),
        (name = "Sistema", description = "Health check e info"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Carica variabili da .env
    dotenvy::dotenv().ok();

    // Inizializza logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "renderty=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Carica configurazione
    let config = Config::from_env();

    if config.telegram_bot_token.is_none() {
        tracing::warn!(
            "TELEGRAM_BOT_TOKEN mancante: l'invio automatico dei video è disabilitato"
        );
    }

    // Engine di rendering (CLI Remotion via npx)
    let engine = Arc::new(RemotionCliEngine::new());
    let renderer_available = engine.available();
    if renderer_available {
        tracing::info!("CLI di rendering disponibile");
    } else {
        tracing::warn!("npx non trovato: i job di rendering falliranno");
    }

    let notifier = Arc::new(TelegramNotifier::new(
        config.telegram_bot_token.clone(),
        config.telegram_api_base.clone(),
    ));
    let telegram_enabled = notifier.is_enabled();

    // Crea la coda di rendering con broadcast channel per il progress
    let (queue, progress_tx) = create_render_queue(
        engine,
        notifier,
        RenderOptions {
            serve_url: config.serve_url.clone(),
            composition_id: config.composition_id.clone(),
            codec: config.codec.clone(),
        },
    );

    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = routes::create_router(queue, progress_tx, renderer_available, telegram_enabled);

    // Costruisci router completo con Swagger
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Avvia server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Indirizzo non valido");

    tracing::info!("========================================");
    tracing::info!("  Renderty API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("========================================");
    tracing::info!("Server: http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    tracing::info!("----------------------------------------");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  POST /renders                 - Crea job di rendering");
    tracing::info!("  GET  /renders                 - Lista job");
    tracing::info!("  GET  /renders/:id             - Stato job");
    tracing::info!("  GET  /renders/:id/progress    - SSE progress stream");
    tracing::info!("  GET  /renders/:id/download    - Scarica video");
    tracing::info!("  DEL  /renders/:id             - Annulla job");
    tracing::info!("----------------------------------------");
    tracing::info!("Composizione: {} ({})", config.composition_id, config.codec);
    tracing::info!("Serve URL: {}", config.serve_url);
    if telegram_enabled {
        tracing::info!("Telegram: configurato");
    } else {
        tracing::warn!("Telegram: NON configurato (imposta TELEGRAM_BOT_TOKEN)");
    }

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
