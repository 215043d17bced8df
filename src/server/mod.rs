//! HTTP surface: routing, middleware stack and process lifecycle.

pub mod handlers;
pub mod middleware;

use crate::config::Config;
use crate::generate::ImageGenerator;
use crate::rate_limit::SlidingWindowLimiter;
use crate::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub generator: Arc<ImageGenerator>,
    pub limiter: Arc<SlidingWindowLimiter>,
}

impl AppState {
    pub fn new(generator: ImageGenerator) -> Self {
        let config = Arc::new(generator.config().clone());
        let limiter = SlidingWindowLimiter::new(config.rate_limit_max, config.rate_limit_window);

        Self {
            config,
            generator: Arc::new(generator),
            limiter: Arc::new(limiter),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = if config.production {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring invalid CORS origin '{}': {}", o, e);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    } else {
        AllowOrigin::mirror_request()
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::HEAD, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/generate-image", post(handlers::generate_image))
        .fallback(handlers::api_not_found)
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api);

    let static_dir = &state.config.static_dir;
    if static_dir.is_dir() {
        info!("Serving static client from {}", static_dir.display());
        let index = ServeFile::new(static_dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(static_dir).fallback(index));
    }

    let mut router = router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&state.config));

    if state.config.production {
        router = router.layer(from_fn_with_state(state.clone(), middleware::enforce_origin));
    }

    router
        .layer(from_fn_with_state(
            state.clone(),
            middleware::security_headers,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Periodically forget clients whose requests have left the window.
fn spawn_limiter_sweeper(limiter: Arc<SlidingWindowLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        loop {
            interval.tick().await;
            limiter.prune(tokio::time::Instant::now());
        }
    });
}

/// Bind the configured port and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    let port = config.port;
    let mock_ai = config.mock_ai;

    let generator = ImageGenerator::from_config(Arc::new(config));
    let state = AppState::new(generator);
    spawn_limiter_sweeper(state.limiter.clone());

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://localhost:{}", port);
    if mock_ai {
        info!("MOCK_AI enabled: returning placeholder images");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
