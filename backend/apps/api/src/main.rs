//! API Server Entry Point
//!
//! Demo server mounting the AuthKit composition under `/auth`.
//! Uses `anyhow` for startup errors.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use authkit::AuthKit;
use axum::{
    Router, http,
    http::{Method, header},
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix the composition is nested under
const MOUNT_PREFIX: &str = "/auth";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,authkit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3000u16);

    // AuthKit configuration; absent file means built-in defaults
    let mut config = match env::var("AUTHKIT_CONFIG") {
        Ok(path) => {
            let raw = tokio::fs::read_to_string(&path).await?;
            tracing::info!(path = %path, "Loaded AuthKit configuration");
            serde_json::from_str(&raw)?
        }
        Err(_) => serde_json::json!({}),
    };

    // Mailed links must carry the mount prefix
    if let serde_json::Value::Object(root) = &mut config {
        root.entry("url")
            .or_insert_with(|| format!("http://localhost:{port}{MOUNT_PREFIX}").into());
    }

    let app_dir = env::var("AUTHKIT_APP_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public"));

    let kit = AuthKit::builder(config).with_app_dir(app_dir).build().await?;

    // Log the unified event stream
    let mut events = kit.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::info!(event = event.name(), user = %event.user().name, "AuthKit event");
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest(MOUNT_PREFIX, kit.router())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
