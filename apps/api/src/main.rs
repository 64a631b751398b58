mod config;
mod errors;
mod extract;
mod matching;
mod ner;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::ner::{EntityTagger, NerModel};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CvMatch API v{}", env!("CARGO_PKG_VERSION"));

    // Uploaded resumes land here under their client-supplied filenames.
    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!(
            "failed to create upload directory {}",
            config.upload_dir.display()
        )
    })?;
    info!("Upload directory ready at {}", config.upload_dir.display());

    // Load the token-classification model once; read-only afterwards.
    let tagger: Arc<dyn EntityTagger> = Arc::new(
        NerModel::load(&config.model_dir).with_context(|| {
            format!("failed to load NER model from {}", config.model_dir.display())
        })?,
    );
    info!("NER model loaded from {}", config.model_dir.display());

    let state = AppState {
        config: config.clone(),
        tagger,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
