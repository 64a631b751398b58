use std::sync::Arc;

use crate::config::Config;
use crate::ner::EntityTagger;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The one loaded token-classification model, read-only after startup.
    /// Swapped for a scripted double in tests.
    pub tagger: Arc<dyn EntityTagger>,
}
