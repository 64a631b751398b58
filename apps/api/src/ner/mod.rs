// Token-classification pipeline: model-backed tagging plus the pure
// reconstruction walk that turns sub-word predictions into entities.

pub mod reconstruct;
pub mod tagger;

// Re-export the public API consumed by other modules (scoring, handlers).
pub use reconstruct::{reconstruct_entities, Entity};
pub use tagger::{EntityTagger, NerModel, TagError, TokenPrediction};
