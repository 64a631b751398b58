#![allow(dead_code)]

//! Token-classification tagging behind the `EntityTagger` seam.
//!
//! `NerModel` runs a local ONNX token-classification model (BERT-style
//! sub-word vocabulary) through `ort`, decoding one arg-max label per
//! token. Handlers and tests consume the `EntityTagger` trait instead of
//! the concrete model so inference can be scripted in tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use ndarray::Array2;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use thiserror::Error;
use tokenizers::{Tokenizer, TruncationParams};

/// Token budget per document. The model has a fixed context window; the
/// tokenizer truncates silently at this length, so entities past the
/// budget are simply absent from the output rather than an error.
pub const MAX_SEQ_LEN: usize = 512;

/// Label id the model's scheme reserves for "no entity".
pub const NO_ENTITY_ID: usize = 0;

/// Marker BERT-style vocabularies prefix onto non-initial word fragments.
const CONTINUATION_MARKER: &str = "##";

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to load tokenizer: {0}")]
    TokenizerLoad(String),

    #[error("Failed to load model config: {0}")]
    ConfigLoad(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Tokenization failed: {0}")]
    Tokenize(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// One tokenizer token with the label the model predicted for it.
///
/// `text` is the surface form with any continuation marker already
/// stripped. `offsets` is the half-open char range into the source text,
/// zero-width for special tokens. `label` is `None` when the model
/// predicted the "no entity" tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPrediction {
    pub text: String,
    pub is_continuation: bool,
    pub offsets: (usize, usize),
    pub label: Option<String>,
}

/// Tags text with one label prediction per sub-word token.
///
/// Carried in `AppState` as `Arc<dyn EntityTagger>`, swapped for a
/// scripted double in tests.
pub trait EntityTagger: Send + Sync {
    fn tag(&self, text: &str) -> Result<Vec<TokenPrediction>, TagError>;
}

/// The loaded token-classification model: tokenizer, label map, and ONNX
/// session. Constructed once at startup, immutable afterwards.
pub struct NerModel {
    tokenizer: Tokenizer,
    id2label: HashMap<usize, String>,
    /// `Session::run` takes `&mut self`, so inference serializes here.
    session: Mutex<Session>,
}

impl NerModel {
    /// Loads `tokenizer.json`, `config.json` and `model.onnx` from a local
    /// model directory (CPU execution).
    pub fn load(model_dir: &Path) -> Result<Self, TagError> {
        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| TagError::TokenizerLoad(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| TagError::TokenizerLoad(e.to_string()))?;

        let config_path = model_dir.join("config.json");
        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| TagError::ConfigLoad(format!("{}: {e}", config_path.display())))?;
        let config_json: serde_json::Value =
            serde_json::from_str(&config_str).map_err(|e| TagError::ConfigLoad(e.to_string()))?;
        let id2label = parse_id2label(&config_json)?;

        let session = Session::builder()
            .map_err(|e| TagError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| TagError::ModelLoad(e.to_string()))?
            .with_intra_threads(4)
            .map_err(|e| TagError::ModelLoad(e.to_string()))?
            .commit_from_file(model_dir.join("model.onnx"))
            .map_err(|e| TagError::ModelLoad(e.to_string()))?;

        Ok(Self {
            tokenizer,
            id2label,
            session: Mutex::new(session),
        })
    }
}

impl EntityTagger for NerModel {
    fn tag(&self, text: &str) -> Result<Vec<TokenPrediction>, TagError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| TagError::Tokenize(e.to_string()))?;

        let seq_len = encoding.get_ids().len();
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        // Single-sequence input: segment ids are all zero.
        let token_type_ids = vec![0i64; seq_len];

        let input_ids = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| TagError::Inference(e.to_string()))?;
        let attention_mask = Array2::from_shape_vec((1, seq_len), attention_mask)
            .map_err(|e| TagError::Inference(e.to_string()))?;
        let token_type_ids = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| TagError::Inference(e.to_string()))?;

        let input_ids =
            Tensor::from_array(input_ids).map_err(|e| TagError::Inference(e.to_string()))?;
        let attention_mask =
            Tensor::from_array(attention_mask).map_err(|e| TagError::Inference(e.to_string()))?;
        let token_type_ids =
            Tensor::from_array(token_type_ids).map_err(|e| TagError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| TagError::Inference("model session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids.into_dyn(),
                "attention_mask" => attention_mask.into_dyn(),
                "token_type_ids" => token_type_ids.into_dyn(),
            ])
            .map_err(|e| TagError::Inference(e.to_string()))?;

        let logits = outputs
            .get("logits")
            .ok_or_else(|| TagError::Inference("model output has no 'logits' tensor".to_string()))?;
        let (shape, logits_data) = logits
            .try_extract_tensor::<f32>()
            .map_err(|e| TagError::Inference(e.to_string()))?;

        // Expected shape: [1, seq_len, num_labels].
        if shape.len() != 3 || shape[0] != 1 {
            return Err(TagError::Inference(format!(
                "unexpected logits shape: {shape:?}"
            )));
        }
        let out_len = shape[1] as usize;
        let num_labels = shape[2] as usize;

        let tokens = encoding.get_tokens();
        let offsets = encoding.get_offsets();

        let mut predictions = Vec::with_capacity(out_len.min(tokens.len()));
        for idx in 0..out_len.min(tokens.len()) {
            let row = &logits_data[idx * num_labels..(idx + 1) * num_labels];
            let label_id = argmax(row);
            let (is_continuation, fragment) = split_continuation(&tokens[idx]);
            predictions.push(TokenPrediction {
                text: fragment.to_string(),
                is_continuation,
                offsets: offsets[idx],
                label: resolve_label(&self.id2label, label_id),
            });
        }
        Ok(predictions)
    }
}

/// Index of the largest logit; the first index wins a tie.
fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &val) in row.iter().enumerate() {
        if val > best_val {
            best_val = val;
            best = idx;
        }
    }
    best
}

/// Splits a raw vocabulary token into (is_continuation, fragment with the
/// marker stripped).
fn split_continuation(surface: &str) -> (bool, &str) {
    match surface.strip_prefix(CONTINUATION_MARKER) {
        Some(rest) => (true, rest),
        None => (false, surface),
    }
}

/// Maps a predicted label id to its tag. Id 0 is "no entity"; ids missing
/// from the map resolve to a synthetic `LABEL_{id}` tag.
fn resolve_label(id2label: &HashMap<usize, String>, label_id: usize) -> Option<String> {
    if label_id == NO_ENTITY_ID {
        return None;
    }
    Some(
        id2label
            .get(&label_id)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{label_id}")),
    )
}

/// Reads the `id2label` map out of a HuggingFace-style `config.json`.
fn parse_id2label(config: &serde_json::Value) -> Result<HashMap<usize, String>, TagError> {
    let map: HashMap<usize, String> = config
        .get("id2label")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(id, label)| {
                    Some((id.parse::<usize>().ok()?, label.as_str()?.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    if map.is_empty() {
        return Err(TagError::ConfigLoad(
            "config.json has no id2label map".to_string(),
        ));
    }
    Ok(map)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 2.5, -1.0, 0.9]), 1);
    }

    #[test]
    fn test_argmax_tie_keeps_first() {
        assert_eq!(argmax(&[3.0, 3.0, 1.0]), 0);
    }

    #[test]
    fn test_split_continuation_strips_marker() {
        assert_eq!(split_continuation("##thon"), (true, "thon"));
        assert_eq!(split_continuation("Python"), (false, "Python"));
    }

    #[test]
    fn test_split_continuation_special_tokens_are_word_starts() {
        assert_eq!(split_continuation("[CLS]"), (false, "[CLS]"));
    }

    #[test]
    fn test_parse_id2label_reads_hf_config() {
        let config = json!({
            "id2label": { "0": "O", "1": "SKILL", "2": "ORG" }
        });
        let map = parse_id2label(&config).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&1).unwrap(), "SKILL");
    }

    #[test]
    fn test_parse_id2label_missing_map_is_config_error() {
        let err = parse_id2label(&json!({ "model_type": "bert" })).unwrap_err();
        assert!(matches!(err, TagError::ConfigLoad(_)));
    }

    #[test]
    fn test_parse_id2label_skips_non_numeric_ids() {
        let config = json!({
            "id2label": { "0": "O", "one": "SKILL", "2": "ORG" }
        });
        let map = parse_id2label(&config).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_resolve_label_zero_is_no_entity() {
        let map = HashMap::from([(1, "SKILL".to_string())]);
        assert_eq!(resolve_label(&map, NO_ENTITY_ID), None);
    }

    #[test]
    fn test_resolve_label_known_and_unknown_ids() {
        let map = HashMap::from([(1, "SKILL".to_string())]);
        assert_eq!(resolve_label(&map, 1).as_deref(), Some("SKILL"));
        assert_eq!(resolve_label(&map, 7).as_deref(), Some("LABEL_7"));
    }
}
