//! Entity reconstruction: merges sub-word token predictions into whole-word
//! entities.

use serde::Serialize;

use crate::ner::tagger::TokenPrediction;

/// A reconstructed whole word or multi-token span with its predicted label.
/// Case-preserving; lowercasing happens only at comparison time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

/// The word currently being assembled.
///
/// Two effective states: empty/unlabeled (nothing pending) and labeled
/// (a word in progress). Fragments may also accumulate onto an unlabeled
/// accumulator after a discarded word start; `flush` drops them.
#[derive(Debug, Default)]
struct PendingEntity {
    text: String,
    label: Option<String>,
}

impl PendingEntity {
    /// Emits the pending word and resets. Only a non-empty, labeled
    /// accumulator produces an entity.
    fn flush(&mut self) -> Option<Entity> {
        let entity = match self.label.take() {
            Some(label) if !self.text.is_empty() => Some(Entity {
                text: std::mem::take(&mut self.text),
                label,
            }),
            _ => None,
        };
        self.text.clear();
        entity
    }

    /// Extends the pending word with a continuation fragment. The
    /// fragment's own predicted label is ignored; only the label assigned
    /// at the word start counts.
    fn append_fragment(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// Restarts the accumulator at a word boundary. A "no entity"
    /// prediction discards the token's text entirely rather than starting
    /// an unlabeled word.
    fn start_word(&mut self, token: &TokenPrediction) {
        match &token.label {
            Some(label) => {
                self.text = token.text.clone();
                self.label = Some(label.clone());
            }
            None => {
                self.text.clear();
                self.label = None;
            }
        }
    }
}

/// Walks token predictions in input order and merges continuation
/// fragments into whole-word entities.
///
/// A word-start token first flushes whatever word was pending, then either
/// begins a new labeled word or, on a "no entity" prediction, leaves the
/// accumulator empty. A continuation token appends to the accumulator
/// unconditionally; fragments continuing a discarded word start therefore
/// land on an unlabeled accumulator and are lost at the next flush.
/// Emission order is input order.
pub fn reconstruct_entities(predictions: &[TokenPrediction]) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut pending = PendingEntity::default();

    for token in predictions {
        if token.is_continuation {
            pending.append_fragment(&token.text);
        } else {
            entities.extend(pending.flush());
            pending.start_word(token);
        }
    }
    entities.extend(pending.flush());

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, label: Option<&str>) -> TokenPrediction {
        TokenPrediction {
            text: text.to_string(),
            is_continuation: false,
            offsets: (0, text.len()),
            label: label.map(String::from),
        }
    }

    fn cont(text: &str) -> TokenPrediction {
        TokenPrediction {
            text: text.to_string(),
            is_continuation: true,
            offsets: (0, text.len()),
            label: None,
        }
    }

    fn cont_labeled(text: &str, label: &str) -> TokenPrediction {
        TokenPrediction {
            label: Some(label.to_string()),
            ..cont(text)
        }
    }

    #[test]
    fn test_continuation_fragments_merge_into_one_word() {
        let entities = reconstruct_entities(&[word("Py", Some("SKILL")), cont("thon")]);
        assert_eq!(
            entities,
            vec![Entity {
                text: "Python".to_string(),
                label: "SKILL".to_string(),
            }]
        );
    }

    #[test]
    fn test_continuation_own_label_is_ignored() {
        let entities = reconstruct_entities(&[
            word("Post", Some("SKILL")),
            cont_labeled("gre", "ORG"),
            cont_labeled("SQL", "LOC"),
        ]);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "PostgreSQL");
        assert_eq!(entities[0].label, "SKILL");
    }

    #[test]
    fn test_no_entity_word_start_flushes_pending() {
        let entities = reconstruct_entities(&[
            word("Python", Some("SKILL")),
            word("the", None),
            word("SQL", Some("SKILL")),
        ]);
        let texts: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Python", "SQL"]);
    }

    #[test]
    fn test_no_entity_word_start_discards_own_text() {
        assert!(reconstruct_entities(&[word("the", None)]).is_empty());
    }

    #[test]
    fn test_orphaned_continuation_text_is_lost() {
        // "lorem" tokenized as lo + ##rem with a no-entity word start: the
        // fragment has nothing labeled to continue and vanishes.
        let entities = reconstruct_entities(&[
            word("lo", None),
            cont("rem"),
            word("SQL", Some("SKILL")),
        ]);
        let texts: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["SQL"]);
    }

    #[test]
    fn test_trailing_pending_word_is_emitted() {
        let entities = reconstruct_entities(&[
            word("skilled", None),
            word("Ku", Some("SKILL")),
            cont("ber"),
            cont("netes"),
        ]);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Kubernetes");
    }

    #[test]
    fn test_empty_input_yields_no_entities() {
        assert!(reconstruct_entities(&[]).is_empty());
    }

    #[test]
    fn test_emission_preserves_input_order() {
        let entities = reconstruct_entities(&[
            word("Rust", Some("SKILL")),
            word("at", None),
            word("Acme", Some("ORG")),
            word("using", None),
            word("Tokio", Some("SKILL")),
        ]);
        let texts: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Rust", "Acme", "Tokio"]);
    }

    #[test]
    fn test_never_emits_empty_text_or_missing_label() {
        // A deliberately messy stream: orphaned fragments, special-token
        // style empty offsets, back-to-back discarded starts.
        let stream = vec![
            word("[CLS]", None),
            word("the", None),
            cont("se"),
            word("Py", Some("SKILL")),
            cont("thon"),
            word("and", None),
            word("SQL", Some("SKILL")),
            word("[SEP]", None),
        ];
        let entities = reconstruct_entities(&stream);
        assert!(entities.iter().all(|e| !e.text.is_empty()));
        assert!(entities.iter().all(|e| !e.label.is_empty()));
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_reconstruction_is_idempotent() {
        let stream = vec![
            word("Ja", Some("SKILL")),
            cont("va"),
            word("developer", Some("TITLE")),
        ];
        assert_eq!(reconstruct_entities(&stream), reconstruct_entities(&stream));
    }
}
