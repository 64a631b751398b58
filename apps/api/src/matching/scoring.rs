//! Matcher / scorer: entity-set overlap between a resume and a job
//! description.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::ner::{reconstruct_entities, EntityTagger, TagError};

/// Result of one resume / job-description comparison.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    /// Percentage of job-description entities also found in the resume,
    /// in [0, 100], rounded to 2 decimal places.
    pub score: f64,
    pub cv_entities: BTreeSet<String>,
    pub jd_entities: BTreeSet<String>,
}

/// Tags and reconstructs both texts independently, then scores
/// `100 * |cv ∩ jd| / |jd|`.
///
/// The denominator is always the job-description set: the score reads
/// "how much of what the role asks for shows up in the resume", so
/// swapping the two inputs changes the result. An empty jd set scores
/// exactly 0.0 by explicit guard rather than dividing by zero.
pub fn score_match(
    cv_text: &str,
    jd_text: &str,
    tagger: &dyn EntityTagger,
) -> Result<MatchReport, TagError> {
    let cv_entities = entity_set(cv_text, tagger)?;
    let jd_entities = entity_set(jd_text, tagger)?;

    let overlap = cv_entities.intersection(&jd_entities).count();
    let total = jd_entities.len();

    let score = if total > 0 {
        round2(overlap as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    Ok(MatchReport {
        score,
        cv_entities,
        jd_entities,
    })
}

/// Lowercased, deduplicated entity texts for one document (labels dropped).
fn entity_set(text: &str, tagger: &dyn EntityTagger) -> Result<BTreeSet<String>, TagError> {
    let predictions = tagger.tag(text)?;
    Ok(reconstruct_entities(&predictions)
        .into_iter()
        .map(|entity| entity.text.to_lowercase())
        .collect())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
