//! Upload form and match endpoints.

use axum::{
    extract::{Multipart, State},
    response::Html,
    Json,
};
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;
use crate::extract::extract_text;
use crate::matching::scoring::{score_match, MatchReport};
use crate::state::AppState;

/// A complete form submission: resume file plus non-empty jd text.
struct MatchSubmission {
    filename: String,
    resume: Bytes,
    jd_text: String,
}

/// GET /
pub async fn show_form() -> Html<String> {
    Html(render_page(None))
}

/// POST /
///
/// A submission with both a resume file and a non-empty `jd_text` runs
/// the persist → extract → tag → score pipeline and re-renders the form
/// with the score. An incomplete submission re-renders the bare form and
/// is not an error.
pub async fn handle_match(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let Some(submission) = read_submission(multipart).await? else {
        return Ok(Html(render_page(None)));
    };

    let report = run_pipeline(&state, submission).await?;
    Ok(Html(render_page(Some(report.score))))
}

/// POST /api/v1/match
///
/// Same pipeline as the form route, returning the full report as JSON
/// (score plus both entity sets). Missing fields are a validation error
/// here; there is no form to fall back to.
pub async fn handle_match_api(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<MatchReport>, AppError> {
    let submission = read_submission(multipart).await?.ok_or_else(|| {
        AppError::Validation(
            "both a 'resume' file and a non-empty 'jd_text' field are required".to_string(),
        )
    })?;

    let report = run_pipeline(&state, submission).await?;
    Ok(Json(report))
}

/// Persists the upload, then extracts and scores it against the jd text.
async fn run_pipeline(
    state: &AppState,
    submission: MatchSubmission,
) -> Result<MatchReport, AppError> {
    // Uploads keep the client-supplied filename verbatim: no sanitization
    // and no collision handling, so a repeated filename overwrites.
    let resume_path = state.config.upload_dir.join(&submission.filename);
    tokio::fs::write(&resume_path, &submission.resume)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to persist upload: {e}")))?;

    let tagger = state.tagger.clone();
    let jd_text = submission.jd_text;
    // PDF parsing and the two inference passes are CPU-bound; keep them
    // off the async worker threads.
    let report = tokio::task::spawn_blocking(move || -> Result<MatchReport, AppError> {
        let resume_text = extract_text(&resume_path)?;
        Ok(score_match(&resume_text, &jd_text, tagger.as_ref())?)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("match task panicked: {e}")))??;

    info!(
        score = report.score,
        cv_entities = report.cv_entities.len(),
        jd_entities = report.jd_entities.len(),
        "match scored"
    );
    Ok(report)
}

/// Reads the multipart fields, returning `None` unless both a non-empty
/// resume file and non-empty (trimmed) jd text were submitted.
async fn read_submission(mut multipart: Multipart) -> Result<Option<MatchSubmission>, AppError> {
    let mut resume: Option<(String, Bytes)> = None;
    let mut jd_text: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart request: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?;
                if !filename.is_empty() && !data.is_empty() {
                    resume = Some((filename, data));
                }
            }
            "jd_text" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read jd_text: {e}")))?;
                let text = text.trim().to_string();
                if !text.is_empty() {
                    jd_text = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(match (resume, jd_text) {
        (Some((filename, resume)), Some(jd_text)) => Some(MatchSubmission {
            filename,
            resume,
            jd_text,
        }),
        _ => None,
    })
}

/// Renders the single-page UI. `None` is the bare form.
fn render_page(score: Option<f64>) -> String {
    let score_block = match score {
        Some(score) => format!(
            "<p class=\"score\">Match Score: <strong>{score}%</strong></p>"
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Resume Match</title>
</head>
<body>
  <h1>Resume / Job Description Match</h1>
  <form method="post" action="/" enctype="multipart/form-data">
    <p><label>Resume (PDF): <input type="file" name="resume" accept="application/pdf"></label></p>
    <p><label>Job description:<br><textarea name="jd_text" rows="10" cols="60"></textarea></label></p>
    <p><button type="submit">Score match</button></p>
  </form>
  {score_block}
</body>
</html>
"#
    )
}
