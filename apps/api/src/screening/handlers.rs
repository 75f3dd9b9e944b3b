//! Axum route handlers for the Screening API.

use std::cmp::Reverse;
use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::screening::documents::{detect_kind, document_text};
use crate::screening::models::{PipelineResult, RawInput};
use crate::screening::store::{ScreeningRow, SummaryStats};
use crate::state::AppState;

/// Upper bound on resumes in one batch request.
pub const MAX_BATCH_SIZE: usize = 50;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScreeningRequest {
    pub resume_text: String,
    pub job_text: String,
    #[serde(default)]
    pub threshold: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct ScreeningResponse {
    pub screening_id: Uuid,
    #[serde(flatten)]
    pub result: PipelineResult,
}

#[derive(Debug, Deserialize)]
pub struct BatchResume {
    pub label: String,
    pub resume_text: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub job_text: String,
    #[serde(default)]
    pub threshold: Option<u8>,
    pub resumes: Vec<BatchResume>,
}

#[derive(Debug, Serialize)]
pub struct RankedScreening {
    pub rank: usize,
    pub label: String,
    pub screening_id: Uuid,
    #[serde(flatten)]
    pub result: PipelineResult,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub total: usize,
    pub proceeded: usize,
    pub results: Vec<RankedScreening>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/screenings
///
/// Screens one pasted resume against a job description.
pub async fn handle_screen(
    State(state): State<AppState>,
    Json(request): Json<ScreeningRequest>,
) -> Result<Json<ScreeningResponse>, AppError> {
    require_text("resume_text", &request.resume_text)?;
    require_text("job_text", &request.job_text)?;
    let threshold = resolve_threshold(&state, request.threshold)?;

    let raw = RawInput {
        resume_text: request.resume_text,
        job_text: request.job_text,
    };
    Ok(Json(screen(&state, raw, threshold).await?))
}

/// POST /api/v1/screenings/upload
///
/// Multipart form: `resume` (PDF, DOCX or TXT file), `job_text`, optional `threshold`.
pub async fn handle_screen_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScreeningResponse>, AppError> {
    let mut resume_text = None;
    let mut job_text = None;
    let mut threshold = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let kind = detect_kind(field.file_name(), field.content_type())?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                resume_text = Some(document_text(data, kind).await?);
            }
            "job_text" => {
                job_text = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "threshold" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                threshold = Some(value.trim().parse::<u8>().map_err(|_| {
                    AppError::Validation(format!("threshold '{value}' is not a number 0-100"))
                })?);
            }
            other => warn!("Ignoring unexpected multipart field '{other}'"),
        }
    }

    let resume_text =
        resume_text.ok_or_else(|| AppError::Validation("resume file is required".to_string()))?;
    let job_text = job_text.unwrap_or_default();
    require_text("job_text", &job_text)?;
    let threshold = resolve_threshold(&state, threshold)?;

    let raw = RawInput {
        resume_text,
        job_text,
    };
    Ok(Json(screen(&state, raw, threshold).await?))
}

/// POST /api/v1/screenings/batch
///
/// Screens several resumes against one job and ranks them by score.
/// Runs share the service-wide concurrency cap.
pub async fn handle_screen_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    require_text("job_text", &request.job_text)?;
    if request.resumes.is_empty() {
        return Err(AppError::Validation("resumes cannot be empty".to_string()));
    }
    if request.resumes.len() > MAX_BATCH_SIZE {
        return Err(AppError::Validation(format!(
            "at most {MAX_BATCH_SIZE} resumes per batch"
        )));
    }
    for resume in &request.resumes {
        require_text(&format!("resume_text of '{}'", resume.label), &resume.resume_text)?;
    }
    let threshold = resolve_threshold(&state, request.threshold)?;

    info!("Batch screening {} resumes", request.resumes.len());

    let job_text: Arc<str> = request.job_text.into();
    let mut tasks = JoinSet::new();
    for resume in request.resumes {
        let state = state.clone();
        let job_text = Arc::clone(&job_text);
        tasks.spawn(async move {
            let raw = RawInput {
                resume_text: resume.resume_text,
                job_text: job_text.to_string(),
            };
            screen(&state, raw, threshold)
                .await
                .map(|response| (resume.label, response))
        });
    }

    let mut screened = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (label, response) = joined.map_err(|e| AppError::Internal(e.into()))??;
        screened.push((label, response));
    }

    // Highest score first; unscored (failed) runs last; label breaks ties.
    screened.sort_by(|(a_label, a), (b_label, b)| {
        let a_score = a.result.score.as_ref().map(|s| s.overall_score);
        let b_score = b.result.score.as_ref().map(|s| s.overall_score);
        Reverse(a_score)
            .cmp(&Reverse(b_score))
            .then_with(|| a_label.cmp(b_label))
    });

    let results: Vec<RankedScreening> = screened
        .into_iter()
        .enumerate()
        .map(|(i, (label, response))| RankedScreening {
            rank: i + 1,
            label,
            screening_id: response.screening_id,
            result: response.result,
        })
        .collect();
    let proceeded = results
        .iter()
        .filter(|r| r.result.report.is_some())
        .count();

    Ok(Json(BatchResponse {
        total: results.len(),
        proceeded,
        results,
    }))
}

/// GET /api/v1/screenings/summary
pub async fn handle_summary(
    State(state): State<AppState>,
) -> Result<Json<SummaryStats>, AppError> {
    let sink = state.sink.as_ref().ok_or_else(|| {
        AppError::Unavailable("result persistence is disabled; set DATABASE_URL".to_string())
    })?;
    Ok(Json(sink.summary().await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn resolve_threshold(state: &AppState, requested: Option<u8>) -> Result<u8, AppError> {
    match requested {
        Some(t) if t > 100 => Err(AppError::Validation(format!(
            "threshold must be between 0 and 100, got {t}"
        ))),
        Some(t) => Ok(t),
        None => Ok(state.pipeline.threshold()),
    }
}

/// Runs the pipeline under the concurrency cap, then records the result
/// without waiting for storage.
async fn screen(
    state: &AppState,
    raw: RawInput,
    threshold: u8,
) -> Result<ScreeningResponse, AppError> {
    let _permit = state
        .run_limiter
        .acquire()
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let result = state.pipeline.run_with_threshold(&raw, threshold).await;
    let screening_id = Uuid::new_v4();

    if let Some(sink) = state.sink.clone() {
        let row = ScreeningRow::from_result(screening_id, &result);
        tokio::spawn(async move {
            if let Err(e) = sink.append(&row).await {
                warn!("Failed to persist screening {}: {e:#}", row.id);
            }
        });
    }

    info!(
        "Screening {screening_id} finished with status {}",
        result.status.as_str()
    );
    Ok(ScreeningResponse {
        screening_id,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::screening::models::RunStatus;
    use crate::screening::pipeline::{Pipeline, PipelineSettings};
    use crate::screening::testing::{call_of, text_completion, Call, ScriptedGenerator};
    use crate::screening::tools::ToolRegistry;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use tokio::sync::Semaphore;

    fn state(llm: ScriptedGenerator) -> AppState {
        AppState {
            pipeline: Pipeline::new(
                Arc::new(llm),
                Arc::new(ToolRegistry::standard()),
                PipelineSettings::default(),
            ),
            sink: None,
            run_limiter: Arc::new(Semaphore::new(2)),
        }
    }

    /// Alpha scores 40 and Beta scores 80.
    fn scoring_by_resume() -> ScriptedGenerator {
        ScriptedGenerator::new(|request| {
            let prompt = match &request.messages[0].content[0] {
                crate::llm_client::ContentBlock::Text { text } => text.clone(),
                _ => String::new(),
            };
            match call_of(request) {
                Call::Extraction => {
                    let name = if prompt.contains("Alpha") { "Alpha Person" } else { "Beta Person" };
                    Ok(text_completion(&format!(r#"{{"full_name": "{name}", "skills": ["Python"]}}"#)))
                }
                Call::Scoring => {
                    let score = if prompt.contains("Alpha Person") { 40 } else { 80 };
                    Ok(text_completion(&format!(r#"{{"overall_score": {score}}}"#)))
                }
                _ => Err(LlmError::EmptyContent),
            }
        })
    }

    #[tokio::test]
    async fn test_empty_resume_text_is_rejected() {
        let request = ScreeningRequest {
            resume_text: "   ".to_string(),
            job_text: "Python developer".to_string(),
            threshold: None,
        };
        let err = handle_screen(State(state(ScriptedGenerator::unavailable())), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_threshold_above_100_is_rejected() {
        let request = ScreeningRequest {
            resume_text: "Alpha Person".to_string(),
            job_text: "Python developer".to_string(),
            threshold: Some(101),
        };
        let result =
            handle_screen(State(state(ScriptedGenerator::unavailable())), Json(request)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_screen_returns_failed_run_in_body() {
        let request = ScreeningRequest {
            resume_text: "Alpha Person\nPython".to_string(),
            job_text: "Python developer".to_string(),
            threshold: None,
        };
        let Json(response) =
            handle_screen(State(state(ScriptedGenerator::unavailable())), Json(request))
                .await
                .unwrap();
        assert_eq!(response.result.status, RunStatus::Failed);

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("screening_id").is_some());
        assert_eq!(value["status"], "FAILED");
    }

    #[tokio::test]
    async fn test_batch_is_ranked_by_score() {
        let request = BatchRequest {
            job_text: "Python developer".to_string(),
            threshold: Some(70),
            resumes: vec![
                BatchResume {
                    label: "a".to_string(),
                    resume_text: "Alpha Person\nPython".to_string(),
                },
                BatchResume {
                    label: "b".to_string(),
                    resume_text: "Beta Person\nPython".to_string(),
                },
            ],
        };
        let Json(response) = handle_screen_batch(State(state(scoring_by_resume())), Json(request))
            .await
            .unwrap();

        assert_eq!(response.total, 2);
        assert_eq!(response.proceeded, 1);
        assert_eq!(response.results[0].label, "b");
        assert_eq!(response.results[0].rank, 1);
        assert_eq!(response.results[0].result.status, RunStatus::Completed);
        assert_eq!(response.results[1].label, "a");
        assert_eq!(response.results[1].result.status, RunStatus::Rejected);
    }

    #[tokio::test]
    async fn test_summary_without_persistence_is_unavailable() {
        let err = handle_summary(State(state(ScriptedGenerator::unavailable())))
            .await
            .unwrap_err();
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
