use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline error taxonomy
// ────────────────────────────────────────────────────────────────────────────

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Extraction,
    Scoring,
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extraction => "extraction",
            Stage::Scoring => "scoring",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong inside a run. Stages never propagate these as
/// faults; they are collected into `PipelineResult.errors`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("extraction degraded to heuristic parsing: {reason}")]
    ExtractionDegraded { reason: String },

    #[error("scoring degraded to the offline rubric: {reason}")]
    ScoringDegraded { reason: String },

    #[error("report generation degraded to fallback content: {reason}")]
    ReportDegraded { reason: String },

    #[error("{stage} response was malformed and repaired before parsing")]
    ParseRepaired { stage: Stage },

    #[error("{stage} could not reach the text-generation service: {message}")]
    ExternalCallUnavailable { stage: Stage, message: String },

    #[error("tool '{tool}' failed: {message}")]
    ToolInvocationFailed { tool: String, message: String },

    #[error("model reported overall score {reported}; clamped to {clamped}")]
    ScoreOutOfRange { reported: i64, clamped: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ExtractionDegraded,
    ScoringDegraded,
    ReportDegraded,
    ParseRepaired,
    ExternalCallUnavailable,
    ToolInvocationFailed,
    ScoreOutOfRange,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ExtractionDegraded { .. } => ErrorKind::ExtractionDegraded,
            PipelineError::ScoringDegraded { .. } => ErrorKind::ScoringDegraded,
            PipelineError::ReportDegraded { .. } => ErrorKind::ReportDegraded,
            PipelineError::ParseRepaired { .. } => ErrorKind::ParseRepaired,
            PipelineError::ExternalCallUnavailable { .. } => ErrorKind::ExternalCallUnavailable,
            PipelineError::ToolInvocationFailed { .. } => ErrorKind::ToolInvocationFailed,
            PipelineError::ScoreOutOfRange { .. } => ErrorKind::ScoreOutOfRange,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ExtractionDegraded { .. } => Stage::Extraction,
            PipelineError::ScoringDegraded { .. } | PipelineError::ScoreOutOfRange { .. } => {
                Stage::Scoring
            }
            PipelineError::ReportDegraded { .. } | PipelineError::ToolInvocationFailed { .. } => {
                Stage::Report
            }
            PipelineError::ParseRepaired { stage }
            | PipelineError::ExternalCallUnavailable { stage, .. } => *stage,
        }
    }

    /// Only an unreachable capability during extraction or scoring ends a run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ExternalCallUnavailable {
                stage: Stage::Extraction | Stage::Scoring,
                ..
            }
        )
    }
}

/// Serializable, human-readable form of a `PipelineError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub stage: Stage,
    pub message: String,
    pub fatal: bool,
}

impl From<&PipelineError> for ErrorDescriptor {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            stage: err.stage(),
            message: err.to_string(),
            fatal: err.is_fatal(),
        }
    }
}
