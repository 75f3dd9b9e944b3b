//! Result persistence: one flattened row per screening run.
//!
//! The HTTP layer appends rows fire-and-forget after a run finishes; the
//! pipeline itself never touches storage.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::screening::models::PipelineResult;

/// Flattened, queryable view of a `PipelineResult`. The full result is kept
/// alongside as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningRow {
    pub id: Uuid,
    pub candidate_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub experience_years: Option<f32>,
    pub overall_score: Option<i16>,
    pub recommendation: Option<String>,
    pub status: String,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub education: Option<String>,
    pub role_title: Option<String>,
    pub rationale: Option<String>,
    pub interview_questions: Vec<String>,
    pub result: Value,
    pub created_at: DateTime<Utc>,
}

impl ScreeningRow {
    pub fn from_result(id: Uuid, result: &PipelineResult) -> Self {
        let candidate = result.candidate.as_ref();
        let score = result.score.as_ref();

        let education = candidate
            .map(|c| {
                c.education
                    .iter()
                    .filter_map(|e| match (&e.degree, &e.institution) {
                        (Some(degree), Some(institution)) => {
                            Some(format!("{degree} from {institution}"))
                        }
                        (Some(degree), None) => Some(degree.clone()),
                        (None, Some(institution)) => Some(institution.clone()),
                        (None, None) => None,
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|s| !s.is_empty());

        Self {
            id,
            candidate_name: candidate.and_then(|c| c.full_name.clone()),
            email: candidate.and_then(|c| c.contact.email.clone()),
            phone: candidate.and_then(|c| c.contact.phone.clone()),
            experience_years: candidate.and_then(|c| c.experience_years),
            overall_score: score.map(|s| i16::from(s.overall_score)),
            recommendation: score.map(|s| s.recommendation.as_str().to_string()),
            status: result.status.as_str().to_string(),
            matched_skills: score
                .map(|s| s.matched_skills.iter().cloned().collect())
                .unwrap_or_default(),
            missing_skills: score
                .map(|s| s.missing_skills.iter().cloned().collect())
                .unwrap_or_default(),
            education,
            role_title: score.and_then(|s| s.role_title.clone()),
            rationale: score.map(|s| s.rationale.clone()),
            interview_questions: result
                .report
                .as_ref()
                .map(|r| r.interview_questions.clone())
                .unwrap_or_default(),
            result: serde_json::to_value(result).unwrap_or(Value::Null),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_candidates: i64,
    pub proceeded: i64,
    /// Every run that did not end in PROCEED, failed runs included.
    pub rejected: i64,
    /// Percentage of PROCEED outcomes, one decimal place.
    pub approval_rate: f64,
}

impl SummaryStats {
    pub fn from_counts(total_candidates: i64, proceeded: i64) -> Self {
        let approval_rate = if total_candidates > 0 {
            (proceeded as f64 / total_candidates as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            total_candidates,
            proceeded,
            rejected: total_candidates - proceeded,
            approval_rate,
        }
    }
}

/// Where finished runs are recorded.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn append(&self, row: &ScreeningRow) -> Result<()>;
    async fn summary(&self) -> Result<SummaryStats>;
}

pub struct PgResultSink {
    pool: PgPool,
}

impl PgResultSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultSink for PgResultSink {
    async fn append(&self, row: &ScreeningRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO screenings
             (id, candidate_name, email, phone, experience_years, overall_score,
              recommendation, status, matched_skills, missing_skills, education,
              role_title, rationale, interview_questions, result, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(row.id)
        .bind(&row.candidate_name)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(row.experience_years)
        .bind(row.overall_score)
        .bind(&row.recommendation)
        .bind(&row.status)
        .bind(&row.matched_skills)
        .bind(&row.missing_skills)
        .bind(&row.education)
        .bind(&row.role_title)
        .bind(&row.rationale)
        .bind(&row.interview_questions)
        .bind(&row.result)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn summary(&self) -> Result<SummaryStats> {
        let (total, proceeded): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE recommendation = 'PROCEED')
             FROM screenings",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SummaryStats::from_counts(total, proceeded))
    }
}
