//! Records that flow through a screening run. Created fresh per run and
//! passed by value from stage to stage; no stage mutates an earlier output.
//!
//! Sets and maps are ordered so the JSON export is byte-stable across runs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ErrorDescriptor;

/// Default PROCEED threshold on `overall_score`.
pub const DEFAULT_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub resume_text: String,
    pub job_text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate record
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceEntry {
    #[serde(alias = "role", deserialize_with = "lenient::opt_string")]
    pub title: Option<String>,
    #[serde(alias = "company", deserialize_with = "lenient::opt_string")]
    pub organization: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub duration: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub degree: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub institution: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub year: Option<String>,
}

/// Structured view of a resume. Every field is optional; extraction may be partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRecord {
    #[serde(alias = "name", deserialize_with = "lenient::opt_string")]
    pub full_name: Option<String>,
    pub contact: Contact,
    /// Estimated total years of professional experience.
    #[serde(deserialize_with = "lenient::opt_f32")]
    pub experience_years: Option<f32>,
    #[serde(alias = "work_experience")]
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    #[serde(deserialize_with = "lenient::string_set")]
    pub skills: BTreeSet<String>,
    #[serde(deserialize_with = "lenient::string_set")]
    pub certifications: BTreeSet<String>,
}

impl CandidateRecord {
    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.contact == Contact::default()
            && self.experience_years.is_none()
            && self.experience.is_empty()
            && self.education.is_empty()
            && self.skills.is_empty()
            && self.certifications.is_empty()
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Candidate")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    /// Came from a full structured parse (possibly after repair).
    High,
    /// Came from heuristic extraction over the raw text.
    Partial,
}

// ────────────────────────────────────────────────────────────────────────────
// Score
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Proceed,
    Reject,
}

impl Recommendation {
    /// The only place the PROCEED/REJECT decision is derived.
    pub fn from_score(overall_score: u8, threshold: u8) -> Self {
        if overall_score >= threshold {
            Recommendation::Proceed
        } else {
            Recommendation::Reject
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Proceed => "PROCEED",
            Recommendation::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    /// Parsed from the model's structured response.
    Model,
    /// Computed offline by the rubric scorer.
    Rubric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Always within 0..=100.
    pub overall_score: u8,
    pub sub_scores: BTreeMap<String, u8>,
    pub matched_skills: BTreeSet<String>,
    pub missing_skills: BTreeSet<String>,
    pub rationale: String,
    /// Always `Recommendation::from_score(overall_score, threshold)`.
    pub recommendation: Recommendation,
    pub role_title: Option<String>,
    pub method: ScoringMethod,
}

// ────────────────────────────────────────────────────────────────────────────
// Report and final result
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResult {
    pub interview_questions: Vec<String>,
    pub email_template: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    Rejected,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "COMPLETED",
            RunStatus::Rejected => "REJECTED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// The externally visible outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub status: RunStatus,
    pub threshold: u8,
    pub candidate: Option<CandidateRecord>,
    pub confidence: Option<Confidence>,
    pub score: Option<ScoreResult>,
    pub report: Option<ReportResult>,
    pub errors: Vec<ErrorDescriptor>,
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient field decoders for model-produced JSON
// ────────────────────────────────────────────────────────────────────────────

mod lenient {
    use super::*;
    use serde_json::Value;

    fn scalar_string(value: Value) -> Option<String> {
        let s = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        let lowered = s.to_ascii_lowercase();
        if s.is_empty() || matches!(lowered.as_str(), "null" | "n/a" | "none" | "unknown") {
            None
        } else {
            Some(s)
        }
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_string(Value::deserialize(d)?))
    }

    pub fn opt_f32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f32>, D::Error> {
        let value = Value::deserialize(d)?;
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s
                .trim()
                .trim_end_matches(['+', ' '])
                .split_whitespace()
                .next()
                .and_then(|t| t.trim_end_matches('+').parse::<f64>().ok()),
            _ => None,
        };
        Ok(number
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as f32))
    }

    /// Accepts an array of scalars or a single comma-separated string.
    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().filter_map(scalar_string).collect(),
            Value::String(s) => s
                .split([',', ';', '\n'])
                .filter_map(|part| scalar_string(Value::String(part.to_string())))
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn string_set<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
        Ok(string_list(d)?.into_iter().collect())
    }
}
