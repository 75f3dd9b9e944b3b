//! Scoring stage: candidate vs job requirements.
//!
//! The model scores against a fixed rubric. Its answer is validated before it
//! is trusted: the overall score is clamped to 0..=100, malformed sub-scores are
//! dropped and the recommendation is always recomputed from the threshold.
//! When the answer is unusable, `RubricScorer` computes the same rubric offline.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{PipelineError, Stage};
use crate::llm_client::prompts::{fill_template, FAIRNESS_INSTRUCTION};
use crate::llm_client::structured::{parse_tolerant, ParseOutcome};
use crate::llm_client::{generate_text, TextGenerator};
use crate::screening::heuristics::contains_term;
use crate::screening::job::JobProfile;
use crate::screening::models::{CandidateRecord, Recommendation, ScoreResult, ScoringMethod};
use crate::screening::prompts::{SCORING_PROMPT_TEMPLATE, SCORING_SYSTEM};

pub const SKILLS_MATCH: &str = "skills_match";
pub const EXPERIENCE_RELEVANCE: &str = "experience_relevance";
pub const EDUCATION_FIT: &str = "education_fit";
pub const CERTIFICATIONS: &str = "certifications";

/// Rubric criteria and their weights in percent.
pub const RUBRIC: [(&str, u32); 4] = [
    (SKILLS_MATCH, 40),
    (EXPERIENCE_RELEVANCE, 30),
    (EDUCATION_FIT, 20),
    (CERTIFICATIONS, 10),
];

/// Skill sub-score when the job names no vocabulary skills at all.
const NEUTRAL_SKILL_SCORE: u8 = 50;

/// Relevance credit for work history that names none of the job's terms.
const ADJACENT_EXPERIENCE_CREDIT: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Scoring {
    pub score: ScoreResult,
    pub issues: Vec<PipelineError>,
}

/// The PROCEED/REJECT decision. Pure; reads the already-validated score.
pub fn gate(score: &ScoreResult) -> Recommendation {
    score.recommendation
}

/// Scores a candidate against the job text.
pub async fn score(
    candidate: &CandidateRecord,
    job_text: &str,
    threshold: u8,
    llm: &dyn TextGenerator,
    timeout: Duration,
) -> Result<Scoring, PipelineError> {
    let profile = JobProfile::from_text(job_text);

    let candidate_json =
        serde_json::to_string_pretty(candidate).unwrap_or_else(|_| "{}".to_string());
    let threshold_text = threshold.to_string();
    let prompt = fill_template(
        SCORING_PROMPT_TEMPLATE,
        &[
            ("fairness_instruction", FAIRNESS_INSTRUCTION),
            ("candidate_json", &candidate_json),
            ("job_text", job_text),
            ("threshold", &threshold_text),
        ],
    );

    let response = match generate_text(llm, SCORING_SYSTEM, &prompt, timeout).await {
        Ok(text) => text,
        Err(e) if e.is_unavailable() => {
            return Err(PipelineError::ExternalCallUnavailable {
                stage: Stage::Scoring,
                message: e.to_string(),
            })
        }
        Err(e) => return Ok(rubric_fallback(candidate, &profile, threshold, e.to_string())),
    };

    let outcome = parse_tolerant::<Value>(&response);
    let repaired = outcome.was_repaired();
    let value = match outcome {
        ParseOutcome::Strict(v) | ParseOutcome::Repaired(v) => v,
        ParseOutcome::Failed(reason) => {
            return Ok(rubric_fallback(
                candidate,
                &profile,
                threshold,
                format!("unparseable model response: {reason}"),
            ))
        }
    };

    let Some((score, mut issues)) = interpret_response(&value, candidate, &profile, threshold)
    else {
        return Ok(rubric_fallback(
            candidate,
            &profile,
            threshold,
            "model response has no usable overall_score".to_string(),
        ));
    };

    if repaired {
        issues.insert(
            0,
            PipelineError::ParseRepaired {
                stage: Stage::Scoring,
            },
        );
    }

    info!(
        "Scored {}: {}/100 ({})",
        candidate.display_name(),
        score.overall_score,
        score.recommendation.as_str()
    );

    Ok(Scoring { score, issues })
}

fn rubric_fallback(
    candidate: &CandidateRecord,
    profile: &JobProfile,
    threshold: u8,
    reason: String,
) -> Scoring {
    warn!("Scoring degraded to the offline rubric: {reason}");
    Scoring {
        score: RubricScorer.score(candidate, profile, threshold),
        issues: vec![PipelineError::ScoringDegraded { reason }],
    }
}

/// Validates a parsed scoring response. `None` when it carries no usable
/// overall score.
fn interpret_response(
    value: &Value,
    candidate: &CandidateRecord,
    profile: &JobProfile,
    threshold: u8,
) -> Option<(ScoreResult, Vec<PipelineError>)> {
    let object = value.as_object()?;
    let reported = object
        .get("overall_score")
        .or_else(|| object.get("score"))
        .and_then(read_number)?;

    let mut issues = Vec::new();
    let overall_score = clamp_percent(reported);
    if i64::from(overall_score) != reported {
        warn!("Model reported overall score {reported}; clamped to {overall_score}");
        issues.push(PipelineError::ScoreOutOfRange {
            reported,
            clamped: overall_score,
        });
    }

    let mut sub_scores = BTreeMap::new();
    if let Some(entries) = object.get("sub_scores").and_then(Value::as_object) {
        for (criterion, raw) in entries {
            match read_number(raw) {
                Some(n) => {
                    sub_scores.insert(criterion.clone(), clamp_percent(n));
                }
                None => debug!("Dropping malformed sub-score '{criterion}': {raw}"),
            }
        }
    }

    let (default_matched, default_missing) = profile.compare_skills(&candidate.skills);
    let matched_skills = read_string_set(object.get("matched_skills")).unwrap_or(default_matched);
    let missing_skills = read_string_set(object.get("missing_skills")).unwrap_or(default_missing);

    let recommendation = Recommendation::from_score(overall_score, threshold);
    let stated = object
        .get("recommendation")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_uppercase());
    if let Some(stated) = stated {
        if stated != recommendation.as_str() {
            warn!(
                "Model recommended {stated} but score {overall_score} against threshold \
                 {threshold} gives {}",
                recommendation.as_str()
            );
        }
    }

    let rationale = object
        .get("rationale")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Scored {overall_score}/100 against the job requirements."));

    let role_title = object
        .get("role_title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| profile.role_title.clone());

    let score = ScoreResult {
        overall_score,
        sub_scores,
        matched_skills,
        missing_skills,
        rationale,
        recommendation,
        role_title,
        method: ScoringMethod::Model,
    };
    Some((score, issues))
}

/// Integer reading of a JSON number or numeric string ("85", "85/100", "85.4").
fn read_number(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s
            .trim()
            .split('/')
            .next()?
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .ok()?,
        _ => return None,
    };
    // `as` saturates for out-of-range floats.
    n.is_finite().then(|| n.round() as i64)
}

fn clamp_percent(n: i64) -> u8 {
    n.clamp(0, 100) as u8
}

fn read_string_set(value: Option<&Value>) -> Option<BTreeSet<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// RubricScorer: deterministic offline rung
// ────────────────────────────────────────────────────────────────────────────

/// Applies the rubric weights without a model call.
///
/// - skills: share of the job's vocabulary skills the candidate lists
/// - experience: half years against required years (capped), half relevance.
///   Relevance is full when a past title or highlight mentions a required
///   skill or a role-title word, and half for any other work history.
/// - education: any degree
/// - certifications: any certification
pub struct RubricScorer;

impl RubricScorer {
    pub fn score(
        &self,
        candidate: &CandidateRecord,
        profile: &JobProfile,
        threshold: u8,
    ) -> ScoreResult {
        let (matched, missing) = profile.compare_skills(&candidate.skills);
        let required = profile.required_skills.len();

        let skills = if required == 0 {
            NEUTRAL_SKILL_SCORE
        } else {
            percent(matched.len() as f32 / required as f32)
        };

        let years = candidate.experience_years.unwrap_or(0.0);
        let years_ratio = if profile.required_years > 0.0 {
            (years / profile.required_years).min(1.0)
        } else {
            1.0
        };
        let relevant = has_relevant_experience(candidate, profile);
        let relevance = if relevant {
            1.0
        } else if candidate.experience.is_empty() {
            0.0
        } else {
            ADJACENT_EXPERIENCE_CREDIT
        };
        let experience = percent(0.5 * years_ratio + 0.5 * relevance);

        let has_degree = candidate.education.iter().any(|e| e.degree.is_some());
        let education = if has_degree { 100 } else { 0 };
        let certifications = if candidate.certifications.is_empty() { 0 } else { 100 };

        let sub_scores = BTreeMap::from([
            (SKILLS_MATCH.to_string(), skills),
            (EXPERIENCE_RELEVANCE.to_string(), experience),
            (EDUCATION_FIT.to_string(), education),
            (CERTIFICATIONS.to_string(), certifications),
        ]);

        let weighted: u32 = RUBRIC
            .iter()
            .map(|(criterion, weight)| weight * u32::from(sub_scores[*criterion]))
            .sum();
        let overall_score = ((weighted as f32) / 100.0).round().min(100.0) as u8;

        let rationale = format!(
            "Rubric score: {}/{} required skills matched, {:.1} of {:.1} required years{}, {}, {}.",
            matched.len(),
            required,
            years,
            profile.required_years,
            if relevant { " in related work" } else { "" },
            if has_degree { "degree listed" } else { "no degree listed" },
            if certifications > 0 {
                "certifications listed"
            } else {
                "no certifications listed"
            },
        );

        ScoreResult {
            overall_score,
            sub_scores,
            matched_skills: matched,
            missing_skills: missing,
            rationale,
            recommendation: Recommendation::from_score(overall_score, threshold),
            role_title: profile.role_title.clone(),
            method: ScoringMethod::Rubric,
        }
    }
}

fn percent(ratio: f32) -> u8 {
    (ratio.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn has_relevant_experience(candidate: &CandidateRecord, profile: &JobProfile) -> bool {
    let mut terms: Vec<String> = profile
        .required_skills
        .iter()
        .map(|s| s.to_lowercase())
        .collect();
    if let Some(title) = &profile.role_title {
        terms.extend(
            title
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() >= 3)
                .map(str::to_lowercase),
        );
    }
    if terms.is_empty() {
        return false;
    }

    candidate.experience.iter().any(|entry| {
        let mut text = entry.title.clone().unwrap_or_default();
        for highlight in &entry.highlights {
            text.push(' ');
            text.push_str(highlight);
        }
        let text = text.to_lowercase();
        terms.iter().any(|term| contains_term(&text, term))
    })
}
