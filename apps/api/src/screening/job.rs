//! Job profile: deterministic reading of a job requirement text.
//!
//! Feeds the offline rubric, the default matched/missing skill sets and the
//! role title. No LLM call: the scoring stage spends its single call on the
//! candidate-vs-job judgement.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::screening::heuristics::{canonical_skill, contains_term, detect_skills};

lazy_static! {
    /// "Job Title: ...", "Position - ...", "## Role: ..."
    static ref RE_TITLE_LINE: Regex =
        Regex::new(r"(?i)^[#*\s]*(?:job\s+title|title|position|role)\s*[:\-]\s*(.+)$").unwrap();

    /// "3+ years", "minimum 2 years", "at least 5 yrs"
    static ref RE_REQUIRED_YEARS: Regex =
        Regex::new(r"(?i)\b(\d{1,2})\s*\+?\s*(?:years?|yrs?)\b").unwrap();
}

/// Required years assumed when the job text does not state any.
pub const DEFAULT_REQUIRED_YEARS: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProfile {
    pub role_title: Option<String>,
    /// Vocabulary skills mentioned in the job text, by canonical name.
    pub required_skills: BTreeSet<String>,
    pub required_years: f32,
}

impl JobProfile {
    pub fn from_text(job_text: &str) -> Self {
        Self {
            role_title: find_role_title(job_text),
            required_skills: detect_skills(job_text),
            required_years: find_required_years(job_text).unwrap_or(DEFAULT_REQUIRED_YEARS),
        }
    }

    /// Splits the required skills into (matched, missing) for a candidate's skills.
    /// A candidate skill matches when it names the same vocabulary entry or
    /// mentions the required skill as a whole term.
    pub fn compare_skills(
        &self,
        candidate_skills: &BTreeSet<String>,
    ) -> (BTreeSet<String>, BTreeSet<String>) {
        let lowered: Vec<String> = candidate_skills.iter().map(|s| s.to_lowercase()).collect();
        let canonical: BTreeSet<&str> = candidate_skills
            .iter()
            .filter_map(|s| canonical_skill(s))
            .collect();

        self.required_skills.iter().cloned().partition(|required| {
            let required_lower = required.to_lowercase();
            canonical.contains(required.as_str())
                || lowered.iter().any(|s| contains_term(s, &required_lower))
        })
    }
}

fn find_role_title(job_text: &str) -> Option<String> {
    let clean = |s: &str| s.trim().trim_matches(|c| c == '*' || c == '#').trim().to_string();

    if let Some(title) = job_text
        .lines()
        .find_map(|line| RE_TITLE_LINE.captures(line.trim()))
        .and_then(|c| c.get(1))
        .map(|m| clean(m.as_str()))
        .filter(|t| !t.is_empty())
    {
        return Some(title);
    }

    let first = job_text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let first = clean(first);
    let looks_like_title = !first.is_empty()
        && first.chars().count() <= 80
        && !first.ends_with('.')
        && !first.contains(':');
    looks_like_title.then_some(first)
}

/// Smallest "N years" figure; job texts usually state the minimum first and
/// mention larger numbers only for company history.
fn find_required_years(job_text: &str) -> Option<f32> {
    RE_REQUIRED_YEARS
        .captures_iter(job_text)
        .filter_map(|c| c.get(1)?.as_str().parse::<f32>().ok())
        .filter(|y| (1.0..=20.0).contains(y))
        .fold(None, |best: Option<f32>, y| Some(best.map_or(y, |b| b.min(y))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const AI_JOB: &str = "**Job Title:** AI Engineer\n\
        We are looking for an engineer with 2+ years of experience.\n\
        Required skills: Python, PyTorch, LangChain, LLM, Docker, AWS.\n\
        Founded 15 years ago.";

    fn skills(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_profile_reads_title_skills_and_years() {
        let profile = JobProfile::from_text(AI_JOB);
        assert_eq!(profile.role_title.as_deref(), Some("AI Engineer"));
        assert_eq!(
            profile.required_skills,
            skills(&["AWS", "Docker", "LLM", "LangChain", "PyTorch", "Python"])
        );
        assert_eq!(profile.required_years, 2.0);
    }

    #[test]
    fn test_title_falls_back_to_first_line() {
        let profile = JobProfile::from_text("Senior Data Analyst\nYou will build dashboards.");
        assert_eq!(profile.role_title.as_deref(), Some("Senior Data Analyst"));
        assert_eq!(profile.required_years, DEFAULT_REQUIRED_YEARS);
    }

    #[test]
    fn test_sentence_first_line_is_not_a_title() {
        let profile = JobProfile::from_text("We are hiring engineers to join our team.");
        assert!(profile.role_title.is_none());
    }

    #[test]
    fn test_compare_skills_matches_loose_spellings() {
        let profile = JobProfile::from_text(AI_JOB);
        let candidate = skills(&["python 3", "pytorch", "Amazon Web Services", "HTML"]);
        let (matched, missing) = profile.compare_skills(&candidate);
        assert_eq!(matched, skills(&["AWS", "PyTorch", "Python"]));
        assert_eq!(missing, skills(&["Docker", "LLM", "LangChain"]));
    }

    #[test]
    fn test_compare_skills_with_no_requirements() {
        let profile = JobProfile::from_text("Friendly team seeks a colleague");
        let (matched, missing) = profile.compare_skills(&skills(&["Python"]));
        assert!(matched.is_empty());
        assert!(missing.is_empty());
    }
}
