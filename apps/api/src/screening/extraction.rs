//! Extraction stage: resume text to `CandidateRecord`.
//!
//! One structured-generation call, decoded through the tolerant-parse ladder.
//! When the model's answer is unusable the stage degrades to heuristic
//! extraction (`Confidence::Partial`) instead of failing. Only an unreachable
//! text-generation service is returned as an error.

use std::time::Duration;

use tracing::{info, warn};

use crate::errors::{PipelineError, Stage};
use crate::llm_client::prompts::fill_template;
use crate::llm_client::structured::{parse_tolerant, ParseOutcome};
use crate::llm_client::{generate_text, TextGenerator};
use crate::screening::heuristics;
use crate::screening::models::{CandidateRecord, Confidence};
use crate::screening::prompts::{EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_SYSTEM};

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub candidate: CandidateRecord,
    pub confidence: Confidence,
    /// Non-fatal events (repairs, degradation) in the order they happened.
    pub issues: Vec<PipelineError>,
}

impl Extraction {
    fn degraded(resume_text: &str, reason: String) -> Self {
        warn!("Extraction degraded to heuristics: {reason}");
        Self {
            candidate: heuristics::extract_candidate(resume_text),
            confidence: Confidence::Partial,
            issues: vec![PipelineError::ExtractionDegraded { reason }],
        }
    }
}

/// Extracts a candidate record from normalized resume text.
pub async fn extract(
    resume_text: &str,
    llm: &dyn TextGenerator,
    timeout: Duration,
) -> Result<Extraction, PipelineError> {
    if resume_text.trim().is_empty() {
        return Ok(Extraction::degraded(
            resume_text,
            "resume text is empty".to_string(),
        ));
    }

    let prompt = fill_template(EXTRACTION_PROMPT_TEMPLATE, &[("resume_text", resume_text)]);
    let response = match generate_text(llm, EXTRACTION_SYSTEM, &prompt, timeout).await {
        Ok(text) => text,
        Err(e) if e.is_unavailable() => {
            return Err(PipelineError::ExternalCallUnavailable {
                stage: Stage::Extraction,
                message: e.to_string(),
            })
        }
        Err(e) => return Ok(Extraction::degraded(resume_text, e.to_string())),
    };

    let outcome = parse_tolerant::<CandidateRecord>(&response);
    let repaired = outcome.was_repaired();
    let candidate = match outcome {
        ParseOutcome::Strict(record) | ParseOutcome::Repaired(record) if !record.is_empty() => {
            record
        }
        ParseOutcome::Strict(_) | ParseOutcome::Repaired(_) => {
            return Ok(Extraction::degraded(
                resume_text,
                "model returned an empty record".to_string(),
            ))
        }
        ParseOutcome::Failed(reason) => {
            return Ok(Extraction::degraded(
                resume_text,
                format!("unparseable model response: {reason}"),
            ))
        }
    };

    let mut issues = Vec::new();
    if repaired {
        issues.push(PipelineError::ParseRepaired {
            stage: Stage::Extraction,
        });
    }

    info!(
        "Extracted candidate {:?}: {} skills, {} roles",
        candidate.full_name,
        candidate.skills.len(),
        candidate.experience.len()
    );

    Ok(Extraction {
        candidate,
        confidence: Confidence::High,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::screening::testing::{Call, ScriptedGenerator};
    use proptest::prelude::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    const RESUME: &str = "Priya Raman\npriya.raman@example.com\n3 years of Python and PyTorch.";

    const RECORD_JSON: &str = r#"{
        "full_name": "Priya Raman",
        "contact": {"email": "priya.raman@example.com", "phone": null},
        "experience_years": 3,
        "experience": [{"title": "AI Engineer", "organization": "Nimbus Labs",
                        "duration": "2021 - 2024", "highlights": []}],
        "education": [],
        "skills": ["Python", "PyTorch"],
        "certifications": []
    }"#;

    #[tokio::test]
    async fn test_clean_response_is_high_confidence() {
        let llm = ScriptedGenerator::replying(RECORD_JSON);
        let extraction = extract(RESUME, &llm, TIMEOUT).await.unwrap();
        assert_eq!(extraction.confidence, Confidence::High);
        assert!(extraction.issues.is_empty());
        assert_eq!(extraction.candidate.full_name.as_deref(), Some("Priya Raman"));
        assert_eq!(extraction.candidate.experience_years, Some(3.0));
        assert_eq!(llm.calls(Call::Extraction), 1);
    }

    #[tokio::test]
    async fn test_prose_wrapped_response_is_repaired_and_high() {
        let wrapped = format!(
            "Here is the parsed resume:\n```json\n{RECORD_JSON}\n```\nHope this helps!"
        );
        let llm = ScriptedGenerator::replying(&wrapped);
        let extraction = extract(RESUME, &llm, TIMEOUT).await.unwrap();
        assert_eq!(extraction.confidence, Confidence::High);
        assert_eq!(
            extraction.issues,
            vec![PipelineError::ParseRepaired {
                stage: Stage::Extraction
            }]
        );
        assert!(extraction.candidate.skills.contains("PyTorch"));
    }

    #[tokio::test]
    async fn test_garbage_response_degrades_to_heuristics() {
        let llm = ScriptedGenerator::replying("I'm sorry, I cannot help with that.");
        let extraction = extract(RESUME, &llm, TIMEOUT).await.unwrap();
        assert_eq!(extraction.confidence, Confidence::Partial);
        assert!(matches!(
            extraction.issues[0],
            PipelineError::ExtractionDegraded { .. }
        ));
        assert_eq!(
            extraction.candidate.contact.email.as_deref(),
            Some("priya.raman@example.com")
        );
        assert!(extraction.candidate.skills.contains("Python"));
    }

    #[tokio::test]
    async fn test_empty_object_degrades() {
        let llm = ScriptedGenerator::replying("{}");
        let extraction = extract(RESUME, &llm, TIMEOUT).await.unwrap();
        assert_eq!(extraction.confidence, Confidence::Partial);
    }

    #[tokio::test]
    async fn test_empty_resume_skips_the_call() {
        let llm = ScriptedGenerator::unavailable();
        let extraction = extract("", &llm, TIMEOUT).await.unwrap();
        assert_eq!(extraction.confidence, Confidence::Partial);
        assert!(extraction.candidate.is_empty());
        assert_eq!(llm.calls(Call::Extraction), 0);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let llm = ScriptedGenerator::unavailable();
        let err = extract(RESUME, &llm, TIMEOUT).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.stage(), Stage::Extraction);
    }

    #[tokio::test]
    async fn test_rejected_request_degrades_to_heuristics() {
        let llm = ScriptedGenerator::new(|_| {
            Err(LlmError::Api {
                status: 400,
                message: "prompt is too long".to_string(),
            })
        });
        let extraction = extract(RESUME, &llm, TIMEOUT).await.unwrap();
        assert_eq!(extraction.confidence, Confidence::Partial);
        assert!(matches!(
            extraction.issues[..],
            [PipelineError::ExtractionDegraded { .. }]
        ));
        assert_eq!(extraction.candidate.full_name.as_deref(), Some("Priya Raman"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_extraction_never_fails_on_arbitrary_text(
            resume in any::<String>(),
            reply in prop_oneof![
                Just(String::new()),
                Just("{\"skills\": [".to_string()),
                Just("[1, 2, 3]".to_string()),
                any::<String>(),
            ],
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let llm = ScriptedGenerator::replying(&reply);
            let extraction = rt.block_on(extract(&resume, &llm, TIMEOUT));
            prop_assert!(extraction.is_ok());
        }
    }
}
