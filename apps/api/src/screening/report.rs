//! Report stage: interview material for a candidate who passed the gate.
//!
//! Three parts, each with its own fallback so the stage always returns a
//! complete `ReportResult`:
//! - interview questions from the model, else a fixed bank plus questions
//!   aimed at the missing skills
//! - the invitation email, produced by the email tool when the model calls it,
//!   else the same template rendered offline
//! - a short summary from the model, else one built from the score

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::{PipelineError, Stage};
use crate::llm_client::prompts::{fill_template, FAIRNESS_INSTRUCTION};
use crate::llm_client::structured::{parse_tolerant, ParseOutcome};
use crate::llm_client::{
    complete_within, generate_text, CompletionRequest, ContentBlock, LlmError, Message, Role,
    TextGenerator,
};
use crate::screening::models::{CandidateRecord, ReportResult, ScoreResult};
use crate::screening::prompts::{
    EMAIL_AGENT_PROMPT_TEMPLATE, EMAIL_AGENT_SYSTEM, REPORT_PROMPT_TEMPLATE, REPORT_SYSTEM,
};
use crate::screening::tools::{render_invitation, Invitation, ToolRegistry};

/// Upper bound on model turns in the email agent loop.
pub const MAX_AGENT_STEPS: usize = 3;

const MAX_QUESTIONS: usize = 10;
const MISSING_SKILL_QUESTIONS: usize = 2;

const GENERIC_QUESTIONS: [&str; 5] = [
    "Tell us about your experience with the technologies mentioned in your resume.",
    "How do you stay updated with the latest trends in your field?",
    "Describe a challenging project you worked on and how you overcame obstacles.",
    "What interests you most about this role?",
    "Where do you see yourself in the next 3-5 years?",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub report: ReportResult,
    pub issues: Vec<PipelineError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportDraft {
    interview_questions: Vec<serde_json::Value>,
    summary: Option<String>,
}

/// Builds the HR report. Never fails; every problem ends up in `issues`.
pub async fn generate_report(
    candidate: &CandidateRecord,
    score: &ScoreResult,
    llm: &dyn TextGenerator,
    tools: &ToolRegistry,
    timeout: Duration,
) -> ReportOutcome {
    let mut issues = Vec::new();

    let draft = draft_questions(candidate, score, llm, timeout, &mut issues).await;
    let interview_questions = match draft.as_ref().map(question_list) {
        Some(questions) if !questions.is_empty() => questions,
        Some(_) => {
            issues.push(PipelineError::ReportDegraded {
                reason: "model returned no interview questions".to_string(),
            });
            fallback_questions(score)
        }
        None => fallback_questions(score),
    };

    let summary = draft
        .and_then(|d| d.summary)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_summary(candidate, score));

    let email_template = match run_email_agent(candidate, score, llm, tools, timeout, &mut issues)
        .await
    {
        Some(email) => email,
        None => {
            debug!("Using the offline invitation template");
            offline_invitation(candidate, score)
        }
    };

    info!(
        "Report ready for {}: {} questions, {} issue(s)",
        candidate.display_name(),
        interview_questions.len(),
        issues.len()
    );

    ReportOutcome {
        report: ReportResult {
            interview_questions,
            email_template,
            summary,
        },
        issues,
    }
}

/// One structured request for questions and summary. `None` when nothing usable came back.
async fn draft_questions(
    candidate: &CandidateRecord,
    score: &ScoreResult,
    llm: &dyn TextGenerator,
    timeout: Duration,
    issues: &mut Vec<PipelineError>,
) -> Option<ReportDraft> {
    let candidate_json =
        serde_json::to_string_pretty(candidate).unwrap_or_else(|_| "{}".to_string());
    let score_json = serde_json::to_string_pretty(score).unwrap_or_else(|_| "{}".to_string());
    let prompt = fill_template(
        REPORT_PROMPT_TEMPLATE,
        &[
            ("fairness_instruction", FAIRNESS_INSTRUCTION),
            ("candidate_json", &candidate_json),
            ("score_json", &score_json),
        ],
    );

    let response = match generate_text(llm, REPORT_SYSTEM, &prompt, timeout).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Interview question generation failed: {e}");
            issues.push(report_call_error(e));
            return None;
        }
    };

    match parse_tolerant::<ReportDraft>(&response) {
        ParseOutcome::Strict(draft) => Some(draft),
        ParseOutcome::Repaired(draft) => {
            issues.push(PipelineError::ParseRepaired {
                stage: Stage::Report,
            });
            Some(draft)
        }
        ParseOutcome::Failed(reason) => {
            warn!("Unparseable report response: {reason}");
            issues.push(PipelineError::ReportDegraded {
                reason: format!("unparseable model response: {reason}"),
            });
            None
        }
    }
}

fn question_list(draft: &ReportDraft) -> Vec<String> {
    draft
        .interview_questions
        .iter()
        .filter_map(|q| q.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .take(MAX_QUESTIONS)
        .map(str::to_string)
        .collect()
}

fn report_call_error(err: LlmError) -> PipelineError {
    if err.is_unavailable() {
        PipelineError::ExternalCallUnavailable {
            stage: Stage::Report,
            message: err.to_string(),
        }
    } else {
        PipelineError::ReportDegraded {
            reason: err.to_string(),
        }
    }
}

/// Questions aimed at the top missing skills, then the generic bank.
fn fallback_questions(score: &ScoreResult) -> Vec<String> {
    score
        .missing_skills
        .iter()
        .take(MISSING_SKILL_QUESTIONS)
        .map(|skill| {
            format!(
                "The role calls for {skill}. What exposure have you had to it, \
                 and how would you get up to speed?"
            )
        })
        .chain(GENERIC_QUESTIONS.iter().map(|q| q.to_string()))
        .collect()
}

fn fallback_summary(candidate: &CandidateRecord, score: &ScoreResult) -> String {
    let list = |skills: &std::collections::BTreeSet<String>| {
        if skills.is_empty() {
            "none".to_string()
        } else {
            skills.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    };
    let role = score.role_title.as_deref().unwrap_or("the role");
    format!(
        "{} scored {}/100 for {} ({}). Matched skills: {}. Missing skills: {}.",
        candidate.display_name(),
        score.overall_score,
        role,
        score.recommendation.as_str(),
        list(&score.matched_skills),
        list(&score.missing_skills),
    )
}

fn top_skills(candidate: &CandidateRecord, score: &ScoreResult) -> Vec<String> {
    let source = if score.matched_skills.is_empty() {
        &candidate.skills
    } else {
        &score.matched_skills
    };
    source.iter().take(3).cloned().collect()
}

fn offline_invitation(candidate: &CandidateRecord, score: &ScoreResult) -> String {
    let skills = top_skills(candidate, score);
    render_invitation(&Invitation {
        candidate_name: candidate.display_name(),
        candidate_email: candidate.contact.email.as_deref(),
        role: score.role_title.as_deref().unwrap_or("open"),
        skills: &skills,
        score: Some(score.overall_score),
    })
}

/// Agent turn with the tools registered. The model decides whether to call the
/// email tool; failed calls are answered with an error result so it can retry.
/// Returns the first successful tool output.
async fn run_email_agent(
    candidate: &CandidateRecord,
    score: &ScoreResult,
    llm: &dyn TextGenerator,
    tools: &ToolRegistry,
    timeout: Duration,
    issues: &mut Vec<PipelineError>,
) -> Option<String> {
    if tools.is_empty() {
        return None;
    }

    let overall_score = score.overall_score.to_string();
    let skills = top_skills(candidate, score).join(", ");
    let prompt = fill_template(
        EMAIL_AGENT_PROMPT_TEMPLATE,
        &[
            ("candidate_name", candidate.display_name()),
            (
                "candidate_email",
                candidate.contact.email.as_deref().unwrap_or("unknown"),
            ),
            (
                "role_title",
                score.role_title.as_deref().unwrap_or("unknown"),
            ),
            ("recommendation", score.recommendation.as_str()),
            ("overall_score", &overall_score),
            ("top_skills", &skills),
        ],
    );

    let mut request = CompletionRequest {
        system: EMAIL_AGENT_SYSTEM.to_string(),
        messages: vec![Message::user_text(prompt)],
        tools: tools.specs(),
    };

    for step in 1..=MAX_AGENT_STEPS {
        let completion = match complete_within(llm, &request, timeout).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Email agent call failed at step {step}: {e}");
                issues.push(report_call_error(e));
                return None;
            }
        };

        let calls = completion.tool_calls();
        if calls.is_empty() {
            debug!("Email agent finished at step {step} without calling a tool");
            return None;
        }

        let mut results = Vec::with_capacity(calls.len());
        let mut email = None;
        for (id, name, input) in calls {
            match tools.invoke(name, input.clone()).await {
                Ok(output) => {
                    info!("Tool '{name}' produced the invitation email");
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: id.to_string(),
                        content: output.clone(),
                        is_error: false,
                    });
                    if email.is_none() {
                        email = Some(output);
                    }
                }
                Err(e) => {
                    warn!("Tool '{name}' failed: {e}");
                    issues.push(PipelineError::ToolInvocationFailed {
                        tool: name.to_string(),
                        message: e.to_string(),
                    });
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: id.to_string(),
                        content: e.to_string(),
                        is_error: true,
                    });
                }
            }
        }

        if email.is_some() {
            return email;
        }

        request.messages.push(Message {
            role: Role::Assistant,
            content: completion.content.clone(),
        });
        request.messages.push(Message {
            role: Role::User,
            content: results,
        });
    }

    issues.push(PipelineError::ReportDegraded {
        reason: format!("email tool produced no output within {MAX_AGENT_STEPS} agent steps"),
    });
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::llm_client::LlmError;
    use crate::screening::models::{Contact, Recommendation, ScoringMethod};
    use crate::screening::testing::{
        call_of, has_tool_result, text_completion, tool_use_completion, Call, ScriptedGenerator,
    };
    use crate::screening::tools::EMAIL_TOOL_NAME;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    const TIMEOUT: Duration = Duration::from_secs(5);

    const QUESTIONS_JSON: &str = r#"{
        "interview_questions": ["Q1?", "Q2?", "Q3?", "Q4?", "Q5?"],
        "summary": "Strong AI engineer with a Kubernetes gap."
    }"#;

    fn candidate() -> CandidateRecord {
        CandidateRecord {
            full_name: Some("Priya Raman".to_string()),
            contact: Contact {
                email: Some("priya.raman@example.com".to_string()),
                phone: None,
            },
            skills: ["Python", "PyTorch"].into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }

    fn score() -> ScoreResult {
        ScoreResult {
            overall_score: 88,
            sub_scores: BTreeMap::new(),
            matched_skills: ["Python", "PyTorch"].into_iter().map(String::from).collect(),
            missing_skills: ["Kubernetes"].into_iter().map(String::from).collect(),
            rationale: "Strong match.".to_string(),
            recommendation: Recommendation::Proceed,
            role_title: Some("AI Engineer".to_string()),
            method: ScoringMethod::Model,
        }
    }

    fn email_args() -> serde_json::Value {
        json!({
            "candidate_name": "Priya Raman",
            "candidate_email": "priya.raman@example.com",
            "role": "AI Engineer",
            "recommendation": "PROCEED",
            "skills": ["Python", "PyTorch"],
            "score": 88
        })
    }

    #[tokio::test]
    async fn test_full_report_with_tool_call() {
        let llm = ScriptedGenerator::new(|request| match call_of(request) {
            Call::Report => Ok(text_completion(QUESTIONS_JSON)),
            Call::EmailAgent => Ok(tool_use_completion("toolu_1", EMAIL_TOOL_NAME, email_args())),
            _ => Ok(text_completion("")),
        });
        let outcome =
            generate_report(&candidate(), &score(), &llm, &ToolRegistry::standard(), TIMEOUT)
                .await;

        assert!(outcome.issues.is_empty(), "{:?}", outcome.issues);
        assert_eq!(outcome.report.interview_questions.len(), 5);
        assert_eq!(
            outcome.report.summary,
            "Strong AI engineer with a Kubernetes gap."
        );
        assert!(outcome
            .report
            .email_template
            .starts_with("Subject: Interview Invitation - AI Engineer"));
        assert_eq!(llm.calls(Call::EmailAgent), 1);

        let agent_request = llm
            .requests()
            .into_iter()
            .find(|r| call_of(r) == Call::EmailAgent)
            .unwrap();
        assert_eq!(agent_request.tools[0].name, EMAIL_TOOL_NAME);
    }

    #[tokio::test]
    async fn test_failed_tool_call_is_answered_and_retried() {
        let llm = ScriptedGenerator::new(|request| match call_of(request) {
            Call::Report => Ok(text_completion(QUESTIONS_JSON)),
            Call::EmailAgent if has_tool_result(request) => {
                Ok(tool_use_completion("toolu_2", EMAIL_TOOL_NAME, email_args()))
            }
            Call::EmailAgent => Ok(tool_use_completion(
                "toolu_1",
                EMAIL_TOOL_NAME,
                json!({"candidate_name": "", "role": "AI Engineer", "recommendation": "PROCEED"}),
            )),
            _ => Ok(text_completion("")),
        });
        let outcome =
            generate_report(&candidate(), &score(), &llm, &ToolRegistry::standard(), TIMEOUT)
                .await;

        assert_eq!(llm.calls(Call::EmailAgent), 2);
        assert_eq!(
            outcome.issues.iter().map(|e| e.kind()).collect::<Vec<_>>(),
            vec![ErrorKind::ToolInvocationFailed]
        );
        assert!(outcome.report.email_template.contains("Dear Priya Raman,"));

        let retry = llm
            .requests()
            .into_iter()
            .filter(|r| call_of(r) == Call::EmailAgent)
            .last()
            .unwrap();
        let last = retry.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(matches!(
            &last.content[0],
            ContentBlock::ToolResult { tool_use_id, is_error: true, .. } if tool_use_id == "toolu_1"
        ));
    }

    #[tokio::test]
    async fn test_agent_loop_is_bounded() {
        let llm = ScriptedGenerator::new(|request| match call_of(request) {
            Call::Report => Ok(text_completion(QUESTIONS_JSON)),
            _ => Ok(tool_use_completion("toolu", "send_offer_letter", json!({}))),
        });
        let outcome =
            generate_report(&candidate(), &score(), &llm, &ToolRegistry::standard(), TIMEOUT)
                .await;

        assert_eq!(llm.calls(Call::EmailAgent), MAX_AGENT_STEPS);
        assert!(outcome.report.email_template.contains("Dear Priya Raman,"));
        let kinds: Vec<_> = outcome.issues.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == ErrorKind::ToolInvocationFailed).count(),
            MAX_AGENT_STEPS
        );
        assert_eq!(kinds.last(), Some(&ErrorKind::ReportDegraded));
    }

    #[tokio::test]
    async fn test_model_declining_the_tool_uses_offline_template() {
        let llm = ScriptedGenerator::new(|request| match call_of(request) {
            Call::Report => Ok(text_completion(QUESTIONS_JSON)),
            _ => Ok(text_completion("Dear Priya, come to an interview.")),
        });
        let outcome =
            generate_report(&candidate(), &score(), &llm, &ToolRegistry::standard(), TIMEOUT)
                .await;
        assert!(outcome.issues.is_empty());
        assert!(outcome
            .report
            .email_template
            .starts_with("Subject: Interview Invitation - AI Engineer"));
        assert!(outcome.report.email_template.contains("88/100"));
    }

    #[tokio::test]
    async fn test_report_is_total_when_everything_fails() {
        let llm = ScriptedGenerator::new(|_| Err(LlmError::Timeout(TIMEOUT)));
        let outcome =
            generate_report(&candidate(), &score(), &llm, &ToolRegistry::standard(), TIMEOUT)
                .await;

        let report = &outcome.report;
        assert!(!report.interview_questions.is_empty());
        assert!(report.interview_questions[0].contains("Kubernetes"));
        assert!(!report.email_template.is_empty());
        assert!(report.summary.contains("88/100"));
        assert!(report.summary.contains("Missing skills: Kubernetes."));
        assert!(outcome.issues.iter().all(|e| !e.is_fatal()));
        assert!(outcome
            .issues
            .iter()
            .all(|e| e.kind() == ErrorKind::ExternalCallUnavailable && e.stage() == Stage::Report));
    }

    #[tokio::test]
    async fn test_garbage_questions_fall_back_to_bank() {
        let llm = ScriptedGenerator::replying("I think the candidate is great!");
        let outcome =
            generate_report(&candidate(), &score(), &llm, &ToolRegistry::new(), TIMEOUT).await;
        assert_eq!(outcome.report.interview_questions.len(), 1 + GENERIC_QUESTIONS.len());
        assert_eq!(
            outcome.issues.iter().map(|e| e.kind()).collect::<Vec<_>>(),
            vec![ErrorKind::ReportDegraded]
        );
        assert_eq!(llm.calls(Call::EmailAgent), 0);
    }

    #[test]
    fn test_fallback_questions_without_missing_skills() {
        let mut s = score();
        s.missing_skills = BTreeSet::new();
        assert_eq!(fallback_questions(&s).len(), GENERIC_QUESTIONS.len());
    }
}
