//! Screening orchestrator: the single entry point for a run.
//!
//! normalize → extract → score → gate → (report | reject)
//!
//! Runs are strictly sequential and share nothing but the text-generation
//! client and the tool registry. Stage problems are collected into
//! `PipelineResult.errors`; only an unreachable service during extraction or
//! scoring ends a run early, and the partial results computed so far are kept.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::{ErrorDescriptor, PipelineError};
use crate::llm_client::TextGenerator;
use crate::screening::extraction::{extract, Extraction};
use crate::screening::models::{
    PipelineResult, RawInput, Recommendation, RunStatus, DEFAULT_THRESHOLD,
};
use crate::screening::normalize::normalize;
use crate::screening::report::generate_report;
use crate::screening::scoring::{gate, score};
use crate::screening::tools::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// PROCEED threshold used by `Pipeline::run`.
    pub threshold: u8,
    /// Deadline applied to every outbound text-generation call.
    pub call_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            call_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    llm: Arc<dyn TextGenerator>,
    tools: Arc<ToolRegistry>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        tools: Arc<ToolRegistry>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            llm,
            tools,
            settings,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.settings.threshold
    }

    pub async fn run(&self, raw: &RawInput) -> PipelineResult {
        self.run_with_threshold(raw, self.settings.threshold).await
    }

    pub async fn run_with_threshold(&self, raw: &RawInput, threshold: u8) -> PipelineResult {
        let threshold = threshold.min(100);
        let timeout = self.settings.call_timeout;
        let llm = self.llm.as_ref();

        let resume_text = normalize(&raw.resume_text);
        let job_text = normalize(&raw.job_text);
        info!(
            "Screening run started: {} resume chars, {} job chars, threshold {threshold}",
            resume_text.len(),
            job_text.len()
        );

        let mut run = RunRecord::new(threshold);

        let Extraction {
            candidate,
            confidence,
            issues,
        } = match extract(&resume_text, llm, timeout).await {
            Ok(extraction) => extraction,
            Err(e) => return run.fail(e),
        };
        run.errors.extend(issues);
        run.result.confidence = Some(confidence);
        run.result.candidate = Some(candidate.clone());

        let scoring = match score(&candidate, &job_text, threshold, llm, timeout).await {
            Ok(scoring) => scoring,
            Err(e) => return run.fail(e),
        };
        run.errors.extend(scoring.issues);
        let score_result = scoring.score;

        if gate(&score_result) == Recommendation::Reject {
            info!(
                "Candidate rejected at the gate: {}/100 < {threshold}",
                score_result.overall_score
            );
            run.result.score = Some(score_result);
            return run.finish(RunStatus::Rejected);
        }

        let outcome = generate_report(
            &candidate,
            &score_result,
            llm,
            self.tools.as_ref(),
            timeout,
        )
        .await;
        run.errors.extend(outcome.issues);
        run.result.score = Some(score_result);
        run.result.report = Some(outcome.report);
        run.finish(RunStatus::Completed)
    }
}

/// Accumulates a run's partial results and errors until a status is known.
struct RunRecord {
    result: PipelineResult,
    errors: Vec<PipelineError>,
}

impl RunRecord {
    fn new(threshold: u8) -> Self {
        Self {
            result: PipelineResult {
                status: RunStatus::Failed,
                threshold,
                candidate: None,
                confidence: None,
                score: None,
                report: None,
                errors: Vec::new(),
            },
            errors: Vec::new(),
        }
    }

    fn fail(mut self, err: PipelineError) -> PipelineResult {
        warn!("Screening run failed: {err}");
        self.errors.push(err);
        self.finish(RunStatus::Failed)
    }

    fn finish(mut self, status: RunStatus) -> PipelineResult {
        self.result.status = status;
        self.result.errors = self.errors.iter().map(ErrorDescriptor::from).collect();
        info!(
            "Screening run finished: {status:?} with {} error(s)",
            self.result.errors.len()
        );
        self.result
    }
}
