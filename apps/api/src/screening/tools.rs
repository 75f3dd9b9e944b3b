//! Callable tools offered to the model during the report stage.
//!
//! A tool is named, described and typed by a JSON input schema so the model can
//! decide when to call it. `ToolRegistry` owns the tool set and dispatches calls
//! by name. The registry is built once at startup and shared across runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::llm_client::ToolSpec;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn invoke(&self, input: Value) -> Result<String, ToolError>;
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tools every screening run offers to the model.
    pub fn standard() -> Self {
        Self::new().with(Arc::new(EmailTemplateTool))
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub async fn invoke(&self, name: &str, input: Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!("Invoking tool '{name}'");
        tool.invoke(input).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Interview invitation email
// ────────────────────────────────────────────────────────────────────────────

pub const EMAIL_TOOL_NAME: &str = "generate_interview_email";

/// Everything the invitation template needs. Borrowed so the offline fallback
/// can fill it straight from the run's records.
#[derive(Debug, Clone, Copy)]
pub struct Invitation<'a> {
    pub candidate_name: &'a str,
    pub candidate_email: Option<&'a str>,
    pub role: &'a str,
    pub skills: &'a [String],
    pub score: Option<u8>,
}

/// Renders the invitation email. Pure and date-free, so reruns produce
/// byte-identical text.
pub fn render_invitation(invitation: &Invitation<'_>) -> String {
    let skills = if invitation.skills.is_empty() {
        "your technical background".to_string()
    } else {
        invitation
            .skills
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    let score_line = invitation
        .score
        .map(|s| format!(" and your overall qualification score of {s}/100"))
        .unwrap_or_default();
    let reply_line = match invitation.candidate_email {
        Some(email) => format!("Please reply to this email ({email}) with your availability."),
        None => "Please reply to this email with your availability.".to_string(),
    };

    format!(
        "Subject: Interview Invitation - {role}\n\
         \n\
         Dear {name},\n\
         \n\
         Thank you for your interest in the {role} position. Based on our resume review, \
         we were impressed with your skills in {skills}{score_line}.\n\
         \n\
         We would like to invite you to an interview. {reply_line} \
         Our team will follow up with available time slots.\n\
         \n\
         Interview details:\n\
         - Duration: 45 minutes\n\
         - Format: Video call (link will be shared)\n\
         - Focus areas: Technical skills, experience, team fit\n\
         \n\
         We look forward to speaking with you!\n\
         \n\
         Best regards,\n\
         HR Team",
        role = invitation.role,
        name = invitation.candidate_name,
    )
}

#[derive(Debug, Deserialize)]
struct EmailArgs {
    candidate_name: String,
    #[serde(alias = "role_title")]
    role: String,
    recommendation: String,
    #[serde(default)]
    candidate_email: Option<String>,
    #[serde(default)]
    skills: SkillsArg,
    #[serde(default)]
    score: Option<f64>,
}

/// Models send skills either as a list or as one comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkillsArg {
    List(Vec<String>),
    Text(String),
}

impl Default for SkillsArg {
    fn default() -> Self {
        SkillsArg::List(Vec::new())
    }
}

impl SkillsArg {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            SkillsArg::List(items) => items,
            SkillsArg::Text(text) => text.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

pub struct EmailTemplateTool;

#[async_trait]
impl Tool for EmailTemplateTool {
    fn name(&self) -> &str {
        EMAIL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Generate a personalized interview invitation email for a candidate who was \
         recommended to PROCEED. Returns the full email text including the subject line."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "candidate_name": {"type": "string", "description": "Candidate's full name"},
                "candidate_email": {"type": "string", "description": "Candidate's email address, if known"},
                "role": {"type": "string", "description": "Title of the role being interviewed for"},
                "recommendation": {"type": "string", "enum": ["PROCEED", "REJECT"]},
                "skills": {"type": "array", "items": {"type": "string"}, "description": "Up to three of the candidate's strongest matching skills"},
                "score": {"type": "integer", "minimum": 0, "maximum": 100}
            },
            "required": ["candidate_name", "role", "recommendation"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<String, ToolError> {
        let args: EmailArgs = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let candidate_name = args.candidate_name.trim();
        if candidate_name.is_empty() {
            return Err(ToolError::InvalidArguments(
                "candidate_name cannot be empty".to_string(),
            ));
        }
        if !args.recommendation.trim().eq_ignore_ascii_case("PROCEED") {
            return Err(ToolError::InvalidArguments(format!(
                "invitations are only sent for PROCEED, got '{}'",
                args.recommendation
            )));
        }
        let role = match args.role.trim() {
            "" => "open",
            role => role,
        };
        let score = match args.score {
            Some(s) if (0.0..=100.0).contains(&s) => Some(s.round() as u8),
            Some(s) => {
                return Err(ToolError::InvalidArguments(format!(
                    "score {s} is outside 0-100"
                )))
            }
            None => None,
        };
        let skills = args.skills.into_vec();
        let candidate_email = args
            .candidate_email
            .as_deref()
            .map(str::trim)
            .filter(|e| e.contains('@'));

        Ok(render_invitation(&Invitation {
            candidate_name,
            candidate_email,
            role,
            skills: &skills,
            score,
        }))
    }
}
