//! Scripted text-generation doubles shared by the stage and pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm_client::{
    Completion, CompletionRequest, ContentBlock, LlmError, TextGenerator,
};
use crate::screening::prompts::{
    EMAIL_AGENT_SYSTEM, EXTRACTION_SYSTEM, REPORT_SYSTEM, SCORING_SYSTEM,
};

type Responder = dyn Fn(&CompletionRequest) -> Result<Completion, LlmError> + Send + Sync;

/// Which stage issued a request, recognised by its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Extraction,
    Scoring,
    Report,
    EmailAgent,
    Other,
}

pub fn call_of(request: &CompletionRequest) -> Call {
    match request.system.as_str() {
        EXTRACTION_SYSTEM => Call::Extraction,
        SCORING_SYSTEM => Call::Scoring,
        REPORT_SYSTEM => Call::Report,
        EMAIL_AGENT_SYSTEM => Call::EmailAgent,
        _ => Call::Other,
    }
}

/// A deterministic `TextGenerator` driven by a closure. Records every request.
pub struct ScriptedGenerator {
    responder: Box<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGenerator {
    pub fn new(
        responder: impl Fn(&CompletionRequest) -> Result<Completion, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with the same text.
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text_completion(&text)))
    }

    /// Fails every request as if the API were down.
    pub fn unavailable() -> Self {
        Self::new(|_| {
            Err(LlmError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            })
        })
    }

    pub fn calls(&self, call: Call) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| call_of(r) == call)
            .count()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

pub fn text_completion(text: &str) -> Completion {
    Completion {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: Some("end_turn".to_string()),
    }
}

pub fn tool_use_completion(id: &str, name: &str, input: Value) -> Completion {
    Completion {
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        stop_reason: Some("tool_use".to_string()),
    }
}

/// True when the last message of the conversation carries a tool result.
pub fn has_tool_result(request: &CompletionRequest) -> bool {
    request.messages.last().is_some_and(|m| {
        m.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
    })
}
