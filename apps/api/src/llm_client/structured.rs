//! Tolerant decoding of structured payloads from free-text model output.
//!
//! The remote side is asked for JSON but never guaranteed to return it. Decoding
//! walks a ladder: strict parse, then a local repair pass (code fences,
//! surrounding prose, trailing commas), then gives up and lets the caller fall
//! back to heuristics. There is no re-generation here.

use serde::de::DeserializeOwned;

/// Which rung of the ladder produced the value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    /// The response parsed as-is.
    Strict(T),
    /// The response parsed after the repair pass.
    Repaired(T),
    /// Neither attempt produced a value; carries the last parse error.
    Failed(String),
}

impl<T> ParseOutcome<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            ParseOutcome::Strict(v) | ParseOutcome::Repaired(v) => Some(v),
            ParseOutcome::Failed(_) => None,
        }
    }

    pub fn was_repaired(&self) -> bool {
        matches!(self, ParseOutcome::Repaired(_))
    }
}

/// Decodes `text` as `T`, attempting the repair pass when the strict parse fails.
pub fn parse_tolerant<T: DeserializeOwned>(text: &str) -> ParseOutcome<T> {
    let strict_err = match serde_json::from_str::<T>(text.trim()) {
        Ok(value) => return ParseOutcome::Strict(value),
        Err(e) => e,
    };

    // Prose may carry brackets of its own ("see [1]"), so each opening
    // bracket gets a turn until one yields a value. Objects go first.
    let body = strip_json_fences(text);
    let starts = body.match_indices('{').chain(body.match_indices('['));
    let mut last_err = None;
    for (start, _) in starts.take(MAX_PAYLOAD_STARTS) {
        let payload = extract_payload(&body[start..]);
        match serde_json::from_str::<T>(&strip_trailing_commas(payload)) {
            Ok(value) => return ParseOutcome::Repaired(value),
            Err(e) => last_err = Some(e.to_string()),
        }
    }

    ParseOutcome::Failed(
        last_err.unwrap_or_else(|| format!("no JSON payload found ({strict_err})")),
    )
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Opening brackets tried by the repair pass before it gives up.
const MAX_PAYLOAD_STARTS: usize = 16;

/// Returns the balanced JSON object or array that opens at the start of
/// `text`. Brackets inside string literals are ignored.
fn extract_payload(text: &str) -> &str {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[..offset + c.len_utf8()];
                }
            }
            _ => {}
        }
    }

    // Unterminated payload (truncated output): hand back the tail and let
    // the parser report the error.
    text
}

/// Removes commas that directly precede a closing `}` or `]`.
fn strip_trailing_commas(payload: &str) -> String {
    let chars: Vec<char> = payload.chars().collect();
    let mut out = String::with_capacity(payload.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
