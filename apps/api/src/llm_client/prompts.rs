// Shared prompt constants.
// Each stage that needs LLM calls defines its own prompts alongside it.
// This file contains cross-cutting prompt fragments.

/// Common instruction prepended to every prompt that judges a candidate.
pub const FAIRNESS_INSTRUCTION: &str = "\
    CRITICAL: Judge the candidate only on job-relevant evidence present in the input. \
    Do NOT infer or penalize age, gender, ethnicity, nationality, religion, disability \
    or any other protected attribute. Do NOT invent experience, skills or credentials \
    that the input does not state.";

/// Fills `{name}` placeholders in one pass over `template`. Substituted values
/// are never rescanned, so braces inside resume or job text stay literal.
/// Braces that do not name a known placeholder are kept as written.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let filled = tail.find('}').and_then(|close| {
            let name = &tail[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match filled {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
