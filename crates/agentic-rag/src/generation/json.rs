//! Extraction of structured answers from model replies

use regex::Regex;
use std::sync::OnceLock;

use crate::types::StructuredAnswer;

fn fenced_json_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json[ \t]*\r?\n(.*?)\r?\n?```").unwrap())
}

/// Body of the first ```` ```json ```` fenced block, if any
pub fn extract_fenced_json(reply: &str) -> Option<&str> {
    fenced_json_regex()
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parse a reply into a [`StructuredAnswer`].
///
/// Tries the fenced block first and then the whole reply as raw JSON.
pub fn parse_structured_answer(reply: &str) -> Option<StructuredAnswer> {
    if let Some(body) = extract_fenced_json(reply) {
        match serde_json::from_str::<StructuredAnswer>(body) {
            Ok(answer) => return Some(answer),
            Err(e) => tracing::debug!("Fenced JSON block did not parse: {}", e),
        }
    }
    serde_json::from_str::<StructuredAnswer>(reply.trim()).ok()
}
