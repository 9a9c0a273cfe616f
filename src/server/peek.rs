//! Lightweight pre-dispatch peeks at an inbound body: just enough to pick
//! `model`/`stream` before handing the untouched bytes to the Auth
//! Manager, which re-decodes the full body through the Translator
//! Pipeline. Grounded on the teacher's `server/routes/codex/extract.rs`
//! peek-then-dispatch shape (model/stream pulled out of the body ahead of
//! the real client call).

use serde::Deserialize;

#[derive(Deserialize, Default)]
struct ModelStreamPeek {
    #[serde(default)]
    model: String,
    #[serde(default)]
    stream: bool,
}

/// Peeks `model`/`stream` out of an OpenAI Chat, OpenAI Responses, or
/// Anthropic Messages body — all three carry both fields at the top level
/// under the same names.
pub fn peek_model_and_stream(body: &[u8]) -> (String, bool) {
    let peek: ModelStreamPeek = serde_json::from_slice(body).unwrap_or_default();
    (peek.model, peek.stream)
}

/// Gemini's model and action (`generateContent`/`streamGenerateContent`/
/// `countTokens`) travel in the URL path as `models/{model}:{action}`
/// rather than the body; `model_action` is the final path segment axum
/// handed the route (everything after `/v1beta/models/`).
pub fn split_gemini_model_action(model_action: &str) -> (String, String) {
    match model_action.split_once(':') {
        Some((model, action)) => (model.to_string(), action.to_string()),
        None => (model_action.to_string(), "generateContent".to_string()),
    }
}
