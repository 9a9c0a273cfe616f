//! Builds the actual `axum::response::Response` for a unary or streaming
//! Auth Manager result. Grounded on the teacher's
//! `server/routes/codex/respond.rs` (`build_stream_response` vs
//! `build_json_response_from_stream`) — generalized from Codex's single
//! upstream dialect to the three client dialects this crate's streaming
//! translator emits frames for.

use crate::error::RelayGateError;
use crate::translator::Dialect;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use futures::Stream;
use futures::StreamExt;
use std::pin::Pin;

pub fn unary_json(bytes: Vec<u8>) -> Response {
    (
        [(CONTENT_TYPE, "application/json")],
        bytes,
    )
        .into_response()
}

/// `text/event-stream` for OpenAI Chat and Anthropic Messages (SSE
/// `data: ...\n\n` frames per the streaming translator contract);
/// `application/json` for Gemini's JSON-array streaming framing.
fn content_type_for(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::AnthropicMessages | Dialect::OpenAiChat => "text/event-stream",
        Dialect::Gemini | Dialect::OpenAiResponses => "application/json",
    }
}

pub fn streaming(
    dialect: Dialect,
    stream: Pin<Box<dyn Stream<Item = Result<Vec<u8>, RelayGateError>> + Send>>,
) -> Response {
    let body_stream = stream.map(|item| item.map_err(std::io::Error::other));
    let mut response = Response::new(Body::from_stream(body_stream));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, content_type_for(dialect).parse().unwrap());
    response
}
