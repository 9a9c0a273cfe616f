//! Thin axum wiring for the four inbound dialects. Per spec.md §1, the
//! inbound HTTP routing layer's field-level details are out of scope for
//! this crate; this module only needs to exist so the Auth Manager has a
//! caller to drive end to end. Grounded on the teacher's
//! `server/router.rs` (`PolluxState`, `access_log` middleware) and
//! `server/routes/codex/{extract,handlers,respond}.rs` (peek-then-dispatch
//! request shape, SSE vs buffered-JSON response building).

mod handlers;
mod peek;
mod respond;
mod state;

pub use state::RelayGateState;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Version, header::USER_AGENT};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use base64::Engine as _;
use rand::RngCore;
use std::time::Instant;
use tracing::{error, info, warn};

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const MAX_REQUEST_ID_LEN: usize = 128;

fn generate_request_id() -> String {
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

/// Access-log middleware, generalized from the teacher's `access_log` to
/// this crate's single flat state type.
async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let path = uri.path();
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!("| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}", status.as_u16(), request_id, method.as_str(), protocol, path, latency_ms, user_agent);
    } else if status.is_client_error() {
        warn!("| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}", status.as_u16(), request_id, method.as_str(), protocol, path, latency_ms, user_agent);
    } else {
        info!("| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}", status.as_u16(), request_id, method.as_str(), protocol, path, latency_ms, user_agent);
    }

    resp
}

async fn not_found() -> axum::http::StatusCode {
    axum::http::StatusCode::NOT_FOUND
}

/// Builds the top-level router for the four inbound dialects named in
/// spec.md §6: OpenAI Chat Completions, OpenAI Responses, Anthropic
/// Messages (+ count_tokens), and Gemini v1beta.
pub fn relaygate_router(state: RelayGateState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handlers::openai_chat_completions))
        .route("/v1/responses", post(handlers::openai_responses))
        .route("/v1/messages", post(handlers::anthropic_messages))
        .route("/v1/messages/count_tokens", post(handlers::anthropic_count_tokens))
        .route("/v1beta/models", get(handlers::gemini_list_models))
        .route(
            "/v1beta/models/{model_action}",
            get(handlers::gemini_list_models).post(handlers::gemini_model_action),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}
