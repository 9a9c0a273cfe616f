//! Route handlers for the four inbound dialects. Each handler: resolves
//! the target model's candidate providers from the Provider Registry,
//! authenticates the caller via the Access Gate (through the `Identity`
//! extractor), and drives the Auth Manager's `execute`/`execute_stream`/
//! `execute_count` — the actual translate/dispatch/translate work this
//! crate specifies happens entirely inside those three calls.

use super::peek::{peek_model_and_stream, split_gemini_model_action};
use super::respond;
use super::state::RelayGateState;
use crate::access_gate::Identity;
use crate::auth::Provider;
use crate::auth_manager::ExecuteOptions;
use crate::error::RelayGateError;
use crate::translator::Dialect;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

fn resolve_candidates(state: &RelayGateState, model: &str) -> Result<Vec<Provider>, RelayGateError> {
    let info = state
        .registry
        .model_info(model)
        .ok_or_else(|| RelayGateError::ClientError(format!("unknown model: {model}")))?;
    Ok(crate::provider_registry::provider_family(&info.provider))
}

async fn dispatch_unary(
    state: &RelayGateState,
    dialect: Dialect,
    model: &str,
    body: &[u8],
) -> Result<Response, RelayGateError> {
    let candidates = resolve_candidates(state, model)?;
    let options = ExecuteOptions { inbound_dialect: dialect };
    let bytes = state.auth_manager.execute(&candidates, model, options, body).await?;
    Ok(respond::unary_json(bytes))
}

async fn dispatch_stream(
    state: &RelayGateState,
    dialect: Dialect,
    model: &str,
    body: &[u8],
) -> Result<Response, RelayGateError> {
    let candidates = resolve_candidates(state, model)?;
    let options = ExecuteOptions { inbound_dialect: dialect };
    let stream = state
        .auth_manager
        .clone()
        .execute_stream(candidates, model.to_string(), options, body.to_vec())
        .await?;
    Ok(respond::streaming(dialect, stream))
}

pub async fn openai_chat_completions(
    State(state): State<RelayGateState>,
    _identity: Identity,
    body: Bytes,
) -> Response {
    let (model, stream) = peek_model_and_stream(&body);
    let result = if stream {
        dispatch_stream(&state, Dialect::OpenAiChat, &model, &body).await
    } else {
        dispatch_unary(&state, Dialect::OpenAiChat, &model, &body).await
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

/// OpenAI Responses streaming is out of scope for this crate's streaming
/// translator (see `executor::stream_bridge`'s scope note); a client that
/// asks to stream gets a unary response translated back through the same
/// pipeline, matching the non-streaming contract exactly.
pub async fn openai_responses(
    State(state): State<RelayGateState>,
    _identity: Identity,
    body: Bytes,
) -> Response {
    let (model, _stream) = peek_model_and_stream(&body);
    dispatch_unary(&state, Dialect::OpenAiResponses, &model, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

pub async fn anthropic_messages(
    State(state): State<RelayGateState>,
    _identity: Identity,
    body: Bytes,
) -> Response {
    let (model, stream) = peek_model_and_stream(&body);
    let result = if stream {
        dispatch_stream(&state, Dialect::AnthropicMessages, &model, &body).await
    } else {
        dispatch_unary(&state, Dialect::AnthropicMessages, &model, &body).await
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

pub async fn anthropic_count_tokens(
    State(state): State<RelayGateState>,
    _identity: Identity,
    body: Bytes,
) -> Response {
    let (model, _stream) = peek_model_and_stream(&body);
    let run = async {
        let candidates = resolve_candidates(&state, &model)?;
        let options = ExecuteOptions { inbound_dialect: Dialect::AnthropicMessages };
        let bytes = state.auth_manager.execute_count(&candidates, &model, options, &body).await?;
        Ok::<_, RelayGateError>(respond::unary_json(bytes))
    };
    run.await.unwrap_or_else(IntoResponse::into_response)
}

/// `GET /v1beta/models` and `GET /v1beta/models/{model}` both resolve here;
/// model catalog discovery proper is a declared non-goal (spec.md §1), so
/// this simply reflects the Provider Registry's static Gemini-dialect
/// catalogue rather than querying any upstream.
pub async fn gemini_list_models(State(_state): State<RelayGateState>, _identity: Identity) -> Response {
    let names = crate::provider_registry::catalog::GEMINI_MODELS
        .iter()
        .map(|m| format!("models/{}", m.name));
    let list = relaygate_schema::gemini::GeminiModelList::from_model_names(names);
    axum::Json(list).into_response()
}

/// `POST /v1beta/models/{model}:{action}` — Gemini's model and action both
/// travel in the path rather than the body (unlike the other three
/// dialects), per spec.md §6's `POST /v1beta/models/{model}:{action}`.
pub async fn gemini_model_action(
    State(state): State<RelayGateState>,
    Path(model_action): Path<String>,
    _identity: Identity,
    body: Bytes,
) -> Response {
    let (model, action) = split_gemini_model_action(&model_action);
    let result = match action.as_str() {
        "streamGenerateContent" => dispatch_stream(&state, Dialect::Gemini, &model, &body).await,
        "generateContent" => dispatch_unary(&state, Dialect::Gemini, &model, &body).await,
        "countTokens" => {
            let run = async {
                let candidates = resolve_candidates(&state, &model)?;
                let options = ExecuteOptions { inbound_dialect: Dialect::Gemini };
                let bytes = state.auth_manager.execute_count(&candidates, &model, options, &body).await?;
                Ok::<_, RelayGateError>(respond::unary_json(bytes))
            };
            run.await
        }
        other => Err(RelayGateError::ClientError(format!("unsupported gemini action: {other}"))),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}
