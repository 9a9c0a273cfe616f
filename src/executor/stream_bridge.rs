//! Bridges an upstream SSE event stream through the streaming translator
//! (`translator::stream`) into client-dialect bytes, per §4.6's streaming
//! translator contract: a single upstream chunk may produce zero, one, or
//! many client-facing frames.
//!
//! Scope note: streaming is implemented for the three dialects the
//! streaming translator vocabulary covers (OpenAI Chat, Gemini, Anthropic
//! Messages) per `SPEC_FULL.md` §4.6's "representative, non-exhaustive
//! slice" note; OpenAI Responses streaming is out of scope here.

use super::{Executor, Failure};
use crate::auth::Auth;
use crate::error::RelayGateError;
use crate::provider_registry::ProviderRegistry;
use crate::translator::stream::{
    GeminiEncoderState, OpenAiChatEncoderState, StreamAccumulator, TranslatorEvent,
    decode_anthropic_event, decode_gemini_chunk, decode_openai_chat_chunk, encode_anthropic_event,
    encode_gemini_event, encode_openai_chat_event,
};
use crate::translator::Dialect;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use relaygate_schema::anthropic::AnthropicStreamEvent;
use relaygate_schema::gemini::GeminiResponseBody;
use relaygate_schema::openai::ChatCompletionChunk;

enum ClientEncoder {
    Anthropic { model: String },
    OpenAiChat(OpenAiChatEncoderState),
    Gemini(GeminiEncoderState),
}

impl ClientEncoder {
    fn new(dialect: Dialect) -> Result<Self, RelayGateError> {
        match dialect {
            Dialect::AnthropicMessages => Ok(ClientEncoder::Anthropic { model: String::new() }),
            Dialect::OpenAiChat => Ok(ClientEncoder::OpenAiChat(OpenAiChatEncoderState::default())),
            Dialect::Gemini => Ok(ClientEncoder::Gemini(GeminiEncoderState::default())),
            Dialect::OpenAiResponses => Err(RelayGateError::StreamProtocolError(
                "streaming is not supported for the openai-responses client dialect".to_string(),
            )),
        }
    }

    fn encode(&mut self, event: &TranslatorEvent) -> Vec<Vec<u8>> {
        match self {
            ClientEncoder::Anthropic { model } => {
                if let TranslatorEvent::MessageStart { model: m } = event {
                    if !m.is_empty() {
                        *model = m.clone();
                    }
                }
                encode_anthropic_event(model, event).into_iter().collect()
            }
            ClientEncoder::OpenAiChat(state) => encode_openai_chat_event(state, event),
            ClientEncoder::Gemini(state) => encode_gemini_event(state, event),
        }
    }
}

fn decode_upstream_frame(
    upstream: Dialect,
    acc: &mut StreamAccumulator,
    data: &str,
) -> Result<Vec<TranslatorEvent>, RelayGateError> {
    if data == "[DONE]" {
        return Ok(Vec::new());
    }
    match upstream {
        Dialect::OpenAiChat => {
            let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
            decode_openai_chat_chunk(acc, &chunk)
        }
        Dialect::Gemini => {
            let chunk: GeminiResponseBody = serde_json::from_str(data)?;
            decode_gemini_chunk(acc, &chunk)
        }
        Dialect::AnthropicMessages => {
            let event: AnthropicStreamEvent = serde_json::from_str(data)?;
            Ok(decode_anthropic_event(&event))
        }
        Dialect::OpenAiResponses => Err(RelayGateError::StreamProtocolError(
            "streaming is not supported for the openai-responses upstream dialect".to_string(),
        )),
    }
}

/// Runs one streaming exchange end to end: dispatches the upstream request
/// and returns a lazy stream of client-dialect bytes already teed through
/// the streaming translator.
pub async fn stream_exchange(
    executor: &Executor,
    auth: &Auth,
    registry: &ProviderRegistry,
    inbound_dialect: Dialect,
    model: &str,
    body: &[u8],
) -> Result<impl Stream<Item = Result<Vec<u8>, Failure>>, Failure> {
    let triple = registry.capability_triple(&auth.provider);
    let ir = crate::translator::decode_request(inbound_dialect, body).map_err(Failure::Fatal)?;
    let mut ir = super::normalize_request(ir, auth, registry, model);
    ir.stream = true;
    let upstream_body =
        crate::translator::encode_request(triple.request_translator, &ir).map_err(Failure::Fatal)?;
    let upstream_body = super::reshape_for_provider(&auth.provider, upstream_body).map_err(Failure::Fatal)?;

    let url = super::upstream_url(auth, registry, model, super::UrlMode::Streaming).map_err(Failure::Fatal)?;
    let response = executor
        .dispatch(auth, &url, &upstream_body)
        .await
        .map_err(Failure::Transient)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = super::response_body(response).await;
        return Err(super::classify_failed_response(status, body));
    }

    let upstream_dialect = triple.response_translator;
    let mut accumulator = StreamAccumulator::new();
    let mut encoder = ClientEncoder::new(inbound_dialect).map_err(Failure::Fatal)?;

    let frames = response.bytes_stream().eventsource();
    let bridged = frames
        .map(move |frame| -> Result<Vec<u8>, Failure> {
            let frame =
                frame.map_err(|e| Failure::Transient(RelayGateError::StreamProtocolError(e.to_string())))?;
            let events = decode_upstream_frame(upstream_dialect, &mut accumulator, &frame.data)
                .map_err(Failure::Fatal)?;
            let mut out = Vec::new();
            for event in &events {
                for chunk in encoder.encode(event) {
                    out.extend(chunk);
                }
            }
            Ok(out)
        })
        .filter(|item| std::future::ready(!matches!(item, Ok(bytes) if bytes.is_empty())));

    Ok(bridged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_encoder_rejects_openai_responses_dialect() {
        assert!(ClientEncoder::new(Dialect::OpenAiResponses).is_err());
    }

    #[test]
    fn decode_upstream_frame_done_sentinel_yields_no_events() {
        let mut acc = StreamAccumulator::new();
        let events = decode_upstream_frame(Dialect::OpenAiChat, &mut acc, "[DONE]").unwrap();
        assert!(events.is_empty());
    }
}
