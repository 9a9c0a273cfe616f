//! Streaming translator: a dialect-neutral event vocabulary plus per-dialect
//! decoders (upstream bytes -> events) and encoders (events -> client bytes).
//!
//! The vocabulary mirrors Anthropic's block-structured SSE event names
//! (`message_start`, `content_block_start/delta/stop`, `message_delta`,
//! `message_stop`) since those are precise enough to describe every other
//! dialect's streaming behavior too: a growing sequence of content blocks,
//! each either plain text, a thinking block with a reattachable signature,
//! or a tool call whose arguments only become available once accumulated in
//! full. Every decoder here is a state machine over its own upstream framing;
//! every encoder renders the same event sequence into its client dialect.

use std::collections::BTreeMap;

use relaygate_schema::anthropic::{
    AnthropicContentBlock, AnthropicContentDelta, AnthropicMessageDelta, AnthropicMessagesResponse,
    AnthropicStreamEvent, AnthropicUsage,
};
use relaygate_schema::gemini::{Candidate, Content, GeminiResponseBody, Part};
use relaygate_schema::openai::{
    ChatChunkChoice, ChatChunkDelta, ChatCompletionChunk, ChatToolCallDelta, ChatToolCallFunctionDelta,
};
use relaygate_thoughtsig_core::{CacheKeyGenerator, ThoughtSignatureEngine};
use serde_json::Value;

use super::ir::{IrUsage, StopReason};
use crate::error::RelayGateError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Thinking,
    ToolUse { id: String, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockDelta {
    Text(String),
    Thinking(String),
    Signature(String),
    InputJson(String),
}

#[derive(Debug, Clone)]
pub enum TranslatorEvent {
    MessageStart {
        model: String,
    },
    ContentBlockStart {
        index: usize,
        kind: BlockKind,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        stop_reason: Option<StopReason>,
        usage: IrUsage,
    },
    MessageStop,
}

/// Per-response accumulator state shared by every decoder/encoder in this
/// module. One instance lives for the lifetime of a single streamed
/// request/response exchange.
pub struct StreamAccumulator {
    open_text_index: Option<usize>,
    open_thinking_index: Option<usize>,
    /// Upstream tool-call index -> (block index, accumulated JSON arguments).
    tool_calls: BTreeMap<u32, (usize, String, String)>,
    next_index: usize,
    message_started: bool,
    signatures: ThoughtSignatureEngine,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            open_text_index: None,
            open_thinking_index: None,
            tool_calls: BTreeMap::new(),
            next_index: 0,
            message_started: false,
            signatures: ThoughtSignatureEngine::new(900, 4096),
        }
    }

    fn allocate_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn reattach_signature(&self, text: &str, given: Option<String>) -> String {
        if let Some(sig) = given {
            if let Some(key) = CacheKeyGenerator::generate_text(text) {
                self.signatures.put_signature(key, sig.clone().into());
            }
            return sig;
        }
        CacheKeyGenerator::generate_text(text)
            .and_then(|key| self.signatures.get_signature(&key))
            .map(|sig| sig.to_string())
            .unwrap_or_else(|| self.signatures.fallback_signature().to_string())
    }
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes one upstream OpenAI-chat `chat.completion.chunk` payload into
/// zero or more translator events. `finish_reason` on the final chunk closes
/// every still-open block and terminates the message exactly once.
pub fn decode_openai_chat_chunk(
    state: &mut StreamAccumulator,
    chunk: &ChatCompletionChunk,
) -> Result<Vec<TranslatorEvent>, RelayGateError> {
    let mut events = Vec::new();
    if !state.message_started {
        events.push(TranslatorEvent::MessageStart {
            model: chunk.model.clone(),
        });
        state.message_started = true;
    }

    let Some(choice) = chunk.choices.first() else {
        return Ok(events);
    };

    if let Some(text) = &choice.delta.content {
        if !text.is_empty() {
            let index = *state.open_text_index.get_or_insert_with(|| {
                let idx = state_allocate(state);
                events.push(TranslatorEvent::ContentBlockStart {
                    index: idx,
                    kind: BlockKind::Text,
                });
                idx
            });
            events.push(TranslatorEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::Text(text.clone()),
            });
        }
    }

    if let Some(text) = &choice.delta.reasoning_content {
        if !text.is_empty() {
            let index = *state.open_thinking_index.get_or_insert_with(|| {
                let idx = state_allocate(state);
                events.push(TranslatorEvent::ContentBlockStart {
                    index: idx,
                    kind: BlockKind::Thinking,
                });
                idx
            });
            events.push(TranslatorEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::Thinking(text.clone()),
            });
        }
    }

    for call in choice.delta.tool_calls.iter().flatten() {
        let entry = state
            .tool_calls
            .entry(call.index)
            .or_insert_with(|| (usize::MAX, String::new(), String::new()));
        if entry.0 == usize::MAX {
            entry.0 = state.next_index;
            state.next_index += 1;
        }
        if let Some(id) = &call.id {
            entry.1 = id.clone();
        }
        if let Some(function) = &call.function {
            if let Some(name) = &function.name {
                if entry.1.is_empty() {
                    entry.1 = name.clone();
                }
                events.push(TranslatorEvent::ContentBlockStart {
                    index: entry.0,
                    kind: BlockKind::ToolUse {
                        id: entry.1.clone(),
                        name: name.clone(),
                    },
                });
            }
            if let Some(arguments) = &function.arguments {
                entry.2.push_str(arguments);
            }
        }
    }

    if let Some(reason) = &choice.finish_reason {
        for index in [state.open_text_index, state.open_thinking_index]
            .into_iter()
            .flatten()
        {
            events.push(TranslatorEvent::ContentBlockStop { index });
        }
        for (index, _id, args) in state.tool_calls.values() {
            events.push(TranslatorEvent::ContentBlockDelta {
                index: *index,
                delta: BlockDelta::InputJson(args.clone()),
            });
            events.push(TranslatorEvent::ContentBlockStop { index: *index });
        }
        events.push(TranslatorEvent::MessageDelta {
            stop_reason: Some(finish_reason_to_stop_reason(reason)),
            usage: IrUsage::default(),
        });
        events.push(TranslatorEvent::MessageStop);
    }

    Ok(events)
}

fn state_allocate(state: &mut StreamAccumulator) -> usize {
    state.allocate_index()
}

fn finish_reason_to_stop_reason(reason: &str) -> StopReason {
    match reason {
        "tool_calls" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

/// Decodes one upstream Gemini `streamGenerateContent` chunk (a single
/// `GeminiResponseBody` with one candidate carrying the newly produced
/// parts) into translator events.
pub fn decode_gemini_chunk(
    state: &mut StreamAccumulator,
    chunk: &GeminiResponseBody,
) -> Result<Vec<TranslatorEvent>, RelayGateError> {
    let mut events = Vec::new();
    if !state.message_started {
        events.push(TranslatorEvent::MessageStart {
            model: chunk.modelVersion.clone().unwrap_or_default(),
        });
        state.message_started = true;
    }

    let Some(candidate) = chunk.candidates.first() else {
        return Ok(events);
    };

    for part in candidate
        .content
        .as_ref()
        .map(|c| c.parts.clone())
        .unwrap_or_default()
    {
        if let Some(call) = &part.function_call {
            let name = call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let args = call.get("args").cloned().unwrap_or(Value::Null);
            let index = state.allocate_index();
            events.push(TranslatorEvent::ContentBlockStart {
                index,
                kind: BlockKind::ToolUse {
                    id: name.clone(),
                    name,
                },
            });
            events.push(TranslatorEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::InputJson(serde_json::to_string(&args).unwrap_or_default()),
            });
            events.push(TranslatorEvent::ContentBlockStop { index });
            continue;
        }

        let Some(text) = part.text.clone() else { continue };
        if part.thought.unwrap_or(false) {
            let index = *state.open_thinking_index.get_or_insert_with(|| {
                let idx = state.next_index;
                state.next_index += 1;
                idx
            });
            if !events.iter().any(|e| matches!(e, TranslatorEvent::ContentBlockStart { index: i, .. } if *i == index)) {
                events.push(TranslatorEvent::ContentBlockStart {
                    index,
                    kind: BlockKind::Thinking,
                });
            }
            events.push(TranslatorEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::Thinking(text.clone()),
            });
            let signature = state.reattach_signature(&text, part.thought_signature.clone());
            events.push(TranslatorEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::Signature(signature),
            });
        } else {
            let index = *state.open_text_index.get_or_insert_with(|| {
                let idx = state.next_index;
                state.next_index += 1;
                idx
            });
            events.push(TranslatorEvent::ContentBlockStart {
                index,
                kind: BlockKind::Text,
            });
            events.push(TranslatorEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::Text(text),
            });
        }
    }

    if candidate.finish_reason.is_some() {
        for index in [state.open_text_index, state.open_thinking_index]
            .into_iter()
            .flatten()
        {
            events.push(TranslatorEvent::ContentBlockStop { index });
        }
        events.push(TranslatorEvent::MessageDelta {
            stop_reason: Some(StopReason::EndTurn),
            usage: IrUsage::default(),
        });
        events.push(TranslatorEvent::MessageStop);
    }

    Ok(events)
}

/// Decodes one upstream Anthropic SSE event. Anthropic is already the
/// vocabulary's native shape, so this is a direct tag mapping rather than a
/// state machine.
pub fn decode_anthropic_event(event: &AnthropicStreamEvent) -> Vec<TranslatorEvent> {
    match event {
        AnthropicStreamEvent::MessageStart { message } => vec![TranslatorEvent::MessageStart {
            model: message.model.clone(),
        }],
        AnthropicStreamEvent::ContentBlockStart {
            index,
            content_block,
        } => vec![TranslatorEvent::ContentBlockStart {
            index: *index,
            kind: match content_block {
                AnthropicContentBlock::Text { .. } => BlockKind::Text,
                AnthropicContentBlock::Thinking { .. } => BlockKind::Thinking,
                AnthropicContentBlock::ToolUse { id, name, .. } => BlockKind::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                },
                AnthropicContentBlock::ToolResult { .. } | AnthropicContentBlock::Image { .. } => {
                    BlockKind::Text
                }
            },
        }],
        AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
            vec![TranslatorEvent::ContentBlockDelta {
                index: *index,
                delta: match delta {
                    AnthropicContentDelta::TextDelta { text } => BlockDelta::Text(text.clone()),
                    AnthropicContentDelta::ThinkingDelta { thinking } => {
                        BlockDelta::Thinking(thinking.clone())
                    }
                    AnthropicContentDelta::SignatureDelta { signature } => {
                        BlockDelta::Signature(signature.clone())
                    }
                    AnthropicContentDelta::InputJsonDelta { partial_json } => {
                        BlockDelta::InputJson(partial_json.clone())
                    }
                },
            }]
        }
        AnthropicStreamEvent::ContentBlockStop { index } => {
            vec![TranslatorEvent::ContentBlockStop { index: *index }]
        }
        AnthropicStreamEvent::MessageDelta { delta, usage } => {
            vec![TranslatorEvent::MessageDelta {
                stop_reason: delta.stop_reason.as_deref().map(stop_reason_from_anthropic),
                usage: IrUsage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                },
            }]
        }
        AnthropicStreamEvent::MessageStop => vec![TranslatorEvent::MessageStop],
        AnthropicStreamEvent::Ping | AnthropicStreamEvent::Error { .. } => Vec::new(),
    }
}

fn stop_reason_from_anthropic(reason: &str) -> StopReason {
    match reason {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

/// Renders one event as an Anthropic SSE frame (`event: <type>\ndata: <json>\n\n`).
/// Returns `None` for events that don't produce a wire frame on their own
/// (block-start bookkeeping the caller already emitted via `message_start`).
pub fn encode_anthropic_event(model: &str, event: &TranslatorEvent) -> Option<Vec<u8>> {
    let wire = match event {
        TranslatorEvent::MessageStart { model: m } => AnthropicStreamEvent::MessageStart {
            message: AnthropicMessagesResponse {
                id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
                kind: "message".to_string(),
                role: "assistant".to_string(),
                content: Vec::new(),
                model: if m.is_empty() { model.to_string() } else { m.clone() },
                stop_reason: None,
                stop_sequence: None,
                usage: AnthropicUsage::default(),
                extra: BTreeMap::new(),
            },
        },
        TranslatorEvent::ContentBlockStart { index, kind } => AnthropicStreamEvent::ContentBlockStart {
            index: *index,
            content_block: match kind {
                BlockKind::Text => AnthropicContentBlock::Text {
                    text: String::new(),
                    extra: BTreeMap::new(),
                },
                BlockKind::Thinking => AnthropicContentBlock::Thinking {
                    thinking: String::new(),
                    signature: None,
                    extra: BTreeMap::new(),
                },
                BlockKind::ToolUse { id, name } => AnthropicContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: Value::Object(serde_json::Map::new()),
                    extra: BTreeMap::new(),
                },
            },
        },
        TranslatorEvent::ContentBlockDelta { index, delta } => AnthropicStreamEvent::ContentBlockDelta {
            index: *index,
            delta: match delta {
                BlockDelta::Text(t) => AnthropicContentDelta::TextDelta { text: t.clone() },
                BlockDelta::Thinking(t) => AnthropicContentDelta::ThinkingDelta { thinking: t.clone() },
                BlockDelta::Signature(s) => AnthropicContentDelta::SignatureDelta { signature: s.clone() },
                BlockDelta::InputJson(j) => AnthropicContentDelta::InputJsonDelta { partial_json: j.clone() },
            },
        },
        TranslatorEvent::ContentBlockStop { index } => {
            AnthropicStreamEvent::ContentBlockStop { index: *index }
        }
        TranslatorEvent::MessageDelta { stop_reason, usage } => AnthropicStreamEvent::MessageDelta {
            delta: AnthropicMessageDelta {
                stop_reason: stop_reason.map(|r| stop_reason_to_anthropic(r).to_string()),
                stop_sequence: None,
            },
            usage: AnthropicUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cache_creation_input_tokens: None,
                cache_read_input_tokens: None,
                extra: BTreeMap::new(),
            },
        },
        TranslatorEvent::MessageStop => AnthropicStreamEvent::MessageStop,
    };

    let event_name = match &wire {
        AnthropicStreamEvent::MessageStart { .. } => "message_start",
        AnthropicStreamEvent::ContentBlockStart { .. } => "content_block_start",
        AnthropicStreamEvent::ContentBlockDelta { .. } => "content_block_delta",
        AnthropicStreamEvent::ContentBlockStop { .. } => "content_block_stop",
        AnthropicStreamEvent::MessageDelta { .. } => "message_delta",
        AnthropicStreamEvent::MessageStop => "message_stop",
        AnthropicStreamEvent::Ping => "ping",
        AnthropicStreamEvent::Error { .. } => "error",
    };
    let data = serde_json::to_string(&wire).ok()?;
    Some(format!("event: {event_name}\ndata: {data}\n\n").into_bytes())
}

fn stop_reason_to_anthropic(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn => "end_turn",
        StopReason::ToolUse => "tool_use",
        StopReason::MaxTokens => "max_tokens",
        StopReason::StopSequence => "stop_sequence",
    }
}

/// Per-client encoder state for the OpenAI-chat dialect: remembers which
/// block index maps to which emitted tool-call slot, since OpenAI numbers
/// tool calls densely from zero while the IR numbers every block (text,
/// thinking, tool uses) in one shared index space.
#[derive(Default)]
pub struct OpenAiChatEncoderState {
    tool_call_slots: BTreeMap<usize, u32>,
    next_slot: u32,
    id: String,
    model: String,
}

/// Renders one event as zero or more `data: <chunk>\n\n` frames, or the
/// literal `data: [DONE]\n\n` terminator on `MessageStop`. Thinking blocks
/// have no OpenAI-chat wire representation and are dropped rather than
/// forwarded as assistant-visible text.
pub fn encode_openai_chat_event(
    state: &mut OpenAiChatEncoderState,
    event: &TranslatorEvent,
) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let chunk_base = |state: &OpenAiChatEncoderState, delta: ChatChunkDelta, finish_reason: Option<String>| {
        ChatCompletionChunk {
            id: state.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: 0,
            model: state.model.clone(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    };

    match event {
        TranslatorEvent::MessageStart { model } => {
            state.id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());
            state.model = model.clone();
            let chunk = chunk_base(
                state,
                ChatChunkDelta {
                    role: Some("assistant".to_string()),
                    ..Default::default()
                },
                None,
            );
            frames.push(sse_json(&chunk));
        }
        TranslatorEvent::ContentBlockStart { index, kind } => {
            if let BlockKind::ToolUse { id, name } = kind {
                let slot = state.next_slot;
                state.next_slot += 1;
                state.tool_call_slots.insert(*index, slot);
                let chunk = chunk_base(
                    state,
                    ChatChunkDelta {
                        tool_calls: Some(vec![ChatToolCallDelta {
                            index: slot,
                            id: Some(id.clone()),
                            kind: Some("function".to_string()),
                            function: Some(ChatToolCallFunctionDelta {
                                name: Some(name.clone()),
                                arguments: None,
                            }),
                        }]),
                        ..Default::default()
                    },
                    None,
                );
                frames.push(sse_json(&chunk));
            }
        }
        TranslatorEvent::ContentBlockDelta { index, delta } => match delta {
            BlockDelta::Text(text) => {
                let chunk = chunk_base(
                    state,
                    ChatChunkDelta {
                        content: Some(text.clone()),
                        ..Default::default()
                    },
                    None,
                );
                frames.push(sse_json(&chunk));
            }
            BlockDelta::Thinking(text) => {
                let chunk = chunk_base(
                    state,
                    ChatChunkDelta {
                        reasoning_content: Some(text.clone()),
                        ..Default::default()
                    },
                    None,
                );
                frames.push(sse_json(&chunk));
            }
            BlockDelta::InputJson(args) => {
                if let Some(&slot) = state.tool_call_slots.get(index) {
                    let chunk = chunk_base(
                        state,
                        ChatChunkDelta {
                            tool_calls: Some(vec![ChatToolCallDelta {
                                index: slot,
                                id: None,
                                kind: None,
                                function: Some(ChatToolCallFunctionDelta {
                                    name: None,
                                    arguments: Some(args.clone()),
                                }),
                            }]),
                            ..Default::default()
                        },
                        None,
                    );
                    frames.push(sse_json(&chunk));
                }
            }
            BlockDelta::Signature(_) => {}
        },
        TranslatorEvent::ContentBlockStop { .. } => {}
        TranslatorEvent::MessageDelta { stop_reason, .. } => {
            let finish_reason = stop_reason.map(|r| match r {
                StopReason::ToolUse => "tool_calls",
                StopReason::MaxTokens => "length",
                StopReason::EndTurn | StopReason::StopSequence => "stop",
            });
            let chunk = chunk_base(state, ChatChunkDelta::default(), finish_reason.map(str::to_string));
            frames.push(sse_json(&chunk));
        }
        TranslatorEvent::MessageStop => {
            frames.push(b"data: [DONE]\n\n".to_vec());
        }
    }

    frames
}

fn sse_json<T: serde::Serialize>(value: &T) -> Vec<u8> {
    let data = serde_json::to_string(value).unwrap_or_default();
    format!("data: {data}\n\n").into_bytes()
}

/// Per-client encoder state for the Gemini dialect's streamed response,
/// which is a growing JSON array of chunk objects rather than named SSE
/// events. `[` is emitted before the first chunk and `]` after the last.
#[derive(Default)]
pub struct GeminiEncoderState {
    model: String,
    emitted_any: bool,
    open_text: bool,
    open_thinking: bool,
}

pub fn encode_gemini_event(state: &mut GeminiEncoderState, event: &TranslatorEvent) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let prefix = |state: &mut GeminiEncoderState| -> Vec<u8> {
        let p = if state.emitted_any { b",".to_vec() } else { b"[".to_vec() };
        state.emitted_any = true;
        p
    };

    let candidate_chunk = |parts: Vec<Part>, finish_reason: Option<String>, model: &str| {
        GeminiResponseBody {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts,
                    extra: BTreeMap::new(),
                }),
                index: Some(0),
                finish_reason,
                extra: BTreeMap::new(),
            }],
            promptFeedback: None,
            usageMetadata: None,
            modelVersion: Some(model.to_string()),
            responseId: None,
            extra: BTreeMap::new(),
        }
    };

    match event {
        TranslatorEvent::MessageStart { model } => {
            state.model = model.clone();
        }
        TranslatorEvent::ContentBlockStart { kind, .. } => match kind {
            BlockKind::Text => state.open_text = true,
            BlockKind::Thinking => state.open_thinking = true,
            BlockKind::ToolUse { .. } => {}
        },
        TranslatorEvent::ContentBlockDelta { delta, .. } => {
            let part = match delta {
                BlockDelta::Text(t) => Some(Part {
                    text: Some(t.clone()),
                    ..Default::default()
                }),
                BlockDelta::Thinking(t) => Some(Part {
                    text: Some(t.clone()),
                    thought: Some(true),
                    ..Default::default()
                }),
                BlockDelta::InputJson(args) => {
                    let call_value: Value = serde_json::from_str(args).unwrap_or(Value::Null);
                    Some(Part {
                        function_call: Some(call_value),
                        ..Default::default()
                    })
                }
                BlockDelta::Signature(_) => None,
            };
            if let Some(part) = part {
                let mut frame = prefix(state);
                frame.extend(serde_json::to_vec(&candidate_chunk(vec![part], None, &state.model)).unwrap_or_default());
                frames.push(frame);
            }
        }
        TranslatorEvent::ContentBlockStop { .. } => {}
        TranslatorEvent::MessageDelta { stop_reason, .. } => {
            let finish_reason = stop_reason.map(|r| match r {
                StopReason::MaxTokens => "MAX_TOKENS",
                _ => "STOP",
            });
            let mut frame = prefix(state);
            frame.extend(
                serde_json::to_vec(&candidate_chunk(Vec::new(), finish_reason.map(str::to_string), &state.model))
                    .unwrap_or_default(),
            );
            frames.push(frame);
        }
        TranslatorEvent::MessageStop => {
            frames.push(b"]".to_vec());
        }
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_chat_chunk_without_finish_reason_does_not_close_message() {
        let mut state = StreamAccumulator::new();
        let chunk = ChatCompletionChunk {
            id: "c1".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 0,
            model: "gpt-4o-mini".to_string(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta: ChatChunkDelta {
                    content: Some("hi".to_string()),
                    ..Default::default()
                },
                finish_reason: None,
            }],
        };
        let events = decode_openai_chat_chunk(&mut state, &chunk).unwrap();
        assert!(!events.iter().any(|e| matches!(e, TranslatorEvent::MessageStop)));
    }

    #[test]
    fn tool_call_arguments_are_buffered_until_finish_reason() {
        let mut state = StreamAccumulator::new();
        let first = ChatCompletionChunk {
            id: "c1".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 0,
            model: "gpt-4o-mini".to_string(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta: ChatChunkDelta {
                    tool_calls: Some(vec![ChatToolCallDelta {
                        index: 0,
                        id: Some("call_1".to_string()),
                        kind: Some("function".to_string()),
                        function: Some(ChatToolCallFunctionDelta {
                            name: Some("get_weather".to_string()),
                            arguments: Some("{\"city\":".to_string()),
                        }),
                    }]),
                    ..Default::default()
                },
                finish_reason: None,
            }],
        };
        let events1 = decode_openai_chat_chunk(&mut state, &first).unwrap();
        assert!(!events1.iter().any(|e| matches!(e, TranslatorEvent::ContentBlockDelta { delta: BlockDelta::InputJson(_), .. })));

        let second = ChatCompletionChunk {
            choices: vec![ChatChunkChoice {
                index: 0,
                delta: ChatChunkDelta {
                    tool_calls: Some(vec![ChatToolCallDelta {
                        index: 0,
                        id: None,
                        kind: None,
                        function: Some(ChatToolCallFunctionDelta {
                            name: None,
                            arguments: Some("\"nyc\"}".to_string()),
                        }),
                    }]),
                    ..Default::default()
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            ..first
        };
        let events2 = decode_openai_chat_chunk(&mut state, &second).unwrap();
        let json_delta = events2.iter().find_map(|e| match e {
            TranslatorEvent::ContentBlockDelta { delta: BlockDelta::InputJson(j), .. } => Some(j.clone()),
            _ => None,
        });
        assert_eq!(json_delta.as_deref(), Some("{\"city\":\"nyc\"}"));
        assert!(events2.iter().any(|e| matches!(e, TranslatorEvent::MessageStop)));
    }

    #[test]
    fn message_stop_emits_done_marker_exactly_once() {
        let mut state = OpenAiChatEncoderState::default();
        let frames = encode_openai_chat_event(&mut state, &TranslatorEvent::MessageStop);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], b"data: [DONE]\n\n".to_vec());
    }

    #[test]
    fn gemini_encoder_wraps_chunks_in_growing_array() {
        let mut state = GeminiEncoderState::default();
        let mut out = Vec::new();
        out.extend(encode_gemini_event(&mut state, &TranslatorEvent::MessageStart { model: "gemini-2.5-pro".to_string() }));
        out.extend(encode_gemini_event(
            &mut state,
            &TranslatorEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::Text("hi".to_string()),
            },
        ));
        out.extend(encode_gemini_event(&mut state, &TranslatorEvent::MessageStop));
        let joined: Vec<u8> = out.into_iter().flatten().collect();
        let text = String::from_utf8(joined).unwrap();
        assert!(text.starts_with('['));
        assert!(text.ends_with(']'));
    }
}
