//! Anthropic Messages dialect codec: decodes/encodes the canonical IR
//! to and from `relaygate_schema::anthropic` wire types.

use relaygate_schema::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicMessagesRequest, AnthropicMessagesResponse,
    AnthropicSystem, AnthropicTool, AnthropicUsage,
};
use serde_json::Value;
use std::collections::BTreeMap;

use super::dialect::{RequestCodec, ResponseCodec};
use super::ir::{ContentBlock, IrMessage, IrRequest, IrResponse, IrTool, IrUsage, Role, StopReason};
use crate::error::RelayGateError;

pub struct AnthropicCodec;

fn role_to_ir(role: &str) -> Role {
    match role {
        "assistant" => Role::Assistant,
        "user" => Role::User,
        other => {
            tracing::debug!(role = other, "anthropic: unrecognized message role, treating as user");
            Role::User
        }
    }
}

fn role_from_ir(role: &Role) -> &'static str {
    match role {
        Role::Assistant => "assistant",
        Role::System | Role::User | Role::Tool => "user",
    }
}

fn block_to_ir(block: AnthropicContentBlock) -> Option<ContentBlock> {
    match block {
        AnthropicContentBlock::Text { text, .. } => Some(ContentBlock::Text(text)),
        AnthropicContentBlock::Thinking {
            thinking, signature, ..
        } => Some(ContentBlock::Thinking {
            text: thinking,
            signature,
        }),
        AnthropicContentBlock::ToolUse {
            id, name, input, ..
        } => Some(ContentBlock::ToolUse { id, name, input }),
        AnthropicContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => Some(ContentBlock::ToolResult {
            tool_use_id,
            content: content.unwrap_or(Value::Null),
            is_error: is_error.unwrap_or(false),
        }),
        AnthropicContentBlock::Image { .. } => None,
    }
}

fn block_from_ir(block: ContentBlock) -> AnthropicContentBlock {
    match block {
        ContentBlock::Text(text) => AnthropicContentBlock::Text {
            text,
            extra: BTreeMap::new(),
        },
        ContentBlock::Thinking { text, signature } => AnthropicContentBlock::Thinking {
            thinking: text,
            signature,
            extra: BTreeMap::new(),
        },
        ContentBlock::ToolUse { id, name, input } => AnthropicContentBlock::ToolUse {
            id,
            name,
            input,
            extra: BTreeMap::new(),
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => AnthropicContentBlock::ToolResult {
            tool_use_id,
            content: Some(content),
            is_error: Some(is_error),
            extra: BTreeMap::new(),
        },
    }
}

fn stop_reason_from_ir(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn => "end_turn",
        StopReason::ToolUse => "tool_use",
        StopReason::MaxTokens => "max_tokens",
        StopReason::StopSequence => "stop_sequence",
    }
}

fn stop_reason_to_ir(reason: Option<&str>) -> StopReason {
    match reason {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

impl RequestCodec for AnthropicCodec {
    fn decode_request(bytes: &[u8]) -> Result<IrRequest, RelayGateError> {
        let req: AnthropicMessagesRequest = serde_json::from_slice(bytes)?;

        let system = match req.system {
            Some(AnthropicSystem::Text(text)) => Some(text),
            Some(AnthropicSystem::Blocks(blocks)) => {
                let merged = blocks
                    .into_iter()
                    .filter_map(|b| match b {
                        AnthropicContentBlock::Text { text, .. } => Some(text),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                (!merged.is_empty()).then_some(merged)
            }
            None => None,
        };

        let messages = req
            .messages
            .into_iter()
            .map(|m: AnthropicMessage| IrMessage {
                role: role_to_ir(&m.role),
                content: m.content.into_iter().filter_map(block_to_ir).collect(),
            })
            .collect();

        let tools = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|t: AnthropicTool| IrTool {
                name: t.name,
                description: t.description,
                parameters: t.input_schema,
            })
            .collect();

        let thinking_budget = req.thinking.as_ref().and_then(|t| {
            if t.get("type").and_then(Value::as_str) == Some("enabled") {
                t.get("budget_tokens").and_then(Value::as_i64).or(Some(-1))
            } else {
                None
            }
        });

        Ok(IrRequest {
            model: req.model,
            system,
            messages,
            tools,
            stream: req.stream,
            thinking_budget,
            reasoning_effort: None,
            max_tokens: Some(req.max_tokens),
            temperature: req.temperature,
            top_p: req.top_p,
        })
    }

    fn encode_request(ir: &IrRequest) -> Result<Vec<u8>, RelayGateError> {
        let messages = ir
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: role_from_ir(&m.role).to_string(),
                content: m.content.iter().cloned().map(block_from_ir).collect(),
                extra: BTreeMap::new(),
            })
            .collect();

        let tools = (!ir.tools.is_empty()).then(|| {
            ir.tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                    extra: BTreeMap::new(),
                })
                .collect()
        });

        let thinking = ir.thinking_budget.map(|budget| {
            if budget < 0 {
                serde_json::json!({"type": "enabled", "budget_tokens": 1024})
            } else {
                serde_json::json!({"type": "enabled", "budget_tokens": budget})
            }
        });

        let req = AnthropicMessagesRequest {
            model: ir.model.clone(),
            messages,
            system: ir.system.clone().map(AnthropicSystem::Text),
            max_tokens: ir.max_tokens.unwrap_or(4096),
            temperature: ir.temperature,
            top_p: ir.top_p,
            top_k: None,
            stream: ir.stream,
            stop_sequences: None,
            tools,
            tool_choice: None,
            thinking,
            extra: BTreeMap::new(),
        };

        Ok(serde_json::to_vec(&req)?)
    }
}

impl ResponseCodec for AnthropicCodec {
    fn decode_response(bytes: &[u8]) -> Result<IrResponse, RelayGateError> {
        let resp: AnthropicMessagesResponse = serde_json::from_slice(bytes)?;
        Ok(IrResponse {
            model: resp.model,
            content: resp.content.into_iter().filter_map(block_to_ir).collect(),
            stop_reason: stop_reason_to_ir(resp.stop_reason.as_deref()),
            usage: IrUsage {
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
            },
        })
    }

    fn encode_response(ir: &IrResponse) -> Result<Vec<u8>, RelayGateError> {
        let resp = AnthropicMessagesResponse {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            kind: "message".to_string(),
            role: "assistant".to_string(),
            content: ir.content.iter().cloned().map(block_from_ir).collect(),
            model: ir.model.clone(),
            stop_reason: Some(stop_reason_from_ir(ir.stop_reason).to_string()),
            stop_sequence: None,
            usage: AnthropicUsage {
                input_tokens: ir.usage.input_tokens,
                output_tokens: ir.usage.output_tokens,
                cache_creation_input_tokens: None,
                cache_read_input_tokens: None,
                extra: BTreeMap::new(),
            },
            extra: BTreeMap::new(),
        };
        Ok(serde_json::to_vec(&resp)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_request_merges_system_blocks_and_maps_thinking_budget() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "model": "claude-3-7-sonnet",
            "messages": [{"role": "user", "content": "hi"}],
            "thinking": {"type": "enabled", "budget_tokens": 2048},
        }))
        .unwrap();
        let ir = AnthropicCodec::decode_request(&bytes).unwrap();
        assert_eq!(ir.thinking_budget, Some(2048));
        assert_eq!(ir.messages.len(), 1);
        assert_eq!(ir.messages[0].role, Role::User);
    }

    #[test]
    fn encode_then_decode_response_preserves_tool_use_block() {
        let ir = IrResponse {
            model: "claude-3-7-sonnet".to_string(),
            content: vec![ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_weather".to_string(),
                input: serde_json::json!({"city": "nyc"}),
            }],
            stop_reason: StopReason::ToolUse,
            usage: IrUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        };
        let bytes = AnthropicCodec::encode_response(&ir).unwrap();
        let round_tripped = AnthropicCodec::decode_response(&bytes).unwrap();
        assert_eq!(round_tripped.content, ir.content);
        assert_eq!(round_tripped.stop_reason, StopReason::ToolUse);
    }
}
