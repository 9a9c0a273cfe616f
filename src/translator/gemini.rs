//! Gemini v1beta dialect codec.

use relaygate_schema::gemini::{
    Candidate, Content, GeminiGenerateContentRequest, GeminiResponseBody, GenerationConfig, Part,
};
use serde_json::Value;
use std::collections::BTreeMap;

use super::dialect::{RequestCodec, ResponseCodec};
use super::ir::{ContentBlock, IrMessage, IrRequest, IrResponse, IrTool, IrUsage, Role, StopReason};
use crate::error::RelayGateError;

pub struct GeminiCodec;

fn role_to_ir(role: Option<&str>) -> Role {
    match role {
        Some("model") => Role::Assistant,
        _ => Role::User,
    }
}

fn role_from_ir(role: &Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::User | Role::Tool => "user",
    }
}

fn part_to_block(part: Part) -> Option<ContentBlock> {
    if let Some(text) = part.text {
        return Some(if part.thought.unwrap_or(false) {
            ContentBlock::Thinking {
                text,
                signature: part.thought_signature,
            }
        } else {
            ContentBlock::Text(text)
        });
    }
    if let Some(call) = part.function_call {
        let name = call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let input = call.get("args").cloned().unwrap_or(Value::Null);
        return Some(ContentBlock::ToolUse {
            id: name.clone(),
            name,
            input,
        });
    }
    if let Some(resp) = part.function_response {
        let name = resp.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let content = resp.get("response").cloned().unwrap_or(Value::Null);
        return Some(ContentBlock::ToolResult {
            tool_use_id: name,
            content,
            is_error: false,
        });
    }
    None
}

fn block_to_part(block: ContentBlock) -> Part {
    match block {
        ContentBlock::Text(text) => Part {
            text: Some(text),
            ..Default::default()
        },
        ContentBlock::Thinking { text, signature } => Part {
            text: Some(text),
            thought: Some(true),
            thought_signature: signature,
            ..Default::default()
        },
        ContentBlock::ToolUse { name, input, .. } => Part {
            function_call: Some(serde_json::json!({"name": name, "args": input})),
            ..Default::default()
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => Part {
            function_response: Some(serde_json::json!({"name": tool_use_id, "response": content})),
            ..Default::default()
        },
    }
}

fn stop_reason_to_ir(reason: Option<&str>) -> StopReason {
    match reason {
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some("STOP") | None => StopReason::EndTurn,
        _ => StopReason::EndTurn,
    }
}

fn stop_reason_from_ir(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn | StopReason::StopSequence => "STOP",
        StopReason::ToolUse => "STOP",
        StopReason::MaxTokens => "MAX_TOKENS",
    }
}

impl RequestCodec for GeminiCodec {
    fn decode_request(bytes: &[u8]) -> Result<IrRequest, RelayGateError> {
        let req: GeminiGenerateContentRequest = serde_json::from_slice(bytes)?;

        let system = req.system_instruction.and_then(|si| {
            si.parts.into_iter().find_map(|p| p.text)
        });

        let messages = req
            .contents
            .into_iter()
            .map(|c: Content| IrMessage {
                role: role_to_ir(c.role.as_deref()),
                content: c.parts.into_iter().filter_map(part_to_block).collect(),
            })
            .collect();

        let tools = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .flat_map(|t| t.function_declarations.unwrap_or_default())
            .map(|d| IrTool {
                name: d.name,
                description: Some(d.description),
                parameters: d.parameters.or(d.parameters_json_schema).unwrap_or(Value::Null),
            })
            .collect();

        let (thinking_budget, generation_config) = match req.generation_config {
            Some(gc) => {
                let budget = gc.thinking_config.as_ref().and_then(|tc| {
                    tc.get("thinkingBudget").and_then(Value::as_i64)
                });
                (budget, Some(gc))
            }
            None => (None, None),
        };

        Ok(IrRequest {
            model: String::new(),
            system,
            messages,
            tools,
            stream: false,
            thinking_budget,
            reasoning_effort: None,
            max_tokens: generation_config.as_ref().and_then(|gc| gc.max_output_tokens),
            temperature: generation_config.as_ref().and_then(|gc| gc.temperature).map(|t| t as f32),
            top_p: generation_config.as_ref().and_then(|gc| gc.top_p).map(|t| t as f32),
        })
    }

    fn encode_request(ir: &IrRequest) -> Result<Vec<u8>, RelayGateError> {
        let contents = ir
            .messages
            .iter()
            .map(|m| Content {
                role: Some(role_from_ir(&m.role).to_string()),
                parts: m.content.iter().cloned().map(block_to_part).collect(),
                extra: BTreeMap::new(),
            })
            .collect();

        let system_instruction = ir.system.as_ref().map(|text| Content {
            role: None,
            parts: vec![Part {
                text: Some(text.clone()),
                ..Default::default()
            }],
            extra: BTreeMap::new(),
        });

        let generation_config = Some(GenerationConfig {
            temperature: ir.temperature.map(f64::from),
            top_p: ir.top_p.map(f64::from),
            top_k: None,
            max_output_tokens: ir.max_tokens,
            thinking_config: ir.thinking_budget.map(|b| serde_json::json!({"thinkingBudget": b})),
            image_config: None,
            extra: BTreeMap::new(),
        });

        let req = GeminiGenerateContentRequest {
            contents,
            system_instruction,
            generation_config,
            tools: None,
            tool_config: None,
            extra: BTreeMap::new(),
        };

        Ok(serde_json::to_vec(&req)?)
    }
}

impl ResponseCodec for GeminiCodec {
    fn decode_response(bytes: &[u8]) -> Result<IrResponse, RelayGateError> {
        let resp: GeminiResponseBody = serde_json::from_slice(bytes)?;
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| RelayGateError::StreamProtocolError("no candidates in gemini response".to_string()))?;

        let content = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(part_to_block).collect())
            .unwrap_or_default();

        Ok(IrResponse {
            model: resp.modelVersion.unwrap_or_default(),
            content,
            stop_reason: stop_reason_to_ir(candidate.finish_reason.as_deref()),
            usage: IrUsage::default(),
        })
    }

    fn encode_response(ir: &IrResponse) -> Result<Vec<u8>, RelayGateError> {
        let candidate = Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts: ir.content.iter().cloned().map(block_to_part).collect(),
                extra: BTreeMap::new(),
            }),
            index: Some(0),
            finish_reason: Some(stop_reason_from_ir(ir.stop_reason).to_string()),
            extra: BTreeMap::new(),
        };

        let resp = GeminiResponseBody {
            candidates: vec![candidate],
            promptFeedback: None,
            usageMetadata: Some(serde_json::json!({
                "promptTokenCount": ir.usage.input_tokens,
                "candidatesTokenCount": ir.usage.output_tokens,
            })),
            modelVersion: Some(ir.model.clone()),
            responseId: None,
            extra: BTreeMap::new(),
        };

        Ok(serde_json::to_vec(&resp)?)
    }
}
