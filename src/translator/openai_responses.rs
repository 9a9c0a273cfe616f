//! OpenAI Responses dialect codec (`POST /v1/responses`).
//!
//! The Responses API's unary response envelope (`output: [...]`, `status`,
//! item-by-item reasoning/message blocks) has no typed schema module in
//! `relaygate-schema` yet — unlike the request side, which is fully typed
//! via `OpenaiRequestBody`. Constructing/parsing it here as `serde_json::Value`
//! keeps this codec's slice of the dialect representative rather than
//! growing a third full schema crate module for a response shape this
//! pipeline only ever emits and never needs to validate strictly.

use relaygate_schema::openai::{OpenaiInput, OpenaiInputContent, OpenaiInputItem, OpenaiRequestBody, Reasoning};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use super::dialect::{RequestCodec, ResponseCodec};
use super::ir::{ContentBlock, IrMessage, IrRequest, IrResponse, IrTool, IrUsage, Role, StopReason};
use crate::error::RelayGateError;

pub struct OpenAiResponsesCodec;

fn role_to_ir(role: Option<&str>) -> Role {
    match role {
        Some("system") | Some("developer") => Role::System,
        Some("assistant") => Role::Assistant,
        _ => Role::User,
    }
}

fn extract_text(content: &Option<OpenaiInputContent>) -> String {
    match content {
        Some(OpenaiInputContent::Parts(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

impl RequestCodec for OpenAiResponsesCodec {
    fn decode_request(bytes: &[u8]) -> Result<IrRequest, RelayGateError> {
        let req: OpenaiRequestBody = serde_json::from_slice(bytes)?;

        let mut messages = Vec::new();
        let mut system = req.instructions.clone();

        if let Some(OpenaiInput::Items(items)) = req.input {
            for item in items {
                let role = role_to_ir(item.role.as_deref());
                let text = extract_text(&item.content);
                if role == Role::System {
                    if !text.is_empty() {
                        system = Some(text);
                    }
                    continue;
                }
                if text.is_empty() {
                    continue;
                }
                messages.push(IrMessage {
                    role,
                    content: vec![ContentBlock::Text(text)],
                });
            }
        }

        let thinking_budget = req
            .reasoning
            .as_ref()
            .and_then(|r| r.effort.clone())
            .map(|_| -1);

        Ok(IrRequest {
            model: req.model,
            system,
            messages,
            tools: Vec::new(),
            stream: req.stream,
            thinking_budget,
            reasoning_effort: req.reasoning.and_then(|r| r.effort),
            max_tokens: req.max_output_tokens,
            temperature: req.temperature,
            top_p: req.top_p,
        })
    }

    fn encode_request(ir: &IrRequest) -> Result<Vec<u8>, RelayGateError> {
        let mut items = Vec::new();
        if let Some(system) = &ir.system {
            items.push(OpenaiInputItem {
                role: Some("system".to_string()),
                content: Some(OpenaiInputContent::Parts(vec![
                    json!({"type": "input_text", "text": system}),
                ])),
                extra: BTreeMap::new(),
            });
        }
        for msg in &ir.messages {
            let text = msg
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            if text.is_empty() {
                continue;
            }
            items.push(OpenaiInputItem {
                role: Some(match msg.role {
                    Role::Assistant => "assistant".to_string(),
                    _ => "user".to_string(),
                }),
                content: Some(OpenaiInputContent::Parts(vec![
                    json!({"type": "input_text", "text": text}),
                ])),
                extra: BTreeMap::new(),
            });
        }

        let reasoning = ir
            .reasoning_effort
            .clone()
            .map(|effort| Reasoning {
                effort: Some(effort),
                summary: None,
            });

        let body = OpenaiRequestBody {
            include: None,
            input: Some(OpenaiInput::Items(items)),
            instructions: None,
            max_output_tokens: ir.max_tokens,
            model: ir.model.clone(),
            parallel_tool_calls: None,
            reasoning,
            service_tier: None,
            store: None,
            stream: ir.stream,
            temperature: ir.temperature,
            top_p: ir.top_p,
            extra: BTreeMap::new(),
        };

        Ok(serde_json::to_vec(&body)?)
    }
}

impl ResponseCodec for OpenAiResponsesCodec {
    fn decode_response(bytes: &[u8]) -> Result<IrResponse, RelayGateError> {
        let value: Value = serde_json::from_slice(bytes)?;

        let mut content = Vec::new();
        for item in value
            .get("output")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
        {
            if item.get("type").and_then(Value::as_str) != Some("message") {
                continue;
            }
            for part in item.get("content").and_then(Value::as_array).cloned().unwrap_or_default() {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    content.push(ContentBlock::Text(text.to_string()));
                }
            }
        }

        let stop_reason = match value.get("status").and_then(Value::as_str) {
            Some("incomplete") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        Ok(IrResponse {
            model: value.get("model").and_then(Value::as_str).unwrap_or_default().to_string(),
            content,
            stop_reason,
            usage: IrUsage {
                input_tokens: value
                    .pointer("/usage/input_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
                output_tokens: value
                    .pointer("/usage/output_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
            },
        })
    }

    fn encode_response(ir: &IrResponse) -> Result<Vec<u8>, RelayGateError> {
        let text: String = ir
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect();

        let status = match ir.stop_reason {
            StopReason::MaxTokens => "incomplete",
            _ => "completed",
        };

        let body = json!({
            "id": format!("resp_{}", uuid::Uuid::new_v4().simple()),
            "object": "response",
            "model": ir.model,
            "status": status,
            "output": [{
                "type": "message",
                "role": "assistant",
                "content": [{"type": "output_text", "text": text}],
            }],
            "usage": {
                "input_tokens": ir.usage.input_tokens,
                "output_tokens": ir.usage.output_tokens,
            },
        });

        Ok(serde_json::to_vec(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_request_treats_system_role_item_as_instructions() {
        let bytes = serde_json::to_vec(&json!({
            "model": "gpt-4o-mini",
            "input": [{"role": "system", "content": "be terse"}, {"role": "user", "content": "hi"}],
        }))
        .unwrap();
        let ir = OpenAiResponsesCodec::decode_request(&bytes).unwrap();
        assert_eq!(ir.system.as_deref(), Some("be terse"));
        assert_eq!(ir.messages.len(), 1);
    }

    #[test]
    fn encode_response_wraps_text_in_output_message() {
        let ir = IrResponse {
            model: "gpt-4o-mini".to_string(),
            content: vec![ContentBlock::Text("hello".to_string())],
            stop_reason: StopReason::EndTurn,
            usage: IrUsage::default(),
        };
        let bytes = OpenAiResponsesCodec::encode_response(&ir).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["output"][0]["content"][0]["text"], json!("hello"));
        assert_eq!(value["status"], json!("completed"));
    }
}
