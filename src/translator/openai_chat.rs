//! OpenAI Chat Completions dialect codec.

use relaygate_schema::openai::{
    ChatChoice, ChatCompletionsRequestBody, ChatCompletionsResponseBody, ChatMessage,
    ChatMessageContent, ChatResponseMessage, ChatTool, ChatToolCall, ChatToolCallFunction,
    ChatToolFunction, ChatUsage,
};
use serde_json::Value;
use std::collections::BTreeMap;

use super::dialect::{RequestCodec, ResponseCodec};
use super::ir::{ContentBlock, IrMessage, IrRequest, IrResponse, IrTool, IrUsage, Role, StopReason};
use crate::error::RelayGateError;

pub struct OpenAiChatCodec;

fn role_to_ir(role: &str) -> Role {
    match role {
        "system" | "developer" => Role::System,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}

fn role_from_ir(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn message_to_ir(msg: ChatMessage) -> IrMessage {
    let mut content = Vec::new();

    if let Some(tool_call_id) = msg.tool_call_id {
        let text = match msg.content {
            Some(ChatMessageContent::Text(t)) => t,
            Some(ChatMessageContent::Parts(parts)) => serde_json::to_string(&parts).unwrap_or_default(),
            None => String::new(),
        };
        content.push(ContentBlock::ToolResult {
            tool_use_id: tool_call_id,
            content: Value::String(text),
            is_error: false,
        });
        return IrMessage {
            role: Role::Tool,
            content,
        };
    }

    match msg.content {
        Some(ChatMessageContent::Text(text)) if !text.is_empty() => {
            content.push(ContentBlock::Text(text));
        }
        Some(ChatMessageContent::Parts(parts)) => {
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    content.push(ContentBlock::Text(text.to_string()));
                }
            }
        }
        _ => {}
    }

    for call in msg.tool_calls.unwrap_or_default() {
        let input: Value = serde_json::from_str(&call.function.arguments)
            .unwrap_or(Value::Object(serde_json::Map::new()));
        content.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    IrMessage {
        role: role_to_ir(&msg.role),
        content,
    }
}

fn message_from_ir(msg: &IrMessage) -> Vec<ChatMessage> {
    if msg.role == Role::Tool {
        return msg
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(ChatMessageContent::Text(
                        content.as_str().map(str::to_string).unwrap_or_else(|| content.to_string()),
                    )),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id.clone()),
                    extra: BTreeMap::new(),
                }),
                _ => None,
            })
            .collect();
    }

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &msg.content {
        match block {
            ContentBlock::Text(t) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(t);
            }
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ChatToolCall {
                    id: id.clone(),
                    kind: "function".to_string(),
                    function: ChatToolCallFunction {
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_default(),
                    },
                });
            }
            ContentBlock::Thinking { .. } | ContentBlock::ToolResult { .. } => {}
        }
    }

    vec![ChatMessage {
        role: role_from_ir(&msg.role).to_string(),
        content: (!text.is_empty()).then_some(ChatMessageContent::Text(text)),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
        extra: BTreeMap::new(),
    }]
}

impl RequestCodec for OpenAiChatCodec {
    fn decode_request(bytes: &[u8]) -> Result<IrRequest, RelayGateError> {
        let req: ChatCompletionsRequestBody = serde_json::from_slice(bytes)?;

        let mut messages: Vec<IrMessage> = Vec::new();
        let mut system = None;
        for msg in req.messages {
            if msg.role == "system" || msg.role == "developer" {
                if let Some(ChatMessageContent::Text(text)) = &msg.content {
                    system = Some(text.clone());
                    continue;
                }
            }
            messages.push(message_to_ir(msg));
        }

        let tools = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|t: ChatTool| IrTool {
                name: t.function.name,
                description: t.function.description,
                parameters: t.function.parameters.unwrap_or(Value::Null),
            })
            .collect();

        Ok(IrRequest {
            model: req.model,
            system,
            messages,
            tools,
            stream: req.stream,
            thinking_budget: None,
            reasoning_effort: req.reasoning_effort,
            max_tokens: req.max_completion_tokens.or(req.max_tokens),
            temperature: req.temperature,
            top_p: req.top_p,
        })
    }

    fn encode_request(ir: &IrRequest) -> Result<Vec<u8>, RelayGateError> {
        let mut messages = Vec::new();
        if let Some(system) = &ir.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(ChatMessageContent::Text(system.clone())),
                tool_calls: None,
                tool_call_id: None,
                extra: BTreeMap::new(),
            });
        }
        for msg in &ir.messages {
            messages.extend(message_from_ir(msg));
        }

        let tools = (!ir.tools.is_empty()).then(|| {
            ir.tools
                .iter()
                .map(|t| ChatTool {
                    kind: "function".to_string(),
                    function: ChatToolFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: Some(t.parameters.clone()),
                    },
                })
                .collect()
        });

        let body = ChatCompletionsRequestBody {
            model: ir.model.clone(),
            messages,
            stream: ir.stream,
            temperature: ir.temperature,
            top_p: ir.top_p,
            max_tokens: ir.max_tokens,
            max_completion_tokens: None,
            tools,
            tool_choice: None,
            reasoning_effort: ir.reasoning_effort.clone(),
            extra: BTreeMap::new(),
        };

        Ok(serde_json::to_vec(&body)?)
    }
}

fn stop_reason_to_ir(reason: Option<&str>) -> StopReason {
    match reason {
        Some("tool_calls") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        Some("stop") | None => StopReason::EndTurn,
        Some(_) => StopReason::EndTurn,
    }
}

fn stop_reason_from_ir(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn => "stop",
        StopReason::ToolUse => "tool_calls",
        StopReason::MaxTokens => "length",
        StopReason::StopSequence => "stop",
    }
}

impl ResponseCodec for OpenAiChatCodec {
    fn decode_response(bytes: &[u8]) -> Result<IrResponse, RelayGateError> {
        let resp: ChatCompletionsResponseBody = serde_json::from_slice(bytes)?;
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RelayGateError::StreamProtocolError("no choices in chat completion response".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::Text(text));
            }
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            let input: Value = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::Object(serde_json::Map::new()));
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        Ok(IrResponse {
            model: resp.model,
            content,
            stop_reason: stop_reason_to_ir(choice.finish_reason.as_deref()),
            usage: IrUsage {
                input_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
                output_tokens: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
            },
        })
    }

    fn encode_response(ir: &IrResponse) -> Result<Vec<u8>, RelayGateError> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in &ir.content {
            match block {
                ContentBlock::Text(t) => text.push_str(t),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ChatToolCall {
                    id: id.clone(),
                    kind: "function".to_string(),
                    function: ChatToolCallFunction {
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_default(),
                    },
                }),
                ContentBlock::Thinking { .. } | ContentBlock::ToolResult { .. } => {}
            }
        }

        let body = ChatCompletionsResponseBody {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: 0,
            model: ir.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatResponseMessage {
                    role: "assistant".to_string(),
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    reasoning_content: None,
                },
                finish_reason: Some(stop_reason_from_ir(ir.stop_reason).to_string()),
            }],
            usage: Some(ChatUsage {
                prompt_tokens: ir.usage.input_tokens,
                completion_tokens: ir.usage.output_tokens,
                total_tokens: ir.usage.input_tokens + ir.usage.output_tokens,
            }),
            extra: BTreeMap::new(),
        };

        Ok(serde_json::to_vec(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_request_splits_system_message_out() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"},
            ],
        }))
        .unwrap();
        let ir = OpenAiChatCodec::decode_request(&bytes).unwrap();
        assert_eq!(ir.system.as_deref(), Some("be terse"));
        assert_eq!(ir.messages.len(), 1);
    }

    #[test]
    fn decode_response_maps_tool_calls_finish_reason() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"nyc\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        let ir = OpenAiChatCodec::decode_response(&bytes).unwrap();
        assert_eq!(ir.stop_reason, StopReason::ToolUse);
        assert!(matches!(&ir.content[0], ContentBlock::ToolUse { name, .. } if name == "get_weather"));
    }
}
