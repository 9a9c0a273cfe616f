//! Anthropic Messages API request schema (`POST /v1/messages`).
//!
//! Schema reference: https://docs.anthropic.com/en/api/messages
//!
//! `extra` catch-all fields preserve unknown members on every nested type so
//! deserialization doesn't break when Anthropic extends the schema, matching
//! the pattern used by the OpenAI and Gemini schema modules in this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level request body for `POST /v1/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessagesRequest {
    #[serde(default)]
    pub model: String,

    pub messages: Vec<AnthropicMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<AnthropicSystem>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default)]
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    /// Extended-thinking config: `{"type": "enabled", "budget_tokens": N}` or
    /// `{"type": "disabled"}`. Kept raw; the translator maps this to/from
    /// each dialect's own thinking representation via the Provider Registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicSystem {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,

    #[serde(deserialize_with = "deserialize_message_content")]
    pub content: Vec<AnthropicContentBlock>,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn deserialize_message_content<'de, D>(
    deserializer: D,
) -> Result<Vec<AnthropicContentBlock>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Blocks(Vec<AnthropicContentBlock>),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => vec![AnthropicContentBlock::Text {
            text,
            extra: BTreeMap::new(),
        }],
        Raw::Blocks(blocks) => blocks,
    })
}

/// One content block of an Anthropic message. `extra` on every variant
/// preserves fields (e.g. `cache_control`) this crate doesn't model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
        #[serde(default, flatten)]
        extra: BTreeMap<String, Value>,
    },
    Thinking {
        thinking: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(default, flatten)]
        extra: BTreeMap<String, Value>,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
        #[serde(default, flatten)]
        extra: BTreeMap<String, Value>,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        #[serde(default, flatten)]
        extra: BTreeMap<String, Value>,
    },
    Image {
        source: Value,
        #[serde(default, flatten)]
        extra: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_string_content_becomes_single_text_block() {
        let msg: AnthropicMessage = serde_json::from_value(json!({
            "role": "user",
            "content": "ping",
        }))
        .unwrap();
        assert_eq!(msg.content.len(), 1);
        assert!(matches!(&msg.content[0], AnthropicContentBlock::Text { text, .. } if text == "ping"));
    }

    #[test]
    fn request_collects_unknown_top_level_fields() {
        let req: AnthropicMessagesRequest = serde_json::from_value(json!({
            "model": "claude-3-haiku",
            "messages": [{"role": "user", "content": "hi"}],
            "metadata": {"user_id": "u1"},
        }))
        .unwrap();
        assert_eq!(req.extra.get("metadata"), Some(&json!({"user_id": "u1"})));
    }

    #[test]
    fn tool_use_block_roundtrips() {
        let block: AnthropicContentBlock = serde_json::from_value(json!({
            "type": "tool_use",
            "id": "toolu_1",
            "name": "get_weather",
            "input": {"city": "nyc"},
        }))
        .unwrap();
        let out = serde_json::to_value(&block).unwrap();
        assert_eq!(out["id"], json!("toolu_1"));
    }

    #[test]
    fn default_max_tokens_applies_when_absent() {
        let req: AnthropicMessagesRequest = serde_json::from_value(json!({
            "model": "claude-3-haiku",
            "messages": [],
        }))
        .unwrap();
        assert_eq!(req.max_tokens, 4096);
    }
}
