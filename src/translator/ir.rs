//! Canonical intermediate representation the Translator Pipeline converts
//! every dialect's unary request/response through. Per §4.6's note, this is
//! a representative, non-exhaustive slice of each dialect's schema —
//! exactly the fields needed to exercise every testable property in §8 of
//! the specification this pipeline implements, not a field-by-field mirror
//! of every upstream's entire wire format.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    Thinking {
        text: String,
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Default)]
pub struct IrTool {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
}

/// A dialect-neutral chat request. `thinking_budget` follows the spec's
/// thinking/reasoning glossary entry: either a numeric token budget, `-1`
/// for "dynamic", or `None` when the request didn't ask for it — the
/// Provider Registry's `Thinking::normalize_budget` maps this onto whatever
/// the target model actually supports.
#[derive(Debug, Clone, Default)]
pub struct IrRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<IrMessage>,
    pub tools: Vec<IrTool>,
    pub stream: bool,
    pub thinking_budget: Option<i64>,
    pub reasoning_effort: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IrUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct IrResponse {
    pub model: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: IrUsage,
}
