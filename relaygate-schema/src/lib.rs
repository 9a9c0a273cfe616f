pub mod anthropic;
pub mod codex;
pub mod gemini;
pub mod geminicli;
pub mod openai;

pub use anthropic::{AnthropicMessagesRequest, AnthropicMessagesResponse, AnthropicStreamEvent};
pub use codex::{CodexErrorBody, CodexRequestBody};
pub use geminicli::{GeminiCliRequest, GeminiCliRequestMeta, GeminiCliResponseBody};
pub use openai::{
    ChatCompletionChunk, ChatCompletionsRequestBody, ChatCompletionsResponseBody, OpenaiRequestBody,
    OpenaiResponsesErrorBody, OpenaiResponsesErrorObject,
};
