mod messages_request;
mod messages_response;

pub use messages_request::{
    AnthropicContentBlock, AnthropicMessage, AnthropicMessagesRequest, AnthropicSystem,
    AnthropicTool,
};
pub use messages_response::{
    AnthropicContentDelta, AnthropicErrorDetail, AnthropicMessageDelta, AnthropicMessagesResponse,
    AnthropicStreamEvent, AnthropicUsage,
};
