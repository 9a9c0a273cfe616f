mod chat_request;
mod chat_response;
mod model_list;
mod responses_error;
mod responses_request;

pub use chat_request::{
    ChatCompletionsRequestBody, ChatMessage, ChatMessageContent, ChatTool, ChatToolCall,
    ChatToolCallFunction, ChatToolFunction,
};
pub use chat_response::{
    ChatChoice, ChatChunkChoice, ChatChunkDelta, ChatCompletionChunk, ChatCompletionsResponseBody,
    ChatResponseMessage, ChatToolCallDelta, ChatToolCallFunctionDelta, ChatUsage,
};
pub use model_list::{OpenaiModel, OpenaiModelList};
pub use responses_error::{OpenaiResponsesErrorBody, OpenaiResponsesErrorObject};
pub use responses_request::{
    OpenaiInput, OpenaiInputContent, OpenaiInputItem, OpenaiRequestBody, Reasoning,
};
