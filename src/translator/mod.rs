//! Translator Pipeline: converts inbound client requests and outbound
//! upstream responses between the four dialects this proxy speaks.
//!
//! Unary exchanges go through the canonical `ir` representation via
//! `dialect::translate_request`/`translate_response`. Streamed exchanges go
//! through the `stream` module's dialect-neutral event vocabulary instead,
//! since a byte-for-byte IR round trip can't represent partial, in-flight
//! content the way an event sequence can.

pub mod anthropic;
pub mod dialect;
pub mod gemini;
pub mod ir;
pub mod openai_chat;
pub mod openai_responses;
pub mod stream;

pub use dialect::{decode_request, decode_response, encode_request, encode_response, Dialect};
pub use ir::{ContentBlock, IrMessage, IrRequest, IrResponse, IrTool, IrUsage, Role, StopReason};
pub use stream::{BlockDelta, BlockKind, StreamAccumulator, TranslatorEvent};
