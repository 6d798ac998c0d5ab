//! One adapter per protocol family, each exposing the same four
//! operations (spec.md §4.1). Adapters are stateless except for a
//! reasoning-budget config and an optional logger sink, so they are
//! `Send + Sync` and safe to share behind an `Arc` across requests.

pub mod anthropic;
pub mod chat_completions;
pub mod gemini;
pub mod responses;

use crate::canonical::{CanonicalRequest, CanonicalResponse};
use crate::error::ConversionError;

pub trait FormatAdapter {
    fn parse_request(&self, bytes: &[u8]) -> Result<CanonicalRequest, ConversionError>;
    fn build_request(&self, req: &CanonicalRequest) -> Result<Vec<u8>, ConversionError>;
    fn parse_response(&self, bytes: &[u8]) -> Result<CanonicalResponse, ConversionError>;
    fn build_response(&self, resp: &CanonicalResponse) -> Result<Vec<u8>, ConversionError>;
}

pub use anthropic::AnthropicMessagesAdapter;
pub use chat_completions::ChatCompletionsAdapter;
pub use gemini::GeminiAdapter;
pub use responses::ResponsesAdapter;
