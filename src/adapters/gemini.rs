//! Gemini adapter (spec.md §4.1.4): Gemini `generateContent` only
//! participates as a read-only upstream source. Only `parse_response`
//! is implemented; `parse_request`/`build_request`/`build_response`
//! return `unsupported` (spec.md §9, DESIGN.md's Open Question
//! disposition).

use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::FormatAdapter;
use crate::canonical::{
    CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalResponse, CanonicalToolCall,
    Role, TokenUsage,
};
use crate::error::ConversionError;
use crate::logging::Logger;
use crate::mappers::finish_reason;

pub struct GeminiAdapter {
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self { logger: None }
    }
}

impl GeminiAdapter {
    pub fn new(logger: Option<Arc<dyn Logger>>) -> Self {
        Self { logger }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    #[serde(rename = "responseId")]
    response_id: Option<String>,
    #[serde(rename = "modelVersion")]
    #[serde(default)]
    model_version: Option<String>,
    candidates: Vec<WireCandidate>,
    #[serde(rename = "usageMetadata")]
    #[serde(default)]
    usage_metadata: Option<WireUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    content: WireContent,
    #[serde(rename = "finishReason")]
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "inlineData")]
    #[serde(default)]
    inline_data: Option<WireInlineData>,
    #[serde(rename = "functionCall")]
    #[serde(default)]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct WireInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl FormatAdapter for GeminiAdapter {
    fn parse_request(&self, _bytes: &[u8]) -> Result<CanonicalRequest, ConversionError> {
        Err(ConversionError::unsupported(
            "Gemini is a read-only upstream source; inbound request parsing is not supported",
        ))
    }

    fn build_request(&self, _req: &CanonicalRequest) -> Result<Vec<u8>, ConversionError> {
        Err(ConversionError::unsupported(
            "Gemini request building is not supported",
        ))
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<CanonicalResponse, ConversionError> {
        let wire: WireResponse = serde_json::from_slice(bytes)?;

        let candidate = wire
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ConversionError::no_choices("gemini response has no candidates"))?;

        let mut message = CanonicalMessage::new(Role::Assistant);
        let mut tool_calls = Vec::new();

        for part in candidate.content.parts {
            if let Some(text) = part.text {
                message.content.push(CanonicalContent::Text(text));
            }
            if let Some(inline) = part.inline_data {
                let url = crate::mappers::media_type::build_data_url(&inline.mime_type, &inline.data);
                message.content.push(CanonicalContent::Image {
                    url,
                    media_type: Some(inline.mime_type),
                });
            }
            if let Some(call) = part.function_call {
                let index = tool_calls.len();
                let id = format!("gemini_call_{index}");
                let arguments = serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string());
                tool_calls.push(CanonicalToolCall {
                    id,
                    index,
                    name: call.name,
                    arguments,
                });
            }
        }

        message.tool_calls = tool_calls;
        message.sync_tool_call_projections();

        let finish_reason = candidate
            .finish_reason
            .as_deref()
            .map(finish_reason::gemini_to_canonical);

        let usage = wire.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        if let Some(logger) = &self.logger {
            logger.debug("parsed gemini response");
        }

        Ok(CanonicalResponse {
            id: wire.response_id.unwrap_or_default(),
            model: wire.model_version.unwrap_or_default(),
            messages: vec![message],
            finish_reason,
            stop_sequence: None,
            usage,
            success: true,
            thinking: None,
        })
    }

    fn build_response(&self, _resp: &CanonicalResponse) -> Result<Vec<u8>, ConversionError> {
        Err(ConversionError::unsupported(
            "Gemini response building is not supported",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::default()
    }

    #[test]
    fn parses_text_candidate() {
        let body = br#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hi there"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":2,"totalTokenCount":5}}"#;
        let resp = adapter().parse_response(body).unwrap();
        assert_eq!(resp.messages[0].text_content(), "hi there");
        assert_eq!(resp.finish_reason, Some(crate::canonical::FinishReason::EndTurn));
        assert_eq!(resp.usage.unwrap().total(), 5);
    }

    #[test]
    fn parses_function_call_part() {
        let body = br#"{"candidates":[{"content":{"role":"model","parts":[{"functionCall":{"name":"search","args":{"q":"x"}}}]},"finishReason":"TOOL_CALLS"}]}"#;
        let resp = adapter().parse_response(body).unwrap();
        assert_eq!(resp.messages[0].tool_calls[0].name, "search");
        assert_eq!(resp.finish_reason, Some(crate::canonical::FinishReason::ToolUse));
    }

    #[test]
    fn request_parsing_is_unsupported() {
        let err = adapter().parse_request(b"{}").unwrap_err();
        assert_eq!(err.kind, crate::error::ConversionErrorKind::Unsupported);
    }
}
