//! Responses adapter (spec.md §4.1.2): an output-item oriented API
//! with typed streaming events. Requests accept two mutually
//! compatible shapes (`input` and `messages`); this adapter always
//! *builds* using `messages` for upstream compatibility even though it
//! *parses* either (spec.md: "this asymmetry is intentional").

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::FormatAdapter;
use crate::canonical::{
    CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalResponse, CanonicalToolCall,
    Role, TokenUsage,
};
use crate::error::ConversionError;
use crate::logging::Logger;
use crate::mappers::json_repair::ensure_json_arguments;

pub struct ResponsesAdapter {
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for ResponsesAdapter {
    fn default() -> Self {
        Self { logger: None }
    }
}

impl ResponsesAdapter {
    pub fn new(logger: Option<Arc<dyn Logger>>) -> Self {
        Self { logger }
    }
}

// ---- wire types --------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireRequestIn {
    model: String,
    #[serde(default)]
    input: Option<Vec<WireItemIn>>,
    #[serde(default)]
    messages: Option<Vec<WireItemIn>>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    top_p: Option<f64>,
    #[serde(default)]
    max_output_tokens: Option<u32>,
    #[serde(default)]
    stream: Option<bool>,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireItemIn {
    role: String,
    content: Vec<WireContentPartIn>,
}

#[derive(Debug, Deserialize)]
struct WireContentPartIn {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image_url: Option<Value>,
}

#[derive(Debug, Serialize)]
struct WireRequestOut {
    model: String,
    messages: Vec<WireItemOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct WireItemOut {
    role: String,
    content: Vec<WireContentPartOut>,
}

#[derive(Debug, Serialize)]
struct WireContentPartOut {
    #[serde(rename = "type")]
    kind: String,
    text: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireResponseBody {
    id: String,
    model: String,
    #[serde(default)]
    status: Option<String>,
    output: Vec<WireOutputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum WireOutputItem {
    Message {
        role: String,
        content: Vec<WireContentPartOut>,
    },
    FunctionCall {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        arguments: String,
    },
    ToolCall {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        arguments: String,
    },
}

#[derive(Debug, Deserialize, Serialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

fn parts_to_canonical(parts: &[WireContentPartIn]) -> Vec<CanonicalContent> {
    parts
        .iter()
        .filter_map(|p| match p.kind.as_str() {
            "input_text" | "output_text" | "text" => {
                p.text.clone().map(CanonicalContent::Text)
            }
            "input_image" | "image_url" => p.image_url.as_ref().and_then(|v| {
                let url = v.as_str().map(str::to_string).or_else(|| {
                    v.get("url").and_then(|u| u.as_str()).map(str::to_string)
                })?;
                let decoded = crate::mappers::media_type::decode_data_url(&url);
                Some(CanonicalContent::Image {
                    url,
                    media_type: decoded.map(|d| d.media_type),
                })
            }),
            _ => None,
        })
        .collect()
}

fn item_to_message(item: WireItemIn) -> CanonicalMessage {
    let role = match item.role.as_str() {
        "system" => Role::System,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::User,
    };
    let mut msg = CanonicalMessage::new(role);
    msg.content = parts_to_canonical(&item.content);
    msg
}

fn message_to_item(msg: &CanonicalMessage) -> WireItemOut {
    let kind = match msg.role {
        Role::User => "input_text",
        Role::Assistant => "output_text",
        Role::Tool => "tool_result",
        Role::System => "input_text",
    };
    let text = msg.text_content();
    WireItemOut {
        role: msg.role.as_str().to_string(),
        content: vec![WireContentPartOut {
            kind: kind.to_string(),
            text,
        }],
    }
}

impl FormatAdapter for ResponsesAdapter {
    fn parse_request(&self, bytes: &[u8]) -> Result<CanonicalRequest, ConversionError> {
        let wire: WireRequestIn = serde_json::from_slice(bytes)?;
        if wire.model.is_empty() {
            return Err(ConversionError::missing_field("model"));
        }

        // Dual-path: prefer `input`, fall back to `messages` when input
        // is empty or absent (spec.md §4.1.2).
        let items = match wire.input {
            Some(items) if !items.is_empty() => items,
            _ => wire.messages.unwrap_or_default(),
        };

        let mut req = CanonicalRequest::new(wire.model);
        req.messages = items.into_iter().map(item_to_message).collect();
        req.temperature = wire.temperature;
        req.top_p = wire.top_p;
        req.max_tokens = wire.max_output_tokens;
        req.user = wire.user;
        req.stream = wire.stream.unwrap_or(false);

        if let Some(logger) = &self.logger {
            logger.debug(&format!("parsed responses request for model {}", req.model));
        }

        Ok(req)
    }

    fn build_request(&self, req: &CanonicalRequest) -> Result<Vec<u8>, ConversionError> {
        if req.model.is_empty() {
            return Err(ConversionError::missing_field("model"));
        }
        let wire = WireRequestOut {
            model: req.model.clone(),
            messages: req.messages.iter().map(message_to_item).collect(),
            temperature: req.temperature,
            top_p: req.top_p,
            max_output_tokens: req.max_tokens,
            user: req.user.clone(),
            stream: Some(req.stream),
        };
        serde_json::to_vec(&wire).map_err(|e| ConversionError::marshal_error(e.to_string()))
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<CanonicalResponse, ConversionError> {
        let wire: WireResponseBody = serde_json::from_slice(bytes)?;

        let mut message = CanonicalMessage::new(Role::Assistant);
        let mut tool_calls = Vec::new();

        for item in wire.output {
            match item {
                WireOutputItem::Message { content, .. } => {
                    for part in content {
                        message.content.push(CanonicalContent::Text(part.text));
                    }
                }
                WireOutputItem::FunctionCall { id, name, arguments } | WireOutputItem::ToolCall { id, name, arguments } => {
                    let index = tool_calls.len();
                    tool_calls.push(CanonicalToolCall {
                        id: id.unwrap_or_else(|| format!("call_{index}")),
                        index,
                        name,
                        arguments,
                    });
                }
            }
        }

        message.tool_calls = tool_calls;
        message.sync_tool_call_projections();

        let usage = wire.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CanonicalResponse {
            id: wire.id,
            model: wire.model,
            messages: vec![message],
            finish_reason: None,
            stop_sequence: None,
            usage,
            success: wire.status.as_deref() != Some("failed"),
            thinking: None,
        })
    }

    fn build_response(&self, resp: &CanonicalResponse) -> Result<Vec<u8>, ConversionError> {
        let message = resp
            .primary_message()
            .ok_or_else(|| ConversionError::new(crate::error::ConversionErrorKind::MissingField, "missing message"))?;

        let mut output = Vec::new();
        let text_blocks: Vec<WireContentPartOut> = message
            .content
            .iter()
            .filter_map(|c| match c {
                CanonicalContent::Text(t) => Some(WireContentPartOut {
                    kind: "output_text".to_string(),
                    text: t.clone(),
                }),
                _ => None,
            })
            .collect();
        if !text_blocks.is_empty() {
            output.push(WireOutputItem::Message {
                role: "assistant".to_string(),
                content: text_blocks,
            });
        }
        for tc in &message.tool_calls {
            output.push(WireOutputItem::FunctionCall {
                id: Some(tc.id.clone()),
                name: tc.name.clone(),
                arguments: ensure_json_arguments(&tc.arguments),
            });
        }

        let wire = WireResponseBody {
            id: resp.id.clone(),
            model: resp.model.clone(),
            status: Some(if resp.success { "completed" } else { "failed" }.to_string()),
            output,
            usage: resp.usage.map(|u| WireUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: Some(u.total()),
            }),
        };

        serde_json::to_vec(&wire).map_err(|e| ConversionError::marshal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ResponsesAdapter {
        ResponsesAdapter::default()
    }

    #[test]
    fn dual_path_input_and_messages_are_equivalent() {
        let shared = r#"[{"role":"user","content":[{"type":"input_text","text":"hi"}]}]"#;
        let via_input = format!(r#"{{"model":"gpt-5","input":{shared}}}"#);
        let via_messages = format!(r#"{{"model":"gpt-5","messages":{shared}}}"#);

        let req1 = adapter().parse_request(via_input.as_bytes()).unwrap();
        let req2 = adapter().parse_request(via_messages.as_bytes()).unwrap();

        assert_eq!(req1.messages.len(), req2.messages.len());
        assert_eq!(req1.messages[0].text_content(), req2.messages[0].text_content());
    }

    #[test]
    fn builds_function_call_output_item() {
        let mut msg = CanonicalMessage::new(Role::Assistant);
        msg.tool_calls.push(CanonicalToolCall {
            id: "call_1".into(),
            index: 0,
            name: "search".into(),
            arguments: r#"{"q":"weather"}"#.into(),
        });
        let resp = CanonicalResponse {
            id: "resp_1".into(),
            model: "gpt-5".into(),
            messages: vec![msg],
            finish_reason: None,
            stop_sequence: None,
            usage: None,
            success: true,
            thinking: None,
        };
        let bytes = adapter().build_response(&resp).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        let last = value["output"].as_array().unwrap().last().unwrap();
        assert_eq!(last["type"], "function_call");
        assert_eq!(last["name"], "search");
        assert_eq!(last["arguments"], r#"{"q":"weather"}"#);
    }
}
