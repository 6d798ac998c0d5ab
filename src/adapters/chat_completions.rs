//! ChatCompletions adapter (spec.md §4.1.1): the classic message-array
//! chat API with `tool_calls` and `choices[].delta` streaming chunks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::FormatAdapter;
use crate::canonical::{
    CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalResponse, CanonicalTool,
    CanonicalToolCall, Role, ToolChoice, TokenUsage,
};
use crate::error::ConversionError;
use crate::logging::Logger;
use crate::mappers::finish_reason;
use crate::mappers::json_repair::ensure_json_arguments;

pub struct ChatCompletionsAdapter {
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for ChatCompletionsAdapter {
    fn default() -> Self {
        Self { logger: None }
    }
}

impl ChatCompletionsAdapter {
    pub fn new(logger: Option<Arc<dyn Logger>>) -> Self {
        Self { logger }
    }
}

// ---- wire types -----------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_reasoning_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "role")]
#[serde(rename_all = "lowercase")]
enum WireMessage {
    System { content: WireContent },
    User { content: WireContent },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<WireContent>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<WireToolCall>>,
    },
    Tool {
        content: WireContent,
        tool_call_id: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WireContentPart>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum WireContentPart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireImageUrl {
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireResponse {
    id: String,
    model: String,
    choices: Vec<WireChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireChoice {
    index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_reason: Option<String>,
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireResponseMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

// ---- parsing ----------------------------------------------------------

fn content_to_canonical(content: &WireContent) -> Vec<CanonicalContent> {
    match content {
        WireContent::Text(t) => vec![CanonicalContent::Text(t.clone())],
        WireContent::Parts(parts) => parts
            .iter()
            .map(|p| match p {
                WireContentPart::Text { text } => CanonicalContent::Text(text.clone()),
                WireContentPart::ImageUrl { image_url } => {
                    let decoded = crate::mappers::media_type::decode_data_url(&image_url.url);
                    CanonicalContent::Image {
                        url: image_url.url.clone(),
                        media_type: decoded.map(|d| d.media_type),
                    }
                }
            })
            .collect(),
    }
}

fn canonical_to_content(blocks: &[CanonicalContent]) -> WireContent {
    if blocks.len() == 1 {
        if let CanonicalContent::Text(t) = &blocks[0] {
            return WireContent::Text(t.clone());
        }
    }
    let parts = blocks
        .iter()
        .filter_map(|b| match b {
            CanonicalContent::Text(t) => Some(WireContentPart::Text { text: t.clone() }),
            CanonicalContent::Image { url, .. } => Some(WireContentPart::ImageUrl {
                image_url: WireImageUrl { url: url.clone() },
            }),
            _ => None,
        })
        .collect();
    WireContent::Parts(parts)
}

fn wire_tool_call_to_canonical(index: usize, tc: &WireToolCall) -> CanonicalToolCall {
    CanonicalToolCall {
        id: tc.id.clone(),
        index: tc.index.unwrap_or(index),
        name: tc.function.name.clone(),
        arguments: tc.function.arguments.clone(),
    }
}

fn canonical_tool_call_to_wire(tc: &CanonicalToolCall) -> WireToolCall {
    WireToolCall {
        id: tc.id.clone(),
        index: Some(tc.index),
        kind: "function".to_string(),
        function: WireFunctionCall {
            name: tc.name.clone(),
            arguments: ensure_json_arguments(&tc.arguments),
        },
    }
}

fn wire_message_to_canonical(msg: WireMessage) -> CanonicalMessage {
    match msg {
        WireMessage::System { content } => {
            let mut m = CanonicalMessage::new(Role::System);
            m.content = content_to_canonical(&content);
            m
        }
        WireMessage::User { content } => {
            let mut m = CanonicalMessage::new(Role::User);
            m.content = content_to_canonical(&content);
            m
        }
        WireMessage::Assistant { content, tool_calls } => {
            let mut m = CanonicalMessage::new(Role::Assistant);
            if let Some(content) = content {
                m.content = content_to_canonical(&content);
            }
            if let Some(tool_calls) = tool_calls {
                m.tool_calls = tool_calls
                    .iter()
                    .enumerate()
                    .map(|(i, tc)| wire_tool_call_to_canonical(i, tc))
                    .collect();
            }
            m.sync_tool_call_projections();
            m
        }
        WireMessage::Tool { content, tool_call_id } => {
            let mut m = CanonicalMessage::new(Role::Tool);
            m.tool_call_id = Some(tool_call_id.clone());
            let text = match &content {
                WireContent::Text(t) => t.clone(),
                WireContent::Parts(parts) => parts
                    .iter()
                    .filter_map(|p| match p {
                        WireContentPart::Text { text } => Some(text.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            m.content.push(CanonicalContent::ToolResult {
                tool_use_id: tool_call_id,
                content: text,
                structured_content: None,
                is_error: false,
            });
            m
        }
    }
}

fn canonical_message_to_wire(msg: &CanonicalMessage) -> WireMessage {
    match msg.role {
        Role::System => WireMessage::System {
            content: WireContent::Text(msg.text_content()),
        },
        Role::User => WireMessage::User {
            content: canonical_to_content(&msg.content),
        },
        Role::Assistant => {
            let text_blocks: Vec<CanonicalContent> = msg
                .content
                .iter()
                .filter(|c| matches!(c, CanonicalContent::Text(_) | CanonicalContent::Image { .. }))
                .cloned()
                .collect();
            let content = if text_blocks.is_empty() {
                None
            } else {
                Some(canonical_to_content(&text_blocks))
            };
            let tool_calls = if msg.tool_calls.is_empty() {
                None
            } else {
                Some(msg.tool_calls.iter().map(canonical_tool_call_to_wire).collect())
            };
            WireMessage::Assistant { content, tool_calls }
        }
        Role::Tool => {
            let tool_call_id = msg.tool_call_id.clone().unwrap_or_default();
            let text = msg
                .content
                .iter()
                .find_map(|c| match c {
                    CanonicalContent::ToolResult { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| msg.text_content());
            WireMessage::Tool {
                content: WireContent::Text(text),
                tool_call_id,
            }
        }
    }
}

fn tool_choice_to_wire(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => Value::String("auto".into()),
        ToolChoice::None => Value::String("none".into()),
        ToolChoice::Required => Value::String("required".into()),
        ToolChoice::Function(name) => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

fn wire_to_tool_choice(value: &Value) -> Option<ToolChoice> {
    match value {
        Value::String(s) => match s.as_str() {
            "auto" => Some(ToolChoice::Auto),
            "none" => Some(ToolChoice::None),
            "required" => Some(ToolChoice::Required),
            _ => None,
        },
        Value::Object(_) => value
            .get("function")
            .and_then(|f| f.get("name"))
            .and_then(|n| n.as_str())
            .map(|n| ToolChoice::Function(n.to_string())),
        _ => None,
    }
}

impl FormatAdapter for ChatCompletionsAdapter {
    fn parse_request(&self, bytes: &[u8]) -> Result<CanonicalRequest, ConversionError> {
        let wire: WireRequest = serde_json::from_slice(bytes)?;
        if wire.model.is_empty() {
            return Err(ConversionError::missing_field("model"));
        }

        let mut req = CanonicalRequest::new(wire.model);
        req.messages = wire.messages.into_iter().map(wire_message_to_canonical).collect();
        if let Some(tools) = wire.tools {
            req.tools = tools
                .into_iter()
                .map(|t| CanonicalTool::function(t.function.name, t.function.description, t.function.parameters))
                .collect();
        }
        req.tool_choice = wire.tool_choice.as_ref().and_then(wire_to_tool_choice);
        req.temperature = wire.temperature;
        req.top_p = wire.top_p;
        req.max_tokens = wire
            .max_tokens
            .or(wire.max_completion_tokens)
            .or(wire.max_output_tokens);
        req.stop_sequences = wire.stop.unwrap_or_default();
        req.user = wire.user;
        req.parallel_tool_calls = wire.parallel_tool_calls;
        req.presence_penalty = wire.presence_penalty;
        req.frequency_penalty = wire.frequency_penalty;
        req.logit_bias = wire.logit_bias;
        req.n = wire.n;
        req.response_format = wire.response_format;
        req.stream = wire.stream.unwrap_or(false);

        if let Some(effort) = wire.reasoning_effort.as_deref().and_then(crate::mappers::reasoning::Effort::parse) {
            let cfg = crate::mappers::reasoning::ReasoningBudgetConfig::from_env();
            req.reasoning = Some(crate::canonical::Thinking {
                provider: crate::canonical::ThinkingProvider::OpenAi,
                text: None,
                budget_tokens: wire.max_reasoning_tokens.or(Some(cfg.effort_to_budget(effort))),
            });
        }

        if let Some(logger) = &self.logger {
            logger.debug(&format!("parsed chat completions request for model {}", req.model));
        }

        Ok(req)
    }

    fn build_request(&self, req: &CanonicalRequest) -> Result<Vec<u8>, ConversionError> {
        if req.model.is_empty() {
            return Err(ConversionError::missing_field("model"));
        }

        let reasoning_effort = req.reasoning.as_ref().and_then(|t| {
            t.budget_tokens.map(|b| {
                crate::mappers::reasoning::ReasoningBudgetConfig::from_env()
                    .budget_to_effort(b)
                    .as_str()
                    .to_string()
            })
        });

        let wire = WireRequest {
            model: req.model.clone(),
            messages: req.messages.iter().map(canonical_message_to_wire).collect(),
            tools: if req.tools.is_empty() {
                None
            } else {
                Some(
                    req.tools
                        .iter()
                        .map(|t| WireTool {
                            kind: "function".to_string(),
                            function: WireFunction {
                                name: t.name.clone(),
                                description: t.description.clone(),
                                parameters: t.parameters.clone(),
                            },
                        })
                        .collect(),
                )
            },
            tool_choice: req.tool_choice.as_ref().map(tool_choice_to_wire),
            temperature: req.temperature,
            top_p: req.top_p,
            max_tokens: req.max_tokens,
            max_completion_tokens: None,
            max_output_tokens: None,
            stop: if req.stop_sequences.is_empty() {
                None
            } else {
                Some(req.stop_sequences.clone())
            },
            user: req.user.clone(),
            parallel_tool_calls: req.parallel_tool_calls,
            presence_penalty: req.presence_penalty,
            frequency_penalty: req.frequency_penalty,
            logit_bias: req.logit_bias.clone(),
            n: req.n,
            response_format: req.response_format.clone(),
            reasoning_effort,
            max_reasoning_tokens: req.reasoning.as_ref().and_then(|t| t.budget_tokens),
            stream: Some(req.stream),
        };

        serde_json::to_vec(&wire).map_err(|e| ConversionError::marshal_error(e.to_string()))
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<CanonicalResponse, ConversionError> {
        let wire: WireResponse = serde_json::from_slice(bytes)?;
        if wire.choices.is_empty() {
            return Err(ConversionError::no_choices("response has no choices"));
        }

        let mut messages = Vec::new();
        let mut finish_reason_out = None;

        for (i, choice) in wire.choices.into_iter().enumerate() {
            let role = match choice.message.role.as_str() {
                "assistant" => Role::Assistant,
                "system" => Role::System,
                "user" => Role::User,
                _ => Role::Assistant,
            };
            let mut msg = CanonicalMessage::new(role);
            if let Some(content) = choice.message.content {
                if !content.is_empty() {
                    msg.content.push(CanonicalContent::Text(content));
                }
            }
            if let Some(tool_calls) = choice.message.tool_calls {
                msg.tool_calls = tool_calls
                    .iter()
                    .enumerate()
                    .map(|(idx, tc)| wire_tool_call_to_canonical(idx, tc))
                    .collect();
            }
            msg.sync_tool_call_projections();

            if i == 0 {
                finish_reason_out = choice
                    .finish_reason
                    .as_deref()
                    .map(finish_reason::chat_completions_to_canonical);
            }
            messages.push(msg);
        }

        let usage = wire.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CanonicalResponse {
            id: wire.id,
            model: wire.model,
            messages,
            finish_reason: finish_reason_out,
            stop_sequence: None,
            usage,
            success: true,
            thinking: None,
        })
    }

    fn build_response(&self, resp: &CanonicalResponse) -> Result<Vec<u8>, ConversionError> {
        let message = resp
            .primary_message()
            .ok_or_else(|| ConversionError::new(crate::error::ConversionErrorKind::MissingField, "missing message"))?;

        let content = message.text_content();
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(message.tool_calls.iter().map(canonical_tool_call_to_wire).collect())
        };

        let wire = WireResponse {
            id: resp.id.clone(),
            model: resp.model.clone(),
            choices: vec![WireChoice {
                index: 0,
                finish_reason: resp.finish_reason.map(finish_reason::canonical_to_chat_completions).map(String::from),
                message: WireResponseMessage {
                    role: "assistant".to_string(),
                    content: if content.is_empty() { None } else { Some(content) },
                    tool_calls,
                },
            }],
            usage: resp.usage.map(|u| WireUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: Some(u.total()),
            }),
        };

        serde_json::to_vec(&wire).map_err(|e| ConversionError::marshal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ChatCompletionsAdapter {
        ChatCompletionsAdapter::default()
    }

    #[test]
    fn parses_simple_text_request() {
        let body = br#"{"model":"gpt-5","messages":[{"role":"user","content":"hi"}]}"#;
        let req = adapter().parse_request(body).unwrap();
        assert_eq!(req.model, "gpt-5");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].text_content(), "hi");
    }

    #[test]
    fn missing_model_is_missing_field_error() {
        let body = br#"{"model":"","messages":[]}"#;
        let err = adapter().parse_request(body).unwrap_err();
        assert_eq!(err.kind, crate::error::ConversionErrorKind::MissingField);
    }

    #[test]
    fn tool_message_round_trips_through_role_tool() {
        let body = br#"{"model":"gpt-5","messages":[{"role":"tool","tool_call_id":"call_1","content":"42"}]}"#;
        let req = adapter().parse_request(body).unwrap();
        assert_eq!(req.messages[0].tool_call_id.as_deref(), Some("call_1"));
        let rebuilt = adapter().build_request(&req).unwrap();
        let value: Value = serde_json::from_slice(&rebuilt).unwrap();
        assert_eq!(value["messages"][0]["tool_call_id"], "call_1");
        assert_eq!(value["messages"][0]["content"], "42");
    }

    #[test]
    fn no_choices_is_rejected() {
        let body = br#"{"id":"x","model":"gpt-5","choices":[]}"#;
        let err = adapter().parse_response(body).unwrap_err();
        assert_eq!(err.kind, crate::error::ConversionErrorKind::NoChoices);
    }

    #[test]
    fn parses_tool_call_response() {
        let body = br#"{"id":"x","model":"gpt-5","choices":[{"index":0,"finish_reason":"tool_calls","message":{"role":"assistant","tool_calls":[{"id":"call_1","type":"function","function":{"name":"search","arguments":"{\"q\":\"weather\"}"}}]}}]}"#;
        let resp = adapter().parse_response(body).unwrap();
        assert_eq!(resp.messages[0].tool_calls[0].name, "search");
        assert_eq!(resp.finish_reason, Some(crate::canonical::FinishReason::ToolUse));
    }
}
