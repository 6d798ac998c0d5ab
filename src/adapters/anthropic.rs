//! AnthropicMessages adapter (spec.md §4.1.3): a block-based content
//! model (`text`, `image`, `tool_use`, `tool_result`, `thinking`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::FormatAdapter;
use crate::canonical::{
    CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalResponse, CanonicalTool,
    CanonicalToolCall, Role, Thinking, ThinkingProvider, ToolChoice, TokenUsage,
};
use crate::error::ConversionError;
use crate::logging::Logger;
use crate::mappers::json_repair::ensure_json_arguments;
use crate::mappers::{finish_reason, reasoning};

pub struct AnthropicMessagesAdapter {
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for AnthropicMessagesAdapter {
    fn default() -> Self {
        Self { logger: None }
    }
}

impl AnthropicMessagesAdapter {
    pub fn new(logger: Option<Arc<dyn Logger>>) -> Self {
        Self { logger }
    }
}

// ---- wire types --------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<WireSystem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<WireToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<WireThinking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disable_parallel_tool_use: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum WireSystem {
    Text(String),
    Blocks(Vec<WireTextBlock>),
}

#[derive(Debug, Deserialize, Serialize)]
struct WireTextBlock {
    #[serde(rename = "type")]
    kind: String,
    text: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireMessage {
    role: String,
    content: WireMessageContent,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum WireMessageContent {
    Text(String),
    Blocks(Vec<WireContentBlock>),
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum WireContentBlock {
    Text {
        text: String,
    },
    Image {
        source: Value,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<WireToolResultContent>,
        #[serde(default)]
        is_error: Option<bool>,
    },
    Thinking {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        budget_tokens: Option<u32>,
    },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum WireToolResultContent {
    Text(String),
    Blocks(Vec<WireContentBlock>),
}

#[derive(Debug, Deserialize, Serialize)]
struct WireTool {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    input_schema: Value,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum WireToolChoice {
    Auto,
    Any {
        #[serde(skip_serializing_if = "Option::is_none")]
        disable_parallel_tool_use: Option<bool>,
    },
    Tool {
        name: String,
    },
}

#[derive(Debug, Deserialize, Serialize)]
struct WireThinking {
    #[serde(rename = "type")]
    kind: String,
    budget_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireResponse {
    id: String,
    model: String,
    role: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    stop_sequence: Option<String>,
    usage: WireUsage,
    content: Vec<WireContentBlock>,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    cache_read_input_tokens: Option<u32>,
}

// ---- conversions --------------------------------------------------------

fn block_to_canonical(block: WireContentBlock, index: usize) -> CanonicalContent {
    match block {
        WireContentBlock::Text { text } => CanonicalContent::Text(text),
        WireContentBlock::Image { source } => {
            let url = source
                .get("data")
                .and_then(|d| d.as_str())
                .map(|data| {
                    let media_type = source
                        .get("media_type")
                        .and_then(|m| m.as_str())
                        .unwrap_or("application/octet-stream");
                    crate::mappers::media_type::build_data_url(media_type, data)
                })
                .or_else(|| source.get("url").and_then(|u| u.as_str()).map(str::to_string))
                .unwrap_or_default();
            let media_type = source.get("media_type").and_then(|m| m.as_str()).map(str::to_string);
            CanonicalContent::Image { url, media_type }
        }
        WireContentBlock::ToolUse { id, name, input } => {
            let arguments = serde_json::to_string(&input).unwrap_or_else(|_| "{}".to_string());
            CanonicalContent::ToolUse {
                id,
                name,
                arguments,
                parsed: Some(input),
                index,
            }
        }
        WireContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let (text, structured) = match content {
                Some(WireToolResultContent::Text(t)) => (t, None),
                Some(WireToolResultContent::Blocks(blocks)) => {
                    let converted: Vec<CanonicalContent> = blocks
                        .into_iter()
                        .enumerate()
                        .map(|(i, b)| block_to_canonical(b, i))
                        .collect();
                    let text = converted
                        .iter()
                        .filter_map(|c| match c {
                            CanonicalContent::Text(t) => Some(t.as_str()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    (text, Some(converted))
                }
                None => (String::new(), None),
            };
            CanonicalContent::ToolResult {
                tool_use_id,
                content: text,
                structured_content: structured,
                is_error: is_error.unwrap_or(false),
            }
        }
        WireContentBlock::Thinking { text, budget_tokens } => CanonicalContent::Thinking(Thinking {
            provider: ThinkingProvider::Anthropic,
            text,
            budget_tokens,
        }),
    }
}

fn canonical_to_block(content: &CanonicalContent) -> Option<WireContentBlock> {
    match content {
        CanonicalContent::Text(t) => Some(WireContentBlock::Text { text: t.clone() }),
        CanonicalContent::Image { url, media_type } => {
            let decoded = crate::mappers::media_type::decode_data_url(url);
            let source = if let Some(decoded) = decoded {
                serde_json::json!({
                    "type": "base64",
                    "media_type": decoded.media_type,
                    "data": decoded.base64_data,
                })
            } else {
                serde_json::json!({
                    "type": "url",
                    "url": url,
                    "media_type": media_type,
                })
            };
            Some(WireContentBlock::Image { source })
        }
        CanonicalContent::ToolUse {
            id, name, arguments, parsed, ..
        } => {
            let input = parsed
                .clone()
                .or_else(|| serde_json::from_str(arguments).ok())
                .unwrap_or_else(|| Value::Object(Default::default()));
            Some(WireContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input,
            })
        }
        CanonicalContent::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => Some(WireContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: Some(WireToolResultContent::Text(content.clone())),
            is_error: Some(*is_error),
        }),
        CanonicalContent::Thinking(t) => Some(WireContentBlock::Thinking {
            text: t.text.clone(),
            budget_tokens: t.budget_tokens,
        }),
    }
}

fn message_content_to_canonical(content: WireMessageContent) -> Vec<CanonicalContent> {
    match content {
        WireMessageContent::Text(t) => vec![CanonicalContent::Text(t)],
        WireMessageContent::Blocks(blocks) => blocks
            .into_iter()
            .enumerate()
            .map(|(i, b)| block_to_canonical(b, i))
            .collect(),
    }
}

fn tool_choice_to_wire(choice: &ToolChoice) -> Option<WireToolChoice> {
    match choice {
        ToolChoice::Auto => Some(WireToolChoice::Auto),
        ToolChoice::None => None,
        ToolChoice::Required => Some(WireToolChoice::Any {
            disable_parallel_tool_use: None,
        }),
        ToolChoice::Function(name) => Some(WireToolChoice::Tool { name: name.clone() }),
    }
}

fn wire_to_tool_choice(choice: WireToolChoice) -> ToolChoice {
    match choice {
        WireToolChoice::Auto => ToolChoice::Auto,
        WireToolChoice::Any { .. } => ToolChoice::Required,
        WireToolChoice::Tool { name } => ToolChoice::Function(name),
    }
}

impl FormatAdapter for AnthropicMessagesAdapter {
    fn parse_request(&self, bytes: &[u8]) -> Result<CanonicalRequest, ConversionError> {
        let wire: WireRequest = serde_json::from_slice(bytes)?;
        if wire.model.is_empty() {
            return Err(ConversionError::missing_field("model"));
        }

        let mut req = CanonicalRequest::new(wire.model);

        if let Some(system) = wire.system {
            let text = match system {
                WireSystem::Text(t) => t,
                WireSystem::Blocks(blocks) => blocks
                    .into_iter()
                    .map(|b| b.text)
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            req.messages.push(CanonicalMessage::text(Role::System, text));
        }

        for m in wire.messages {
            let role = match m.role.as_str() {
                "assistant" => Role::Assistant,
                _ => Role::User,
            };
            let mut msg = CanonicalMessage::new(role);
            msg.content = message_content_to_canonical(m.content);

            // Anthropic embeds tool results inside a user-role message's
            // content blocks; ours already carries tool_use_id per
            // ToolResult block, but the top-level projection wants a
            // dedicated Role::Tool message per spec.md's canonical shape
            // so ChatCompletions-style builders have a direct render.
            let tool_results: Vec<CanonicalContent> = msg
                .content
                .iter()
                .filter(|c| matches!(c, CanonicalContent::ToolResult { .. }))
                .cloned()
                .collect();
            if !tool_results.is_empty() && msg.content.len() == tool_results.len() {
                for result in tool_results {
                    if let CanonicalContent::ToolResult { tool_use_id, .. } = &result {
                        let mut tool_msg = CanonicalMessage::new(Role::Tool);
                        tool_msg.tool_call_id = Some(tool_use_id.clone());
                        tool_msg.content.push(result.clone());
                        req.messages.push(tool_msg);
                    }
                }
                continue;
            }

            msg.tool_calls = msg
                .content
                .iter()
                .filter_map(|c| match c {
                    CanonicalContent::ToolUse {
                        id, name, arguments, index, ..
                    } => Some(CanonicalToolCall {
                        id: id.clone(),
                        index: *index,
                        name: name.clone(),
                        arguments: arguments.clone(),
                    }),
                    _ => None,
                })
                .collect();
            req.messages.push(msg);
        }

        if let Some(tools) = wire.tools {
            req.tools = tools
                .into_iter()
                .map(|t| CanonicalTool::function(t.name, t.description, t.input_schema))
                .collect();
        }

        req.tool_choice = wire.tool_choice.map(wire_to_tool_choice);
        req.temperature = wire.temperature;
        req.top_p = wire.top_p;
        req.top_k = wire.top_k;
        req.max_tokens = Some(wire.max_tokens);
        req.stop_sequences = wire.stop_sequences.unwrap_or_default();
        req.stream = wire.stream.unwrap_or(false);
        req.metadata = wire.metadata.unwrap_or_else(|| Value::Object(Default::default()));
        if let Some(user_id) = req.metadata.get("user_id").and_then(|v| v.as_str()) {
            req.user = Some(user_id.to_string());
        }
        // `parallel_tool_calls` (canonical) <-> `disable_parallel_tool_use`
        // (Anthropic) by logical inversion (spec.md §4.1.3).
        req.parallel_tool_calls = wire.disable_parallel_tool_use.map(|d| !d);

        if let Some(thinking) = wire.thinking {
            req.reasoning = Some(Thinking {
                provider: ThinkingProvider::Anthropic,
                text: None,
                budget_tokens: Some(thinking.budget_tokens),
            });
        }

        if let Some(logger) = &self.logger {
            logger.debug(&format!("parsed anthropic request for model {}", req.model));
        }

        Ok(req)
    }

    fn build_request(&self, req: &CanonicalRequest) -> Result<Vec<u8>, ConversionError> {
        if req.model.is_empty() {
            return Err(ConversionError::missing_field("model"));
        }

        let mut system = None;
        let mut messages = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => {
                    let text = msg.text_content();
                    system = Some(WireSystem::Text(text));
                }
                Role::Tool => {
                    let tool_use_id = msg.tool_call_id.clone().unwrap_or_default();
                    let content = msg
                        .content
                        .iter()
                        .find_map(|c| match c {
                            CanonicalContent::ToolResult { content, is_error, .. } => {
                                Some((content.clone(), *is_error))
                            }
                            _ => None,
                        })
                        .unwrap_or((msg.text_content(), false));
                    messages.push(WireMessage {
                        role: "user".to_string(),
                        content: WireMessageContent::Blocks(vec![WireContentBlock::ToolResult {
                            tool_use_id,
                            content: Some(WireToolResultContent::Text(content.0)),
                            is_error: Some(content.1),
                        }]),
                    });
                }
                Role::User | Role::Assistant => {
                    let mut blocks: Vec<WireContentBlock> =
                        msg.content.iter().filter_map(canonical_to_block).collect();
                    if blocks.is_empty() {
                        blocks.push(WireContentBlock::Text { text: String::new() });
                    }
                    messages.push(WireMessage {
                        role: msg.role.as_str().to_string(),
                        content: WireMessageContent::Blocks(blocks),
                    });
                }
            }
        }

        let mut metadata = req.metadata.clone();
        if let Some(user) = &req.user {
            if let Value::Object(map) = &mut metadata {
                map.insert("user_id".to_string(), Value::String(user.clone()));
            }
        }
        let metadata = if metadata.as_object().map(|m| m.is_empty()).unwrap_or(true) {
            None
        } else {
            Some(metadata)
        };

        let wire = WireRequest {
            model: req.model.clone(),
            messages,
            system,
            tools: if req.tools.is_empty() {
                None
            } else {
                Some(
                    req.tools
                        .iter()
                        .map(|t| WireTool {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            input_schema: t.parameters.clone(),
                        })
                        .collect(),
                )
            },
            tool_choice: req.tool_choice.as_ref().and_then(tool_choice_to_wire),
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: req.top_k,
            max_tokens: req.max_tokens.unwrap_or(4096),
            stop_sequences: if req.stop_sequences.is_empty() {
                None
            } else {
                Some(req.stop_sequences.clone())
            },
            metadata,
            stream: Some(req.stream),
            thinking: req.reasoning.as_ref().and_then(|t| t.budget_tokens).map(|b| WireThinking {
                kind: "enabled".to_string(),
                budget_tokens: b,
            }),
            disable_parallel_tool_use: req.parallel_tool_calls.map(|p| !p),
        };

        serde_json::to_vec(&wire).map_err(|e| ConversionError::marshal_error(e.to_string()))
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<CanonicalResponse, ConversionError> {
        let wire: WireResponse = serde_json::from_slice(bytes)?;

        let mut message = CanonicalMessage::new(Role::Assistant);
        let mut tool_calls = Vec::new();
        let mut thinking = None;

        for (i, block) in wire.content.into_iter().enumerate() {
            let canonical = block_to_canonical(block, i);
            if let CanonicalContent::ToolUse {
                id, name, arguments, index, ..
            } = &canonical
            {
                tool_calls.push(CanonicalToolCall {
                    id: id.clone(),
                    index: *index,
                    name: name.clone(),
                    arguments: arguments.clone(),
                });
            }
            if let CanonicalContent::Thinking(t) = &canonical {
                thinking = Some(t.clone());
            }
            message.content.push(canonical);
        }
        message.tool_calls = tool_calls;

        let finish_reason = wire
            .stop_reason
            .as_deref()
            .map(finish_reason::anthropic_to_canonical);

        Ok(CanonicalResponse {
            id: wire.id,
            model: wire.model,
            messages: vec![message],
            finish_reason,
            stop_sequence: wire.stop_sequence,
            usage: Some(TokenUsage {
                prompt_tokens: Some(wire.usage.input_tokens),
                completion_tokens: Some(wire.usage.output_tokens),
                total_tokens: Some(wire.usage.input_tokens + wire.usage.output_tokens),
            }),
            success: true,
            thinking,
        })
    }

    fn build_response(&self, resp: &CanonicalResponse) -> Result<Vec<u8>, ConversionError> {
        let message = resp
            .primary_message()
            .ok_or_else(|| ConversionError::new(crate::error::ConversionErrorKind::MissingField, "missing message"))?;

        let mut content: Vec<WireContentBlock> = message.content.iter().filter_map(canonical_to_block).collect();
        if content.is_empty() {
            content.push(WireContentBlock::Text { text: String::new() });
        }
        for tc in &message.tool_calls {
            if !message
                .content
                .iter()
                .any(|c| matches!(c, CanonicalContent::ToolUse{ id, .. } if id == &tc.id))
            {
                content.push(WireContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: serde_json::from_str(&ensure_json_arguments(&tc.arguments)).unwrap_or(Value::Null),
                });
            }
        }

        let usage = resp.usage.unwrap_or_default();
        let wire = WireResponse {
            id: resp.id.clone(),
            model: resp.model.clone(),
            role: "assistant".to_string(),
            stop_reason: resp.finish_reason.map(finish_reason::canonical_to_anthropic).map(String::from),
            stop_sequence: resp.stop_sequence.clone(),
            usage: WireUsage {
                input_tokens: usage.prompt_tokens.unwrap_or(0),
                output_tokens: usage.completion_tokens.unwrap_or(0),
                cache_creation_input_tokens: None,
                cache_read_input_tokens: None,
            },
            content,
        };

        serde_json::to_vec(&wire).map_err(|e| ConversionError::marshal_error(e.to_string()))
    }
}

/// Derives an OpenAI-style effort label from an Anthropic thinking
/// budget, for adapters building a ChatCompletions/Responses request
/// from a canonical request carrying Anthropic-sourced reasoning.
pub fn budget_to_effort_label(budget_tokens: u32) -> &'static str {
    reasoning::ReasoningBudgetConfig::from_env()
        .budget_to_effort(budget_tokens)
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> AnthropicMessagesAdapter {
        AnthropicMessagesAdapter::default()
    }

    #[test]
    fn scenario_1_chat_completions_request_fields() {
        // Mirrors spec.md §8 scenario 1's expected Anthropic shape,
        // built directly here from a canonical request.
        let mut req = CanonicalRequest::new("gpt-5");
        req.messages.push(CanonicalMessage::text(Role::System, "You are helpful"));
        req.messages.push(CanonicalMessage::text(Role::User, "Hello"));
        req.temperature = Some(0.4);
        req.max_tokens = Some(128);
        req.user = Some("tester".to_string());

        let bytes = adapter().build_request(&req).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["model"], "gpt-5");
        assert_eq!(value["max_tokens"], 128);
        assert_eq!(value["temperature"], 0.4);
        assert_eq!(value["system"], "You are helpful");
        assert_eq!(value["metadata"]["user_id"], "tester");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn scenario_2_text_only_response() {
        let body = br#"{"id":"msg_123","role":"assistant","model":"claude-sonnet","stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":5},"content":[{"type":"text","text":"Hello OpenAI"}]}"#;
        let resp = adapter().parse_response(body).unwrap();
        assert_eq!(resp.messages[0].text_content(), "Hello OpenAI");
        assert_eq!(resp.usage.unwrap().total(), 15);
        assert_eq!(resp.finish_reason, Some(crate::canonical::FinishReason::EndTurn));
    }

    #[test]
    fn tool_result_round_trip_preserves_id_and_text() {
        let body = br#"{"model":"claude-3","max_tokens":100,"messages":[{"role":"user","content":[{"type":"tool_result","tool_use_id":"call_1","content":"42"}]}]}"#;
        let req = adapter().parse_request(body).unwrap();
        let tool_msg = req.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));

        let rebuilt = adapter().build_request(&req).unwrap();
        let value: Value = serde_json::from_slice(&rebuilt).unwrap();
        let block = &value["messages"][0]["content"][0];
        assert_eq!(block["tool_use_id"], "call_1");
        assert_eq!(block["content"], "42");
    }

    #[test]
    fn disable_parallel_tool_use_is_logical_inverse() {
        let body = br#"{"model":"claude-3","max_tokens":100,"messages":[],"disable_parallel_tool_use":true}"#;
        let req = adapter().parse_request(body).unwrap();
        assert_eq!(req.parallel_tool_calls, Some(false));
    }
}
