//! AnthropicMessages → ChatCompletions stream transducer (spec.md §4.3.3).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::canonical::TokenUsage;
use crate::error::ConversionError;
use crate::mappers::finish_reason;
use crate::transducer::{done_frame, sse_frame, RawSseEvent, Transducer};

#[derive(Debug, Deserialize)]
struct MessageStartWire {
    message: MessageStartInner,
}

#[derive(Debug, Deserialize)]
struct MessageStartInner {
    id: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStartWire {
    index: usize,
    content_block: ContentBlockWire,
}

#[derive(Debug, Deserialize)]
struct ContentBlockWire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaWire {
    index: usize,
    delta: ContentDeltaWire,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ContentDeltaWire {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { #[serde(default)] thinking: Option<String> },
}

#[derive(Debug, Deserialize)]
struct MessageDeltaWire {
    delta: MessageDeltaInner,
    #[serde(default)]
    usage: Option<MessageDeltaUsage>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaInner {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaUsage {
    #[serde(default)]
    output_tokens: Option<u32>,
}

struct BlockState {
    is_tool_use: bool,
}

pub struct AnthropicToChatCompletions {
    stream_id: String,
    model: String,
    blocks: HashMap<usize, BlockState>,
    usage: Option<TokenUsage>,
    finish_reason: Option<crate::canonical::FinishReason>,
    finished: bool,
}

impl Default for AnthropicToChatCompletions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicToChatCompletions {
    pub fn new() -> Self {
        Self {
            stream_id: String::new(),
            model: String::new(),
            blocks: HashMap::new(),
            usage: None,
            finish_reason: None,
            finished: false,
        }
    }

    fn chunk(&self, delta: serde_json::Value, finish_reason: Option<&str>) -> Vec<u8> {
        let mut choice = json!({ "index": 0, "delta": delta });
        if let Some(reason) = finish_reason {
            choice["finish_reason"] = json!(reason);
        } else {
            choice["finish_reason"] = serde_json::Value::Null;
        }
        let mut body = json!({
            "id": self.stream_id,
            "model": self.model,
            "object": "chat.completion.chunk",
            "choices": [choice],
        });
        if finish_reason.is_some() {
            if let Some(usage) = self.usage {
                body["usage"] = json!({
                    "prompt_tokens": usage.prompt_tokens,
                    "completion_tokens": usage.completion_tokens,
                    "total_tokens": usage.total(),
                });
            }
        }
        sse_frame(None, &body)
    }
}

impl Transducer for AnthropicToChatCompletions {
    fn feed(&mut self, event: RawSseEvent) -> Result<Vec<u8>, ConversionError> {
        let mut frames = Vec::new();
        match event.event.as_deref() {
            Some("message_start") => {
                let wire: MessageStartWire = serde_json::from_str(&event.data)?;
                self.stream_id = wire.message.id;
                self.model = wire.message.model;
                frames.extend(self.chunk(json!({ "role": "assistant" }), None));
            }
            Some("content_block_start") => {
                let wire: ContentBlockStartWire = serde_json::from_str(&event.data)?;
                let is_tool_use = wire.content_block.kind == "tool_use";
                self.blocks.insert(wire.index, BlockState { is_tool_use });
                if is_tool_use {
                    frames.extend(self.chunk(
                        json!({
                            "tool_calls": [{
                                "index": wire.index,
                                "id": wire.content_block.id,
                                "type": "function",
                                "function": { "name": wire.content_block.name, "arguments": "" },
                            }],
                        }),
                        None,
                    ));
                }
            }
            Some("content_block_delta") => {
                let wire: ContentBlockDeltaWire = serde_json::from_str(&event.data)?;
                match wire.delta {
                    ContentDeltaWire::TextDelta { text } => {
                        frames.extend(self.chunk(json!({ "content": text }), None));
                    }
                    ContentDeltaWire::InputJsonDelta { partial_json } => {
                        frames.extend(self.chunk(
                            json!({
                                "tool_calls": [{
                                    "index": wire.index,
                                    "function": { "arguments": partial_json },
                                }],
                            }),
                            None,
                        ));
                    }
                    ContentDeltaWire::ThinkingDelta { .. } => {}
                }
            }
            Some("message_delta") => {
                let wire: MessageDeltaWire = serde_json::from_str(&event.data)?;
                if let Some(reason) = wire.delta.stop_reason {
                    self.finish_reason = Some(finish_reason::anthropic_to_canonical(&reason));
                }
                if let Some(usage) = wire.usage.and_then(|u| u.output_tokens) {
                    let mut u = self.usage.unwrap_or_default();
                    u.completion_tokens = Some(usage);
                    self.usage = Some(u);
                }
            }
            Some("message_stop") => {
                self.finished = true;
                let reason = self
                    .finish_reason
                    .map(|r| match r {
                        crate::canonical::FinishReason::MaxTokens => "length",
                        crate::canonical::FinishReason::ToolUse => "tool_calls",
                        crate::canonical::FinishReason::StopSequence => "stop_sequence",
                        crate::canonical::FinishReason::EndTurn => "stop",
                    })
                    .unwrap_or("stop");
                frames.extend(self.chunk(json!({}), Some(reason)));
                frames.extend(done_frame());
            }
            _ => {}
        }
        Ok(frames)
    }

    fn finish(&mut self) -> Vec<u8> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut frames = self.chunk(json!({}), Some("stop"));
        frames.extend(done_frame());
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_4_tool_call_stream() {
        let mut t = AnthropicToChatCompletions::new();
        let mut out = Vec::new();
        out.extend(
            t.feed(RawSseEvent {
                event: Some("message_start".into()),
                data: r#"{"message":{"id":"msg_1","model":"claude-test"}}"#.into(),
            })
            .unwrap(),
        );
        out.extend(
            t.feed(RawSseEvent {
                event: Some("content_block_start".into()),
                data: r#"{"index":0,"content_block":{"type":"tool_use","id":"tool_1","name":"search"}}"#.into(),
            })
            .unwrap(),
        );
        out.extend(
            t.feed(RawSseEvent {
                event: Some("content_block_delta".into()),
                data: r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"{\"q\":\"x\"}"}}"#.into(),
            })
            .unwrap(),
        );
        out.extend(
            t.feed(RawSseEvent {
                event: Some("message_delta".into()),
                data: r#"{"delta":{"stop_reason":"tool_use"}}"#.into(),
            })
            .unwrap(),
        );
        out.extend(
            t.feed(RawSseEvent {
                event: Some("message_stop".into()),
                data: "{}".into(),
            })
            .unwrap(),
        );

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"role\":\"assistant\""));
        assert!(text.contains("\"id\":\"tool_1\""));
        assert!(text.contains("\"name\":\"search\""));
        assert!(text.contains(r#"{\"q\":\"x\"}"#) || text.contains("{\"q\":\"x\"}"));
        assert!(text.contains("\"finish_reason\":\"tool_calls\""));
        assert!(text.trim_end().ends_with("data: [DONE]"));
    }
}
