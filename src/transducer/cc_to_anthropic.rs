//! ChatCompletions → AnthropicMessages stream transducer (spec.md §4.3.2).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::canonical::TokenUsage;
use crate::error::ConversionError;
use crate::mappers::finish_reason;
use crate::transducer::{sse_frame, RawSseEvent, Transducer};

#[derive(Debug, Deserialize)]
struct ChunkWire {
    id: String,
    model: String,
    #[serde(default)]
    choices: Vec<ChoiceWire>,
    #[serde(default)]
    usage: Option<UsageWire>,
}

#[derive(Debug, Deserialize)]
struct ChoiceWire {
    #[serde(default)]
    delta: DeltaWire,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeltaWire {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDeltaWire>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDeltaWire {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDeltaWire>,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionDeltaWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageWire {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

fn content_delta_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

struct ToolUseState {
    index: usize,
    id: String,
    name: String,
    started: bool,
}

pub struct ChatCompletionsToAnthropic {
    stream_id: Option<String>,
    model: String,
    message_start_emitted: bool,
    text_block_open: bool,
    text_block_index: Option<usize>,
    next_index: usize,
    tool_calls: BTreeMap<usize, ToolUseState>,
    finish_reason: Option<crate::canonical::FinishReason>,
    usage: Option<TokenUsage>,
    finished: bool,
}

impl Default for ChatCompletionsToAnthropic {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCompletionsToAnthropic {
    pub fn new() -> Self {
        Self {
            stream_id: None,
            model: String::new(),
            message_start_emitted: false,
            text_block_open: false,
            text_block_index: None,
            next_index: 0,
            tool_calls: BTreeMap::new(),
            finish_reason: None,
            usage: None,
            finished: false,
        }
    }

    fn ensure_message_start(&mut self, frames: &mut Vec<u8>) {
        if !self.message_start_emitted {
            frames.extend(sse_frame(
                Some("message_start"),
                &json!({
                    "type": "message_start",
                    "message": {
                        "id": self.stream_id,
                        "model": self.model,
                        "role": "assistant",
                    },
                }),
            ));
            self.message_start_emitted = true;
        }
    }

    fn terminal_frames(&mut self) -> Vec<u8> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut frames = Vec::new();

        self.ensure_message_start(&mut frames);

        if self.text_block_open {
            if let Some(index) = self.text_block_index {
                frames.extend(sse_frame(
                    Some("content_block_stop"),
                    &json!({ "type": "content_block_stop", "index": index }),
                ));
            }
            self.text_block_open = false;
        }

        for (index, tc) in &self.tool_calls {
            if tc.started {
                frames.extend(sse_frame(
                    Some("content_block_stop"),
                    &json!({ "type": "content_block_stop", "index": index }),
                ));
            }
        }

        let stop_reason = self
            .finish_reason
            .map(finish_reason::canonical_to_anthropic)
            .unwrap_or("end_turn");
        let usage = self.usage.map(|u| {
            json!({ "output_tokens": u.completion_tokens.unwrap_or(0) })
        });
        frames.extend(sse_frame(
            Some("message_delta"),
            &json!({
                "type": "message_delta",
                "delta": { "stop_reason": stop_reason },
                "usage": usage,
            }),
        ));
        frames.extend(sse_frame(Some("message_stop"), &json!({ "type": "message_stop" })));
        frames
    }
}

impl Transducer for ChatCompletionsToAnthropic {
    fn feed(&mut self, event: RawSseEvent) -> Result<Vec<u8>, ConversionError> {
        if event.is_done_sentinel() {
            return Ok(self.terminal_frames());
        }

        let chunk: ChunkWire = match serde_json::from_str(&event.data) {
            Ok(c) => c,
            Err(_) => return Ok(Vec::new()),
        };

        if self.stream_id.is_none() {
            self.stream_id = Some(chunk.id.clone());
            self.model = chunk.model.clone();
        }

        let mut frames = Vec::new();
        self.ensure_message_start(&mut frames);

        if let Some(choice) = chunk.choices.first() {
            if let Some(content) = &choice.delta.content {
                let text = content_delta_text(content);
                if !text.is_empty() {
                    if !self.text_block_open {
                        let index = self.next_index;
                        self.next_index += 1;
                        self.text_block_index = Some(index);
                        self.text_block_open = true;
                        frames.extend(sse_frame(
                            Some("content_block_start"),
                            &json!({
                                "type": "content_block_start",
                                "index": index,
                                "content_block": { "type": "text", "text": "" },
                            }),
                        ));
                    }
                    frames.extend(sse_frame(
                        Some("content_block_delta"),
                        &json!({
                            "type": "content_block_delta",
                            "index": self.text_block_index,
                            "delta": { "type": "text_delta", "text": text },
                        }),
                    ));
                }
            }

            if let Some(tool_calls) = &choice.delta.tool_calls {
                for tc in tool_calls {
                    if !self.tool_calls.contains_key(&tc.index) {
                        let index = self.next_index;
                        self.next_index += 1;
                        let id = tc.id.clone().unwrap_or_default();
                        let name = tc.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default();
                        self.tool_calls.insert(
                            tc.index,
                            ToolUseState {
                                index,
                                id: id.clone(),
                                name: name.clone(),
                                started: true,
                            },
                        );
                        frames.extend(sse_frame(
                            Some("content_block_start"),
                            &json!({
                                "type": "content_block_start",
                                "index": index,
                                "content_block": { "type": "tool_use", "id": id, "name": name, "input": {} },
                            }),
                        ));
                    }
                    if let Some(args) = tc.function.as_ref().and_then(|f| f.arguments.clone()) {
                        if !args.is_empty() {
                            let state = self.tool_calls.get(&tc.index).unwrap();
                            frames.extend(sse_frame(
                                Some("content_block_delta"),
                                &json!({
                                    "type": "content_block_delta",
                                    "index": state.index,
                                    "delta": { "type": "input_json_delta", "partial_json": args },
                                }),
                            ));
                        }
                    }
                }
            }

            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(finish_reason::chat_completions_to_canonical(reason));
            }
        }

        if let Some(usage) = chunk.usage {
            self.usage = Some(TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        Ok(frames)
    }

    fn finish(&mut self) -> Vec<u8> {
        self.terminal_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transducer::sse::SseDecoder;

    fn feed_all(t: &mut ChatCompletionsToAnthropic, raw: &[&str]) -> Vec<u8> {
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for line in raw {
            for event in decoder.push(line.as_bytes()).unwrap() {
                out.extend(t.feed(event).unwrap());
            }
        }
        out.extend(t.finish());
        out
    }

    #[test]
    fn text_then_stop_emits_full_event_sequence() {
        let mut t = ChatCompletionsToAnthropic::new();
        let out = feed_all(
            &mut t,
            &[
                "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hi\"}}]}\n\n",
                "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
                "data: [DONE]\n\n",
            ],
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("message_start"));
        assert!(text.contains("content_block_start"));
        assert!(text.contains("text_delta"));
        assert!(text.contains("content_block_stop"));
        assert!(text.contains("\"stop_reason\":\"end_turn\""));
        assert!(text.contains("message_stop"));
    }

    #[test]
    fn tool_call_opens_tool_use_block_once() {
        let mut t = ChatCompletionsToAnthropic::new();
        let out = feed_all(
            &mut t,
            &[
                "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"search\",\"arguments\":\"\"}}]}}]}\n\n",
                "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"q\\\":1}\"}}]},\"finish_reason\":\"tool_calls\"}]}\n\n",
                "data: [DONE]\n\n",
            ],
        );
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("tool_use").count(), 1);
        assert!(text.contains("input_json_delta"));
        assert!(text.contains("\"stop_reason\":\"tool_use\""));
    }
}
