//! Gemini → AnthropicMessages stream transducer (spec.md §4.3.5). A
//! `functionCall` part becomes the three-event Anthropic tool-use
//! sequence (`content_block_start` / `content_block_delta` /
//! `content_block_stop`) since Gemini ships the whole call in one
//! snapshot but Anthropic's model is open-then-fill-then-close.

use serde::Deserialize;
use serde_json::json;

use crate::error::ConversionError;
use crate::mappers::finish_reason;
use crate::transducer::{sse_frame, RawSseEvent, Transducer};

#[derive(Debug, Deserialize)]
struct CandidateSnapshot {
    #[serde(default)]
    #[serde(rename = "responseId")]
    response_id: Option<String>,
    #[serde(rename = "modelVersion")]
    #[serde(default)]
    model_version: Option<String>,
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
    #[serde(rename = "finishReason")]
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "functionCall")]
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

pub struct GeminiToAnthropic {
    stream_id: String,
    model: String,
    message_start_emitted: bool,
    next_index: usize,
    finished: bool,
}

impl Default for GeminiToAnthropic {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiToAnthropic {
    pub fn new() -> Self {
        Self {
            stream_id: String::new(),
            model: String::new(),
            message_start_emitted: false,
            next_index: 0,
            finished: false,
        }
    }

    fn ensure_message_start(&mut self, frames: &mut Vec<u8>) {
        if !self.message_start_emitted {
            frames.extend(sse_frame(
                Some("message_start"),
                &json!({
                    "type": "message_start",
                    "message": { "id": self.stream_id, "model": self.model, "role": "assistant" },
                }),
            ));
            self.message_start_emitted = true;
        }
    }
}

impl Transducer for GeminiToAnthropic {
    fn feed(&mut self, event: RawSseEvent) -> Result<Vec<u8>, ConversionError> {
        let snapshot: CandidateSnapshot = serde_json::from_str(&event.data)?;
        let mut frames = Vec::new();

        if let Some(id) = snapshot.response_id {
            self.stream_id = id;
        }
        if let Some(model) = snapshot.model_version {
            self.model = model;
        }

        self.ensure_message_start(&mut frames);

        let Some(candidate) = snapshot.candidates.into_iter().next() else {
            return Ok(frames);
        };

        for part in candidate.content.parts {
            if let Some(text) = part.text {
                if !text.is_empty() {
                    let index = self.next_index;
                    self.next_index += 1;
                    frames.extend(sse_frame(
                        Some("content_block_start"),
                        &json!({
                            "type": "content_block_start",
                            "index": index,
                            "content_block": { "type": "text", "text": "" },
                        }),
                    ));
                    frames.extend(sse_frame(
                        Some("content_block_delta"),
                        &json!({
                            "type": "content_block_delta",
                            "index": index,
                            "delta": { "type": "text_delta", "text": text },
                        }),
                    ));
                    frames.extend(sse_frame(
                        Some("content_block_stop"),
                        &json!({ "type": "content_block_stop", "index": index }),
                    ));
                }
            }
            if let Some(call) = part.function_call {
                let index = self.next_index;
                self.next_index += 1;
                let id = format!("gemini_call_{index}");
                let partial_json = serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string());
                frames.extend(sse_frame(
                    Some("content_block_start"),
                    &json!({
                        "type": "content_block_start",
                        "index": index,
                        "content_block": { "type": "tool_use", "id": id, "name": call.name, "input": {} },
                    }),
                ));
                frames.extend(sse_frame(
                    Some("content_block_delta"),
                    &json!({
                        "type": "content_block_delta",
                        "index": index,
                        "delta": { "type": "input_json_delta", "partial_json": partial_json },
                    }),
                ));
                frames.extend(sse_frame(
                    Some("content_block_stop"),
                    &json!({ "type": "content_block_stop", "index": index }),
                ));
            }
        }

        if let Some(reason) = candidate.finish_reason {
            self.finished = true;
            let canonical = finish_reason::gemini_to_canonical(&reason);
            frames.extend(sse_frame(
                Some("message_delta"),
                &json!({
                    "type": "message_delta",
                    "delta": { "stop_reason": finish_reason::canonical_to_anthropic(canonical) },
                }),
            ));
            frames.extend(sse_frame(Some("message_stop"), &json!({ "type": "message_stop" })));
        }

        Ok(frames)
    }

    fn finish(&mut self) -> Vec<u8> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut frames = Vec::new();
        self.ensure_message_start(&mut frames);
        frames.extend(sse_frame(
            Some("message_delta"),
            &json!({ "type": "message_delta", "delta": { "stop_reason": "end_turn" } }),
        ));
        frames.extend(sse_frame(Some("message_stop"), &json!({ "type": "message_stop" })));
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_call_part_becomes_three_event_sequence() {
        let mut t = GeminiToAnthropic::new();
        let out = t
            .feed(RawSseEvent {
                event: None,
                data: r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"search","args":{"q":"x"}}}]},"finishReason":"TOOL_CALLS"}]}"#.into(),
            })
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("message_start"));
        assert!(text.contains("\"type\":\"tool_use\""));
        assert!(text.contains("input_json_delta"));
        assert!(text.contains("content_block_stop"));
        assert!(text.contains("\"stop_reason\":\"tool_use\""));
        assert!(text.contains("message_stop"));
    }
}
