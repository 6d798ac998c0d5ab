//! Gemini → ChatCompletions stream transducer (spec.md §4.3.5). Each
//! Gemini SSE payload is a full candidate snapshot, not an incremental
//! delta; a `functionCall` part renders as one chunk carrying the full
//! id/name/arguments rather than a start+delta+stop triple.

use serde::Deserialize;
use serde_json::json;

use crate::error::ConversionError;
use crate::mappers::finish_reason;
use crate::transducer::{done_frame, sse_frame, RawSseEvent, Transducer};

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

pub struct GeminiToChatCompletions {
    stream_id: String,
    model: String,
    sent_role: bool,
    next_tool_index: usize,
    finished: bool,
}

impl Default for GeminiToChatCompletions {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiToChatCompletions {
    pub fn new() -> Self {
        Self {
            stream_id: String::new(),
            model: String::new(),
            sent_role: false,
            next_tool_index: 0,
            finished: false,
        }
    }

    fn chunk(&self, delta: serde_json::Value, finish_reason: Option<&str>) -> Vec<u8> {
        let choice = json!({
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason,
        });
        sse_frame(
            None,
            &json!({
                "id": self.stream_id,
                "model": self.model,
                "object": "chat.completion.chunk",
                "choices": [choice],
            }),
        )
    }
}

impl Transducer for GeminiToChatCompletions {
    fn feed(&mut self, event: RawSseEvent) -> Result<Vec<u8>, ConversionError> {
        let snapshot: CandidateSnapshot = serde_json::from_str(&event.data)?;
        let mut frames = Vec::new();

        if let Some(id) = snapshot.response_id {
            self.stream_id = id;
        }
        if let Some(model) = snapshot.model_version {
            self.model = model;
        }

        if !self.sent_role {
            frames.extend(self.chunk(json!({ "role": "assistant" }), None));
            self.sent_role = true;
        }

        let Some(candidate) = snapshot.candidates.into_iter().next() else {
            return Ok(frames);
        };

        for part in candidate.content.parts {
            if let Some(text) = part.text {
                if !text.is_empty() {
                    frames.extend(self.chunk(json!({ "content": text }), None));
                }
            }
            if let Some(call) = part.function_call {
                let index = self.next_tool_index;
                self.next_tool_index += 1;
                let id = format!("gemini_call_{index}");
                let arguments = serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string());
                frames.extend(self.chunk(
                    json!({
                        "tool_calls": [{
                            "index": index,
                            "id": id,
                            "type": "function",
                            "function": { "name": call.name, "arguments": arguments },
                        }],
                    }),
                    None,
                ));
            }
        }

        if let Some(reason) = candidate.finish_reason {
            self.finished = true;
            let canonical = finish_reason::gemini_to_canonical(&reason);
            frames.extend(self.chunk(json!({}), Some(finish_reason::canonical_to_chat_completions(canonical))));
            frames.extend(done_frame());
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
    fn text_and_function_call_parts_translate() {
        let mut t = GeminiToChatCompletions::new();
        let out = t
            .feed(RawSseEvent {
                event: None,
                data: r#"{"candidates":[{"content":{"parts":[{"text":"hi"},{"functionCall":{"name":"search","args":{"q":"x"}}}]},"finishReason":"STOP"}]}"#.into(),
            })
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"role\":\"assistant\""));
        assert!(text.contains("\"content\":\"hi\""));
        assert!(text.contains("\"name\":\"search\""));
        assert!(text.contains("\"finish_reason\":\"stop\""));
        assert!(text.trim_end().ends_with("data: [DONE]"));
    }
}
