//! Responses → ChatCompletions stream transducer (spec.md §4.3.4).

use serde::Deserialize;
use serde_json::json;

use crate::canonical::TokenUsage;
use crate::error::ConversionError;
use crate::mappers::finish_reason;
use crate::transducer::{done_frame, sse_frame, RawSseEvent, Transducer};

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ResponsesEvent {
    #[serde(rename = "response.created")]
    Created { response: CreatedResponse },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    #[serde(rename = "response.function_call.started")]
    FunctionCallStarted {
        output_index: usize,
        id: String,
        name: String,
    },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { output_index: usize, delta: String },
    #[serde(rename = "response.completed")]
    Completed {
        response: CreatedResponse,
        #[serde(default)]
        finish_reason: Option<String>,
        #[serde(default)]
        usage: Option<CompletedUsage>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletedUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

pub struct ResponsesToChatCompletions {
    stream_id: String,
    model: String,
    finished: bool,
}

impl Default for ResponsesToChatCompletions {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponsesToChatCompletions {
    pub fn new() -> Self {
        Self {
            stream_id: String::new(),
            model: String::new(),
            finished: false,
        }
    }

    fn chunk(&self, delta: serde_json::Value, finish_reason: Option<&str>, usage: Option<serde_json::Value>) -> Vec<u8> {
        let mut choice = json!({ "index": 0, "delta": delta });
        choice["finish_reason"] = finish_reason.map(|r| json!(r)).unwrap_or(serde_json::Value::Null);
        let mut body = json!({
            "id": self.stream_id,
            "model": self.model,
            "object": "chat.completion.chunk",
            "choices": [choice],
        });
        if let Some(usage) = usage {
            body["usage"] = usage;
        }
        sse_frame(None, &body)
    }
}

impl Transducer for ResponsesToChatCompletions {
    fn feed(&mut self, event: RawSseEvent) -> Result<Vec<u8>, ConversionError> {
        let parsed: ResponsesEvent = serde_json::from_str(&event.data)?;
        let mut frames = Vec::new();

        match parsed {
            ResponsesEvent::Created { response } => {
                self.stream_id = response.id;
                self.model = response.model;
                frames.extend(self.chunk(json!({ "role": "assistant" }), None, None));
            }
            ResponsesEvent::OutputTextDelta { delta } => {
                frames.extend(self.chunk(json!({ "content": delta }), None, None));
            }
            ResponsesEvent::FunctionCallStarted { output_index, id, name } => {
                frames.extend(self.chunk(
                    json!({
                        "tool_calls": [{
                            "index": output_index,
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": "" },
                        }],
                    }),
                    None,
                    None,
                ));
            }
            ResponsesEvent::FunctionCallArgumentsDelta { output_index, delta } => {
                frames.extend(self.chunk(
                    json!({
                        "tool_calls": [{
                            "index": output_index,
                            "function": { "arguments": delta },
                        }],
                    }),
                    None,
                    None,
                ));
            }
            ResponsesEvent::Completed {
                response,
                finish_reason,
                usage,
            } => {
                self.finished = true;
                if self.stream_id.is_empty() {
                    self.stream_id = response.id;
                    self.model = response.model;
                }
                let reason = finish_reason.as_deref().unwrap_or("stop");
                let usage_json = usage.map(|u| {
                    let usage = TokenUsage {
                        prompt_tokens: u.prompt_tokens,
                        completion_tokens: u.completion_tokens,
                        total_tokens: u.total_tokens,
                    };
                    json!({
                        "prompt_tokens": usage.prompt_tokens,
                        "completion_tokens": usage.completion_tokens,
                        "total_tokens": usage.total(),
                    })
                });
                frames.extend(self.chunk(json!({}), Some(reason), usage_json));
                frames.extend(done_frame());
            }
            ResponsesEvent::Other => {}
        }

        Ok(frames)
    }

    fn finish(&mut self) -> Vec<u8> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut frames = self.chunk(
            json!({}),
            Some(finish_reason::canonical_to_chat_completions(
                crate::canonical::FinishReason::EndTurn,
            )),
            None,
        );
        frames.extend(done_frame());
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_text_delta_and_completion() {
        let mut t = ResponsesToChatCompletions::new();
        let mut out = Vec::new();
        out.extend(
            t.feed(RawSseEvent {
                event: Some("response.created".into()),
                data: r#"{"type":"response.created","response":{"id":"resp_1","model":"gpt-5"}}"#.into(),
            })
            .unwrap(),
        );
        out.extend(
            t.feed(RawSseEvent {
                event: Some("response.output_text.delta".into()),
                data: r#"{"type":"response.output_text.delta","delta":"hi"}"#.into(),
            })
            .unwrap(),
        );
        out.extend(
            t.feed(RawSseEvent {
                event: Some("response.completed".into()),
                data: r#"{"type":"response.completed","response":{"id":"resp_1","model":"gpt-5"},"finish_reason":"stop"}"#.into(),
            })
            .unwrap(),
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"role\":\"assistant\""));
        assert!(text.contains("\"content\":\"hi\""));
        assert!(text.contains("\"finish_reason\":\"stop\""));
        assert!(text.trim_end().ends_with("data: [DONE]"));
    }
}
