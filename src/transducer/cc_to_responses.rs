//! ChatCompletions → Responses stream transducer (spec.md §4.3.1).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;

use crate::canonical::TokenUsage;
use crate::error::ConversionError;
use crate::mappers::finish_reason;
use crate::transducer::{done_frame, sse_frame, RawSseEvent, Transducer};

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
    content: Option<String>,
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

struct ToolCallState {
    id: String,
    name: String,
    started_emitted: bool,
}

pub struct ChatCompletionsToResponses {
    response_id: Option<String>,
    model: String,
    sent_created: bool,
    tool_calls: BTreeMap<usize, ToolCallState>,
    finish_reason: Option<crate::canonical::FinishReason>,
    usage: Option<TokenUsage>,
    saw_any_chunk: bool,
    finished: bool,
}

impl Default for ChatCompletionsToResponses {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCompletionsToResponses {
    pub fn new() -> Self {
        Self {
            response_id: None,
            model: String::new(),
            sent_created: false,
            tool_calls: BTreeMap::new(),
            finish_reason: None,
            usage: None,
            saw_any_chunk: false,
            finished: false,
        }
    }

    fn response_id_or_synth(&mut self) -> String {
        if self.response_id.is_none() {
            self.response_id = Some(format!("resp_{}", synthetic_suffix()));
        }
        self.response_id.clone().unwrap()
    }

    fn ensure_created(&mut self, frames: &mut Vec<u8>) {
        if !self.sent_created {
            let id = self.response_id_or_synth();
            frames.extend(sse_frame(
                None,
                &json!({
                    "type": "response.created",
                    "response": { "id": id, "model": self.model },
                }),
            ));
            self.sent_created = true;
        }
    }

    fn terminal_frames(&mut self) -> Vec<u8> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut frames = Vec::new();

        if !self.saw_any_chunk {
            self.ensure_created(&mut frames);
            frames.extend(sse_frame(
                None,
                &json!({
                    "type": "response.completed",
                    "response": { "id": self.response_id_or_synth(), "model": self.model },
                    "finish_reason": "stop",
                }),
            ));
            frames.extend(done_frame());
            return frames;
        }

        for (index, tc) in &self.tool_calls {
            if tc.started_emitted {
                frames.extend(sse_frame(
                    None,
                    &json!({
                        "type": "response.function_call.completed",
                        "output_index": index,
                        "id": tc.id,
                        "name": tc.name,
                    }),
                ));
            }
        }

        let reason_str = self
            .finish_reason
            .map(finish_reason::canonical_to_chat_completions)
            .unwrap_or("stop");
        let usage = self.usage.map(|u| {
            json!({
                "prompt_tokens": u.prompt_tokens,
                "completion_tokens": u.completion_tokens,
                "total_tokens": u.total(),
            })
        });
        frames.extend(sse_frame(
            None,
            &json!({
                "type": "response.completed",
                "response": { "id": self.response_id.clone(), "model": self.model },
                "finish_reason": reason_str,
                "usage": usage,
            }),
        ));
        frames.extend(done_frame());
        frames
    }
}

impl Transducer for ChatCompletionsToResponses {
    fn feed(&mut self, event: RawSseEvent) -> Result<Vec<u8>, ConversionError> {
        if event.is_done_sentinel() {
            return Ok(self.terminal_frames());
        }

        let chunk: ChunkWire = match serde_json::from_str(&event.data) {
            Ok(c) => c,
            Err(_) => return Ok(Vec::new()),
        };

        self.saw_any_chunk = true;
        if self.response_id.is_none() {
            self.response_id = Some(chunk.id.clone());
            self.model = chunk.model.clone();
        }

        let mut frames = Vec::new();
        self.ensure_created(&mut frames);

        if let Some(choice) = chunk.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    frames.extend(sse_frame(
                        None,
                        &json!({
                            "type": "response.output_text.delta",
                            "delta": content,
                            "response_id": self.response_id,
                            "output_index": 0,
                        }),
                    ));
                }
            }

            if let Some(tool_calls) = &choice.delta.tool_calls {
                for tc in tool_calls {
                    let newly_learned_id = tc.id.clone();
                    let newly_learned_name = tc.function.as_ref().and_then(|f| f.name.clone());
                    let entry = self.tool_calls.entry(tc.index).or_insert_with(|| ToolCallState {
                        id: String::new(),
                        name: String::new(),
                        started_emitted: false,
                    });
                    let mut just_started = false;
                    if let Some(id) = newly_learned_id {
                        if entry.id != id {
                            entry.id = id;
                            just_started = true;
                        }
                    }
                    if let Some(name) = newly_learned_name {
                        if entry.name != name {
                            entry.name = name;
                            just_started = true;
                        }
                    }
                    if just_started && !entry.started_emitted {
                        entry.started_emitted = true;
                        frames.extend(sse_frame(
                            None,
                            &json!({
                                "type": "response.function_call.started",
                                "output_index": tc.index,
                                "id": entry.id,
                                "name": entry.name,
                            }),
                        ));
                    }
                    if let Some(args) = tc.function.as_ref().and_then(|f| f.arguments.clone()) {
                        if !args.is_empty() {
                            frames.extend(sse_frame(
                                None,
                                &json!({
                                    "type": "response.function_call_arguments.delta",
                                    "output_index": tc.index,
                                    "delta": args,
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

/// `resp_<nanos>` per spec.md §4.3.1, for when upstream never sent an
/// id to adopt (the zero-chunk fallback path).
fn synthetic_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transducer::sse::SseDecoder;

    fn feed_all(t: &mut ChatCompletionsToResponses, raw: &[&str]) -> Vec<u8> {
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
    fn scenario_3_two_text_deltas_plus_stop() {
        let mut t = ChatCompletionsToResponses::new();
        let out = feed_all(
            &mut t,
            &[
                "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}\n\n",
                "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"}}]}\n\n",
                "data: {\"id\":\"c1\",\"model\":\"gpt-5\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
                "data: [DONE]\n\n",
            ],
        );
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("response.created").count(), 1);
        assert!(text.contains("\"delta\":\"Hello\""));
        assert!(text.contains("\"delta\":\" world\""));
        assert!(text.contains("response.completed"));
        assert!(text.trim_end().ends_with("data: [DONE]"));
    }

    #[test]
    fn empty_stream_synthesizes_minimal_pair() {
        let mut t = ChatCompletionsToResponses::new();
        let out = t.finish();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("response.created"));
        assert!(text.contains("response.completed"));
    }
}
