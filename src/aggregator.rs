//! Message Aggregator (spec.md §4.2): folds a `CanonicalEvent`
//! sequence into a final `CanonicalMessage`. Used whenever a
//! non-streaming response must be synthesized from a streamed
//! upstream, or vice versa.

use std::collections::BTreeMap;

use crate::canonical::{
    CanonicalContent, CanonicalEvent, CanonicalMessage, CanonicalResponse, FinishReason, Role,
    TokenUsage,
};
use crate::mappers::json_repair::repair_python_literal;

struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates streaming events for a single in-flight message. Text
/// and tool-argument fragments are never intermixed within a content
/// block: a non-text event flushes whatever text is currently open.
pub struct Aggregator {
    id: String,
    model: String,
    role: Role,
    text_buffer: String,
    content: Vec<CanonicalContent>,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    usage: TokenUsage,
    finish_reason: Option<FinishReason>,
    stop_sequence: Option<String>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            role: Role::Assistant,
            text_buffer: String::new(),
            content: Vec::new(),
            tool_calls: BTreeMap::new(),
            usage: TokenUsage::default(),
            finish_reason: None,
            stop_sequence: None,
        }
    }

    fn flush_text(&mut self) {
        if !self.text_buffer.is_empty() {
            self.content.push(CanonicalContent::Text(std::mem::take(&mut self.text_buffer)));
        }
    }

    /// Feeds one canonical event into the aggregator's running state.
    pub fn feed(&mut self, event: CanonicalEvent) {
        match event {
            CanonicalEvent::MessageStart { id, model } => {
                self.id = id;
                self.model = model;
            }
            CanonicalEvent::RoleDelta { role } => {
                self.role = role;
            }
            CanonicalEvent::TextDelta { text } => {
                self.text_buffer.push_str(&text);
            }
            CanonicalEvent::Image { url, media_type } => {
                self.flush_text();
                self.content.push(CanonicalContent::Image { url, media_type });
            }
            CanonicalEvent::ToolStart { index, id, name } => {
                self.flush_text();
                self.tool_calls.insert(
                    index,
                    PartialToolCall {
                        id,
                        name,
                        arguments: String::new(),
                    },
                );
            }
            CanonicalEvent::ToolDelta { index, arguments_fragment } => {
                if let Some(entry) = self.tool_calls.get_mut(&index) {
                    entry.arguments.push_str(&arguments_fragment);
                }
            }
            CanonicalEvent::ToolStop { .. } => {
                // Tool calls are committed in bulk on message_stop; a
                // per-index stop doesn't need separate bookkeeping
                // since the argument builder already lives in the map.
            }
            CanonicalEvent::Usage { usage } => {
                self.usage = usage;
            }
            CanonicalEvent::Finish { reason, stop_sequence } => {
                self.finish_reason = Some(reason);
                self.stop_sequence = stop_sequence;
            }
            CanonicalEvent::MessageStop => {}
        }
    }

    /// Consumes the aggregator and produces the final message. Flushes
    /// any open text, commits all tool calls (repairing Python-literal
    /// argument strings where possible), and returns both the message
    /// and a response wrapper carrying id/model/usage/finish reason.
    pub fn finish(mut self) -> CanonicalResponse {
        self.flush_text();

        let mut message = CanonicalMessage::new(self.role);
        message.content = self.content;

        for (index, partial) in self.tool_calls {
            let arguments = match repair_python_literal(&partial.arguments) {
                Some(repaired) => repaired,
                None => partial.arguments,
            };
            message.content.push(CanonicalContent::ToolUse {
                id: partial.id.clone(),
                name: partial.name.clone(),
                arguments: arguments.clone(),
                parsed: None,
                index,
            });
            message.tool_calls.push(crate::canonical::CanonicalToolCall {
                id: partial.id,
                index,
                name: partial.name,
                arguments,
            });
        }

        CanonicalResponse {
            id: self.id,
            model: self.model,
            messages: vec![message],
            finish_reason: self.finish_reason,
            stop_sequence: self.stop_sequence,
            usage: Some(self.usage),
            success: true,
            thinking: None,
        }
    }
}

/// Convenience: folds a complete, owned event sequence in one call.
pub fn aggregate(events: impl IntoIterator<Item = CanonicalEvent>) -> CanonicalResponse {
    let mut agg = Aggregator::new();
    for event in events {
        agg.feed(event);
    }
    agg.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_deltas_accumulate_into_one_block() {
        let resp = aggregate([
            CanonicalEvent::MessageStart { id: "1".into(), model: "m".into() },
            CanonicalEvent::TextDelta { text: "Hello".into() },
            CanonicalEvent::TextDelta { text: " world".into() },
            CanonicalEvent::Finish { reason: FinishReason::EndTurn, stop_sequence: None },
            CanonicalEvent::MessageStop,
        ]);
        assert_eq!(resp.messages[0].text_content(), "Hello world");
    }

    #[test]
    fn tool_call_fragments_are_committed_on_finish() {
        let resp = aggregate([
            CanonicalEvent::MessageStart { id: "1".into(), model: "m".into() },
            CanonicalEvent::ToolStart { index: 0, id: "call_1".into(), name: "search".into() },
            CanonicalEvent::ToolDelta { index: 0, arguments_fragment: "{\"q\":".into() },
            CanonicalEvent::ToolDelta { index: 0, arguments_fragment: "\"x\"}".into() },
            CanonicalEvent::Finish { reason: FinishReason::ToolUse, stop_sequence: None },
            CanonicalEvent::MessageStop,
        ]);
        assert_eq!(resp.messages[0].tool_calls[0].arguments, r#"{"q":"x"}"#);
    }

    #[test]
    fn python_literal_tool_arguments_are_repaired_on_finish() {
        let resp = aggregate([
            CanonicalEvent::ToolStart { index: 0, id: "call_1".into(), name: "edit".into() },
            CanonicalEvent::ToolDelta {
                index: 0,
                arguments_fragment: "{'path': '/tmp', 'recursive': True}".into(),
            },
            CanonicalEvent::MessageStop,
        ]);
        let args = &resp.messages[0].tool_calls[0].arguments;
        let value: serde_json::Value = serde_json::from_str(args).unwrap();
        assert_eq!(value["recursive"], true);
    }

    #[test]
    fn stream_equals_batch_for_text_and_usage() {
        let resp = aggregate([
            CanonicalEvent::MessageStart { id: "x".into(), model: "gpt-5".into() },
            CanonicalEvent::RoleDelta { role: Role::Assistant },
            CanonicalEvent::TextDelta { text: "Hello".into() },
            CanonicalEvent::TextDelta { text: " world".into() },
            CanonicalEvent::Finish { reason: FinishReason::EndTurn, stop_sequence: None },
            CanonicalEvent::Usage {
                usage: TokenUsage { prompt_tokens: Some(3), completion_tokens: Some(2), total_tokens: None },
            },
            CanonicalEvent::MessageStop,
        ]);
        assert_eq!(resp.messages[0].text_content(), "Hello world");
        assert_eq!(resp.usage.unwrap().total(), 5);
        assert_eq!(resp.finish_reason, Some(FinishReason::EndTurn));
    }
}
